use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::error;

use crate::controller::{PlaybackController, PlaybackState};
use crate::media::MediaEngine;

/// Runtime status written to `<config dir>/livesplit-player/status.toml`.
/// A front-end reads this file to draw the time label and scrubber.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerStatus {
    /// Player binary version (set from Cargo.toml at compile time).
    pub version: String,
    pub state: PlaybackState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub offset_ms: u64,
    pub position_ms: u64,
    pub duration_ms: u64,
    /// Time label text, e.g. `"00:01:05 / 00:12:40"`.
    pub time_text: String,
    /// Whether the global hotkey listener is still delivering events.
    pub hotkeys_active: bool,
    /// Name of the most recent hotkey sequence (`split`, `reset`, `pause`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_hotkey: Option<String>,
    /// RFC 3339 timestamp of the most recent hotkey.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_hotkey_timestamp: Option<String>,
    /// Why the hotkey listener is not running, if it is not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotkey_error: Option<String>,
}

impl PlayerStatus {
    /// Constructs the initial stopped status on startup.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: PlaybackState::Stopped,
            source: None,
            offset_ms: 0,
            position_ms: 0,
            duration_ms: 0,
            time_text: String::new(),
            hotkeys_active: false,
            last_hotkey: None,
            last_hotkey_timestamp: None,
            hotkey_error: None,
        }
    }

    /// Copies the controller's state and display into the status.
    pub fn sync<E: MediaEngine>(&mut self, controller: &PlaybackController<E>) {
        let display = controller.display();
        self.state = controller.state();
        self.source = controller.source().map(|p| p.to_string_lossy().into_owned());
        self.offset_ms = controller.offset_ms();
        self.position_ms = display.slider_value;
        self.duration_ms = display.slider_max;
        self.time_text = display.time_text.clone();
    }

    /// Whether this status differs from `last` in anything a reader would see.
    /// The raw position changes every frame, so it alone never forces a write;
    /// the time label carries it at display resolution.
    pub fn needs_write(&self, last: &PlayerStatus) -> bool {
        let mut comparable = last.clone();
        comparable.position_ms = self.position_ms;
        *self != comparable
    }

    /// Records a hotkey firing at the current local time.
    pub fn record_hotkey(&mut self, name: &str) {
        self.last_hotkey = Some(name.to_string());
        self.last_hotkey_timestamp = Some(chrono::Local::now().to_rfc3339());
    }
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Logs errors rather than panicking; a status write failure never stops playback.
pub fn write_status(path: &Path, status: &PlayerStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("[status] Failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                error!("[status] Failed to write status file: {e}");
            }
        }
        Err(e) => error!("[status] Failed to serialize status: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::RecordingEngine;
    use crate::timefmt::TimeFormat;
    use std::path::PathBuf;

    // ── PlayerStatus::new ─────────────────────────────────────────────────────

    #[test]
    fn new_starts_stopped() {
        let s = PlayerStatus::new();
        assert_eq!(s.state, PlaybackState::Stopped);
        assert!(!s.hotkeys_active);
    }

    #[test]
    fn new_has_no_optional_fields() {
        let s = PlayerStatus::new();
        assert!(s.source.is_none());
        assert!(s.last_hotkey.is_none());
        assert!(s.last_hotkey_timestamp.is_none());
        assert!(s.hotkey_error.is_none());
    }

    #[test]
    fn new_version_matches_cargo_pkg() {
        assert_eq!(PlayerStatus::new().version, env!("CARGO_PKG_VERSION"));
    }

    // ── sync / record_hotkey ──────────────────────────────────────────────────

    #[test]
    fn sync_copies_controller_state() {
        let mut engine = RecordingEngine::default();
        engine.duration_ms = 120_000;
        let mut c = PlaybackController::new(
            engine,
            Some(PathBuf::from("/videos/pb.mp4")),
            500,
            TimeFormat::Full,
        );
        c.start_video();
        c.on_duration_changed(120_000);
        c.on_position_changed(61_000);

        let mut s = PlayerStatus::new();
        s.sync(&c);
        assert_eq!(s.state, PlaybackState::Playing);
        assert_eq!(s.source.as_deref(), Some("/videos/pb.mp4"));
        assert_eq!(s.offset_ms, 500);
        assert_eq!(s.position_ms, 61_000);
        assert_eq!(s.duration_ms, 120_000);
        assert_eq!(s.time_text, "00:01:01 / 00:02:00");
    }

    #[test]
    fn record_hotkey_sets_name_and_timestamp() {
        let mut s = PlayerStatus::new();
        s.record_hotkey("split");
        assert_eq!(s.last_hotkey.as_deref(), Some("split"));
        let ts = s.last_hotkey_timestamp.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn position_alone_does_not_need_write() {
        let last = PlayerStatus::new();
        let mut s = last.clone();
        s.position_ms = 40;
        assert!(!s.needs_write(&last));

        s.time_text = "00:00:01 / 00:00:10".to_string();
        assert!(s.needs_write(&last));
    }

    #[test]
    fn state_change_needs_write() {
        let last = PlayerStatus::new();
        let mut s = last.clone();
        s.state = PlaybackState::Playing;
        assert!(s.needs_write(&last));
    }

    // ── PlaybackState serialization ───────────────────────────────────────────

    #[test]
    fn state_serializes_to_lowercase() {
        let mut s = PlayerStatus::new();
        assert!(toml::to_string_pretty(&s).unwrap().contains("state = \"stopped\""));
        s.state = PlaybackState::Playing;
        assert!(toml::to_string_pretty(&s).unwrap().contains("state = \"playing\""));
        s.state = PlaybackState::Paused;
        assert!(toml::to_string_pretty(&s).unwrap().contains("state = \"paused\""));
    }

    // ── write_status ──────────────────────────────────────────────────────────

    #[test]
    fn write_status_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("status.toml");
        write_status(&path, &PlayerStatus::new());
        assert!(path.exists());
    }

    #[test]
    fn write_status_content_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");

        let mut original = PlayerStatus::new();
        original.state = PlaybackState::Paused;
        original.source = Some("/videos/pb.mp4".to_string());
        original.time_text = "00:00:05 / 00:10:00".to_string();
        original.hotkeys_active = true;

        write_status(&path, &original);

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: PlayerStatus = toml::from_str(&content).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn write_status_omits_none_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        write_status(&path, &PlayerStatus::new());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("source"));
        assert!(!content.contains("last_hotkey"));
        assert!(!content.contains("error"));
    }
}
