use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::event::PlayerEvent;
use crate::keys::{parse_key, parse_keys, KeyParseError};
use crate::sequence::{HotkeyBindings, KeySequence, MismatchPolicy};
use crate::timefmt::TimeFormat;

/// Largest offset the player accepts, in milliseconds.
pub const MAX_OFFSET_MS: u64 = 9_999_999;
pub const DEFAULT_MPV_PATH: &str = "mpv";
pub const DEFAULT_WINDOW_TITLE: &str = "Video Player";
pub const DEFAULT_SPLIT_KEYS: [&str; 4] = ["ctrl", "alt", "shift", "f1"];
pub const DEFAULT_RESET_KEYS: [&str; 4] = ["ctrl", "shift", "alt", "f2"];
pub const DEFAULT_PAUSE_KEYS: [&str; 1] = ["pause"];
pub const DEFAULT_STOP_LISTENER_KEY: &str = "escape";

/// Root configuration structure. Deserialized from `<config dir>/livesplit-player/config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub hotkeys: HotkeyConfig,
}

/// Video and display settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    /// Video loaded at startup, if any.
    #[serde(default)]
    pub source: Option<PathBuf>,
    /// Position every start and stop seeks to. Clamped to [0, MAX_OFFSET_MS].
    #[serde(default)]
    pub offset_ms: u64,
    #[serde(default)]
    pub time_format: TimeFormat,
    /// mpv executable name or path.
    #[serde(default = "default_mpv_path")]
    pub mpv_path: String,
    #[serde(default = "default_window_title")]
    pub window_title: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            source: None,
            offset_ms: 0,
            time_format: TimeFormat::default(),
            mpv_path: DEFAULT_MPV_PATH.to_string(),
            window_title: DEFAULT_WINDOW_TITLE.to_string(),
        }
    }
}

impl PlayerConfig {
    pub fn effective_offset(&self) -> u64 {
        self.offset_ms.min(MAX_OFFSET_MS)
    }
}

/// Key names for the three hotkey sequences.  See [`crate::keys::parse_key`]
/// for the accepted names.
#[derive(Debug, Clone, Deserialize)]
pub struct HotkeyConfig {
    #[serde(default = "default_split")]
    pub split: Vec<String>,
    #[serde(default = "default_reset")]
    pub reset: Vec<String>,
    #[serde(default = "default_pause")]
    pub pause: Vec<String>,
    /// Releasing this key stops the global listener.
    #[serde(default = "default_stop_listener")]
    pub stop_listener: String,
    #[serde(default)]
    pub mismatch: MismatchPolicy,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            split: default_split(),
            reset: default_reset(),
            pause: default_pause(),
            stop_listener: default_stop_listener(),
            mismatch: MismatchPolicy::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("{binding} hotkey: {source}")]
    Key {
        binding: &'static str,
        #[source]
        source: KeyParseError,
    },
    #[error("{0} hotkey sequence is empty")]
    Empty(&'static str),
}

impl HotkeyConfig {
    /// Resolves the configured key names into matcher bindings.
    pub fn bindings(&self) -> Result<HotkeyBindings, BindingError> {
        Ok(HotkeyBindings {
            split: sequence("split", &self.split)?,
            reset: sequence("reset", &self.reset)?,
            pause: sequence("pause", &self.pause)?,
            stop_listener: parse_key(&self.stop_listener).map_err(|source| BindingError::Key {
                binding: "stop_listener",
                source,
            })?,
            mismatch: self.mismatch,
        })
    }
}

fn sequence(binding: &'static str, names: &[String]) -> Result<KeySequence, BindingError> {
    let keys = parse_keys(names).map_err(|source| BindingError::Key { binding, source })?;
    KeySequence::new(keys).map_err(|_| BindingError::Empty(binding))
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Spawns a file watcher on the parent directory of `path`.  Whenever the config
/// file is created or modified, reloads it and sends a `ConfigReloaded` event.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<PlayerEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            error!("[config] Failed to create file watcher: {e}");
            return;
        }
    };

    // Watch the parent directory rather than the file directly so we catch
    // editor-style atomic saves (write-new + rename).
    let watch_dir = match path.parent() {
        Some(d) => d.to_path_buf(),
        None => {
            error!("[config] Config path has no parent directory");
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        error!("[config] Failed to watch config directory: {e}");
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        if !is_config_write(&event, &path) {
            continue;
        }
        match load_or_default(&path) {
            Ok(config) => {
                if tx.send(PlayerEvent::ConfigReloaded(config)).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("[config] Failed to reload config: {e:#}"),
        }
    }
}

fn is_config_write(event: &notify::Event, path: &Path) -> bool {
    let affects_config = event.paths.iter().any(|p| p == path);
    let is_write = matches!(
        event.kind,
        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
    );
    affects_config && is_write
}

fn default_mpv_path() -> String {
    DEFAULT_MPV_PATH.to_string()
}

fn default_window_title() -> String {
    DEFAULT_WINDOW_TITLE.to_string()
}

fn default_split() -> Vec<String> {
    DEFAULT_SPLIT_KEYS.iter().map(|s| s.to_string()).collect()
}

fn default_reset() -> Vec<String> {
    DEFAULT_RESET_KEYS.iter().map(|s| s.to_string()).collect()
}

fn default_pause() -> Vec<String> {
    DEFAULT_PAUSE_KEYS.iter().map(|s| s.to_string()).collect()
}

fn default_stop_listener() -> String {
    DEFAULT_STOP_LISTENER_KEY.to_string()
}
