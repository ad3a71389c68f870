/// Playback state machine for the companion video player.
///
/// The controller lives on the event-loop task and is the only thing that
/// issues commands to the [`MediaEngine`].  Hotkeys and console commands reach
/// it as [`PlayerEvent`](crate::event::PlayerEvent)s, never directly.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MAX_OFFSET_MS;
use crate::media::MediaEngine;
use crate::timefmt::{format_millis, TimeFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// What the player window shows: the time label and the scrubber.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Display {
    /// `"<elapsed> / <total>"`, empty until the first position report.
    pub time_text: String,
    pub slider_value: u64,
    /// Upper bound of the scrubber range; the lower bound is always 0.
    pub slider_max: u64,
}

pub struct PlaybackController<E: MediaEngine> {
    engine: E,
    state: PlaybackState,
    source: Option<PathBuf>,
    offset_ms: u64,
    format: TimeFormat,
    /// Total-duration text, captured on the first position report after a
    /// source is loaded and then held.
    latched_total: Option<String>,
    /// Set by a source change; the engine drops seeks issued while a file is
    /// still loading, so the offset is applied again once its duration is known.
    seek_on_load: bool,
    display: Display,
}

impl<E: MediaEngine> PlaybackController<E> {
    /// Creates a stopped controller, loading `source` if given and parking the
    /// engine on the first frame at `offset_ms`.
    pub fn new(engine: E, source: Option<PathBuf>, offset_ms: u64, format: TimeFormat) -> Self {
        let mut controller = Self {
            engine,
            state: PlaybackState::Stopped,
            source: None,
            offset_ms: offset_ms.min(MAX_OFFSET_MS),
            format,
            latched_total: None,
            seek_on_load: false,
            display: Display::default(),
        };
        if let Some(path) = source {
            controller.update_source(&path);
        }
        let offset = controller.offset_ms;
        controller.engine.set_position(offset);
        controller
    }

    /// Seeks to the offset and plays.  Ignored unless stopped.
    pub fn start_video(&mut self) {
        if self.state != PlaybackState::Stopped {
            debug!("[player] start ignored while {:?}", self.state);
            return;
        }
        self.engine.set_position(self.offset_ms);
        self.engine.play();
        self.state = PlaybackState::Playing;
        info!("[player] Started at {} ms", self.offset_ms);
    }

    /// Toggles between playing and paused.  Ignored while stopped.
    pub fn pause_video(&mut self) {
        match self.state {
            PlaybackState::Playing => {
                self.engine.pause();
                self.state = PlaybackState::Paused;
                info!("[player] Paused");
            }
            PlaybackState::Paused => {
                self.engine.play();
                self.state = PlaybackState::Playing;
                info!("[player] Resumed");
            }
            PlaybackState::Stopped => debug!("[player] pause ignored while stopped"),
        }
    }

    /// Stops playback and parks on the frame at the offset, from any state.
    pub fn stop_video(&mut self) {
        self.engine.stop();
        // Pausing after stop keeps a frame on screen instead of a blank view.
        self.engine.pause();
        self.engine.set_position(self.offset_ms);
        self.state = PlaybackState::Stopped;
        info!("[player] Stopped");
    }

    /// Loads a new video and shows its first frame.  The offset is kept.
    pub fn update_source(&mut self, path: &Path) {
        self.engine.set_source(path);
        self.engine.pause();
        self.state = PlaybackState::Stopped;
        self.source = Some(path.to_path_buf());
        self.latched_total = None;
        self.seek_on_load = true;
        info!("[player] Source set to {}", path.display());
    }

    /// Direct seek from the scrubber; the playback state is unchanged.
    pub fn set_position(&mut self, position_ms: u64) {
        self.engine.set_position(position_ms);
    }

    pub fn on_position_changed(&mut self, position_ms: u64) {
        let format = self.format;
        let engine = &self.engine;
        let total = self
            .latched_total
            .get_or_insert_with(|| format_millis(engine.duration(), format));

        self.display.slider_value = position_ms;
        self.display.time_text = format!("{} / {}", format_millis(position_ms, format), total);
    }

    pub fn on_duration_changed(&mut self, duration_ms: u64) {
        self.display.slider_max = duration_ms;
        if self.seek_on_load && duration_ms > 0 {
            self.seek_on_load = false;
            debug!("[player] Media loaded; seeking to offset {} ms", self.offset_ms);
            self.engine.set_position(self.offset_ms);
        }
    }

    /// Sets the offset used by the next start or stop, clamped to [`MAX_OFFSET_MS`].
    pub fn set_offset(&mut self, offset_ms: u64) {
        self.offset_ms = offset_ms.min(MAX_OFFSET_MS);
    }

    /// Changes the label format.  An already-latched total keeps its old rendering.
    pub fn set_time_format(&mut self, format: TimeFormat) {
        self.format = format;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn offset_ms(&self) -> u64 {
        self.offset_ms
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}
