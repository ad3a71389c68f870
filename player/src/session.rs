/// Event dispatch for the main loop.
///
/// [`Session`] owns the playback controller, the status snapshot and the
/// effective config, and turns each [`PlayerEvent`] into controller calls.
/// Starting and rebinding the keyboard listener stays in `main`, which acts on
/// [`Flow::Reloaded`].
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::Config;
use crate::console::ControlCommand;
use crate::controller::PlaybackController;
use crate::event::PlayerEvent;
use crate::media::MediaEngine;
use crate::sequence::HotkeyAction;
use crate::status::PlayerStatus;

/// Command-line values that take precedence over the config file, on startup
/// and after every reload.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source: Option<PathBuf>,
    pub offset_ms: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(source) = &self.source {
            config.player.source = Some(source.clone());
        }
        if let Some(offset) = self.offset_ms {
            config.player.offset_ms = offset;
        }
    }
}

/// What the loop should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// A new config was applied; the hotkey bindings need refreshing.
    Reloaded,
    Exit,
}

pub struct Session<E: MediaEngine> {
    pub controller: PlaybackController<E>,
    pub status: PlayerStatus,
    config: Config,
    overrides: Overrides,
}

impl<E: MediaEngine> Session<E> {
    /// Applies `overrides` to `config` and builds the controller from it.
    pub fn new(engine: E, mut config: Config, overrides: Overrides, status: PlayerStatus) -> Self {
        overrides.apply(&mut config);
        let controller = PlaybackController::new(
            engine,
            config.player.source.clone(),
            config.player.effective_offset(),
            config.player.time_format,
        );
        Self { controller, status, config, overrides }
    }

    /// The config currently in effect, overrides included.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handle_event(&mut self, evt: PlayerEvent) -> Flow {
        match evt {
            PlayerEvent::SplitRequested => {
                self.status.record_hotkey(HotkeyAction::Split.as_str());
                self.controller.start_video();
            }

            PlayerEvent::ResetRequested => {
                self.status.record_hotkey(HotkeyAction::Reset.as_str());
                self.controller.stop_video();
            }

            PlayerEvent::PauseRequested => {
                self.status.record_hotkey(HotkeyAction::Pause.as_str());
                self.controller.pause_video();
            }

            PlayerEvent::Control(command) => return self.handle_command(command),

            PlayerEvent::PositionChanged(ms) => self.controller.on_position_changed(ms),

            PlayerEvent::DurationChanged(ms) => self.controller.on_duration_changed(ms),

            PlayerEvent::ConfigReloaded(new_config) => {
                info!("Config reloaded");
                self.apply_config(new_config);
                return Flow::Reloaded;
            }

            PlayerEvent::PlayerClosed => {
                info!("Player window closed; shutting down");
                return Flow::Exit;
            }

            PlayerEvent::Shutdown => {
                info!("Shutting down");
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    fn handle_command(&mut self, command: ControlCommand) -> Flow {
        match command {
            ControlCommand::Play => self.controller.start_video(),
            ControlCommand::Pause => self.controller.pause_video(),
            ControlCommand::Stop => self.controller.stop_video(),
            ControlCommand::Seek(ms) => self.controller.set_position(ms),
            ControlCommand::Source(path) => self.controller.update_source(&path),
            ControlCommand::Offset(ms) => self.controller.set_offset(ms),
            ControlCommand::Format(format) => self.controller.set_time_format(format),
            ControlCommand::Status => info!(
                "[status] {:?} | {} | offset {} ms",
                self.controller.state(),
                self.controller.display().time_text,
                self.controller.offset_ms()
            ),
            ControlCommand::Quit => {
                info!("Shutting down");
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    fn apply_config(&mut self, mut new_config: Config) {
        self.overrides.apply(&mut new_config);

        self.controller.set_offset(new_config.player.effective_offset());
        self.controller.set_time_format(new_config.player.time_format);
        if new_config.player.source != self.config.player.source {
            if let Some(path) = &new_config.player.source {
                self.controller.update_source(path);
            }
        }
        if new_config.player.mpv_path != self.config.player.mpv_path {
            warn!("[config] mpv_path changes take effect after a restart");
        }
        self.config = new_config;
    }
}
