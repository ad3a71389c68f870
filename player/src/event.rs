use crate::config::Config;
use crate::console::ControlCommand;
use crate::sequence::HotkeyAction;

pub enum PlayerEvent {
    /// The split hotkey sequence completed; start playback.
    SplitRequested,
    /// The reset hotkey sequence completed; stop and rewind to the offset.
    ResetRequested,
    /// The pause hotkey sequence completed; toggle pause.
    PauseRequested,
    /// A command typed on the control console.
    Control(ControlCommand),
    /// The media engine reported a new playback position (ms).
    PositionChanged(u64),
    /// The media engine reported the media duration (ms).
    DurationChanged(u64),
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// The player window was closed or the media engine exited.
    PlayerClosed,
    /// Ctrl+C or `quit`; the player should write final state and exit.
    Shutdown,
}

impl From<HotkeyAction> for PlayerEvent {
    fn from(action: HotkeyAction) -> Self {
        match action {
            HotkeyAction::Split => PlayerEvent::SplitRequested,
            HotkeyAction::Reset => PlayerEvent::ResetRequested,
            HotkeyAction::Pause => PlayerEvent::PauseRequested,
        }
    }
}
