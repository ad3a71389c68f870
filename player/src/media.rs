use std::path::Path;

/// Media-playback backend driven by the [`PlaybackController`].
///
/// Every command is fire-and-forget: implementations queue the request and
/// return immediately.  Results are observed later through
/// [`PlayerEvent::PositionChanged`] and [`PlayerEvent::DurationChanged`]
/// notifications on the event channel.
///
/// [`PlaybackController`]: crate::controller::PlaybackController
/// [`PlayerEvent::PositionChanged`]: crate::event::PlayerEvent::PositionChanged
/// [`PlayerEvent::DurationChanged`]: crate::event::PlayerEvent::DurationChanged
pub trait MediaEngine {
    /// Loads a new video, replacing the current one.
    fn set_source(&mut self, path: &Path);
    fn play(&mut self);
    fn pause(&mut self);
    /// Halts playback and rewinds to the start of the media.
    fn stop(&mut self);
    /// Seeks to `position_ms` without changing play/pause state.
    fn set_position(&mut self, position_ms: u64);
    /// Duration of the loaded media in milliseconds, or 0 while unknown.
    fn duration(&self) -> u64;
}
