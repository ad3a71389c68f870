/// Global hotkey listener built on `rdev`'s system-wide keyboard hook.
///
/// The hook runs on a dedicated OS thread, so sequences are detected even
/// while the timer's browser window or a game has focus.  Completed sequences
/// are posted to the event loop as [`PlayerEvent`]s; the listener never touches
/// playback state itself.
///
/// Releasing the configured stop key (default Escape) stops the listener.
/// rdev cannot unregister its hook, so a stopped listener keeps its thread
/// parked in the OS hook and simply ignores every further event.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use rdev::EventType;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::HotkeyConfig;
use crate::event::PlayerEvent;
use crate::sequence::{HotkeyBindings, SequenceMatcher};
use crate::status::PlayerStatus;

// ── Public handle ─────────────────────────────────────────────────────────────

/// A handle to the running keyboard listener.
///
/// Allows swapping the key bindings on config reload and stopping the
/// listener when the player exits.
pub struct HotkeyHandle {
    matcher: Arc<Mutex<SequenceMatcher>>,
    stopped: Arc<AtomicBool>,
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyHandle {
    /// Replaces the bindings and zeroes all sequence cursors.
    pub fn update_bindings(&self, bindings: HotkeyBindings) {
        self.matcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_bindings(bindings);
    }

    /// `false` once the stop key was released, `stop` was called, or the OS hook failed.
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Relaxed)
    }

    /// Stops delivering hotkey events.
    pub fn stop(self) {
        self.stopped.store(true, Ordering::Relaxed);
        info!("[hotkey] Listener stopped");
    }
}

/// A running listener whose bindings can be swapped in place.
pub trait Rebind {
    fn rebind(&self, bindings: HotkeyBindings);
}

impl Rebind for HotkeyHandle {
    fn rebind(&self, bindings: HotkeyBindings) {
        self.update_bindings(bindings);
    }
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

/// Resolves `config` and starts a listener with `start`.
/// Failures land in `status.hotkey_error`; playback stays usable from the console.
pub fn start_with<L>(
    config: &HotkeyConfig,
    status: &mut PlayerStatus,
    start: impl FnOnce(HotkeyBindings) -> Result<L>,
) -> Option<L> {
    let bindings = match config.bindings() {
        Ok(b) => b,
        Err(e) => {
            error!("[hotkey] Invalid bindings: {e}");
            status.hotkey_error = Some(format!("Invalid hotkeys: {e}"));
            return None;
        }
    };
    match start(bindings) {
        Ok(listener) => {
            status.hotkey_error = None;
            Some(listener)
        }
        Err(e) => {
            error!("[hotkey] {e:#}");
            status.hotkey_error = Some(format!("Hotkey listener unavailable: {e}"));
            None
        }
    }
}

/// Applies reloaded bindings to the listener in `slot`, or starts one if the
/// listener never came up.  Invalid bindings leave a running listener as it was.
pub fn refresh<L: Rebind>(
    slot: &mut Option<L>,
    config: &HotkeyConfig,
    status: &mut PlayerStatus,
    start: impl FnOnce(HotkeyBindings) -> Result<L>,
) {
    match slot {
        Some(listener) => match config.bindings() {
            Ok(bindings) => {
                listener.rebind(bindings);
                status.hotkey_error = None;
            }
            Err(e) => {
                warn!("[hotkey] Keeping previous bindings: {e}");
                status.hotkey_error = Some(format!("Invalid hotkeys: {e}"));
            }
        },
        None => {
            info!("[hotkey] Starting listener with reloaded bindings");
            *slot = start_with(config, status, start);
        }
    }
}

// ── Startup ───────────────────────────────────────────────────────────────────

/// Installs the global keyboard hook on a dedicated OS thread and returns a
/// [`HotkeyHandle`] for managing it.
///
/// Each completed sequence is sent to `tx` via a non-blocking
/// [`try_send`](mpsc::Sender::try_send).  If the channel is full the event is
/// dropped for that press.
pub fn start(bindings: HotkeyBindings, tx: mpsc::Sender<PlayerEvent>) -> Result<HotkeyHandle> {
    debug!(
        "[hotkey] split {:?}, reset {:?}, pause {:?}, stop on {:?} ({:?} on mismatch)",
        bindings.split.keys(),
        bindings.reset.keys(),
        bindings.pause.keys(),
        bindings.stop_listener,
        bindings.mismatch,
    );
    let matcher = Arc::new(Mutex::new(SequenceMatcher::new(bindings)));
    let stopped = Arc::new(AtomicBool::new(false));

    let handler = KeyHandler {
        matcher: Arc::clone(&matcher),
        stopped: Arc::clone(&stopped),
        tx,
    };
    let failed = Arc::clone(&stopped);

    let thread = std::thread::Builder::new()
        .name("hotkey-listener".into())
        .spawn(move || {
            if let Err(e) = rdev::listen(move |event| handler.handle(&event.event_type)) {
                error!("[hotkey] Keyboard hook failed: {e:?}");
            }
            failed.store(true, Ordering::Relaxed);
        })
        .context("Failed to spawn hotkey thread")?;

    info!("[hotkey] Listening for global hotkeys");
    Ok(HotkeyHandle { matcher, stopped, _thread: thread })
}

/// Per-event logic run on the listener thread.
struct KeyHandler {
    matcher: Arc<Mutex<SequenceMatcher>>,
    stopped: Arc<AtomicBool>,
    tx: mpsc::Sender<PlayerEvent>,
}

impl KeyHandler {
    fn handle(&self, event: &EventType) {
        if self.stopped.load(Ordering::Relaxed) {
            return;
        }

        match *event {
            EventType::KeyPress(key) => {
                let actions = self
                    .matcher
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .feed(key);
                for action in actions {
                    debug!("[hotkey] {} sequence completed", action.as_str());
                    if self.tx.try_send(action.into()).is_err() {
                        warn!("[hotkey] Event queue unavailable; dropped {}", action.as_str());
                    }
                }
            }
            EventType::KeyRelease(key) => {
                let is_stop = self
                    .matcher
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_stop_key(key);
                if is_stop {
                    self.stopped.store(true, Ordering::Relaxed);
                    info!("[hotkey] Stop key released; listener stopped");
                }
            }
            _ => {}
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HotkeyConfig;
    use rdev::Key;

    fn handler(capacity: usize) -> (KeyHandler, mpsc::Receiver<PlayerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        let bindings = HotkeyConfig::default().bindings().unwrap();
        let handler = KeyHandler {
            matcher: Arc::new(Mutex::new(SequenceMatcher::new(bindings))),
            stopped: Arc::new(AtomicBool::new(false)),
            tx,
        };
        (handler, rx)
    }

    fn press_all(handler: &KeyHandler, keys: &[Key]) {
        for &key in keys {
            handler.handle(&EventType::KeyPress(key));
        }
    }

    const SPLIT: [Key; 4] = [Key::ControlLeft, Key::Alt, Key::ShiftLeft, Key::F1];

    #[test]
    fn completed_split_posts_one_event() {
        let (h, mut rx) = handler(8);
        press_all(&h, &SPLIT);
        assert!(matches!(rx.try_recv(), Ok(PlayerEvent::SplitRequested)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn each_sequence_maps_to_its_event() {
        let (h, mut rx) = handler(8);
        press_all(&h, &[Key::ControlLeft, Key::ShiftLeft, Key::Alt, Key::F2]);
        press_all(&h, &[Key::Pause]);
        assert!(matches!(rx.try_recv(), Ok(PlayerEvent::ResetRequested)));
        assert!(matches!(rx.try_recv(), Ok(PlayerEvent::PauseRequested)));
    }

    #[test]
    fn releases_do_not_advance_sequences() {
        let (h, mut rx) = handler(8);
        for &key in &SPLIT {
            h.handle(&EventType::KeyRelease(key));
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(
            h.matcher.lock().unwrap().cursor(crate::sequence::HotkeyAction::Split),
            0
        );
    }

    #[test]
    fn releasing_stop_key_silences_listener() {
        let (h, mut rx) = handler(8);
        h.handle(&EventType::KeyPress(Key::Escape));
        assert!(!h.stopped.load(Ordering::Relaxed), "press alone must not stop");

        h.handle(&EventType::KeyRelease(Key::Escape));
        assert!(h.stopped.load(Ordering::Relaxed));

        press_all(&h, &SPLIT);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn full_queue_drops_event_without_blocking() {
        let (h, mut rx) = handler(1);
        press_all(&h, &[Key::Pause, Key::Pause]);
        assert!(matches!(rx.try_recv(), Ok(PlayerEvent::PauseRequested)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_queue_is_tolerated() {
        let (h, rx) = handler(1);
        drop(rx);
        press_all(&h, &[Key::Pause]);
    }

    #[test]
    fn mouse_events_are_ignored() {
        let (h, mut rx) = handler(8);
        h.handle(&EventType::MouseMove { x: 1.0, y: 2.0 });
        assert!(rx.try_recv().is_err());
    }

    // ── start_with / refresh ──────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeListener {
        rebinds: std::cell::Cell<usize>,
    }

    impl Rebind for FakeListener {
        fn rebind(&self, _bindings: HotkeyBindings) {
            self.rebinds.set(self.rebinds.get() + 1);
        }
    }

    fn invalid_config() -> HotkeyConfig {
        HotkeyConfig {
            reset: vec!["ctrl".into(), "hyper".into()],
            ..HotkeyConfig::default()
        }
    }

    fn started(_: HotkeyBindings) -> Result<FakeListener> {
        Ok(FakeListener::default())
    }

    #[test]
    fn invalid_startup_bindings_start_nothing() {
        let mut status = PlayerStatus::new();
        let mut called = false;
        let slot = start_with(&invalid_config(), &mut status, |_| {
            called = true;
            Ok(FakeListener::default())
        });
        assert!(slot.is_none());
        assert!(!called);
        assert!(status.hotkey_error.unwrap().contains("hyper"));
    }

    #[test]
    fn failed_start_is_recorded() {
        let mut status = PlayerStatus::new();
        let slot: Option<FakeListener> = start_with(&HotkeyConfig::default(), &mut status, |_| {
            anyhow::bail!("no display")
        });
        assert!(slot.is_none());
        assert!(status.hotkey_error.unwrap().contains("no display"));
    }

    #[test]
    fn fixed_config_starts_listener_that_never_came_up() {
        let mut status = PlayerStatus::new();
        let mut slot = start_with(&invalid_config(), &mut status, started);
        assert!(slot.is_none());

        refresh(&mut slot, &HotkeyConfig::default(), &mut status, started);
        assert!(slot.is_some());
        assert!(status.hotkey_error.is_none());
    }

    #[test]
    fn reload_rebinds_running_listener() {
        let mut status = PlayerStatus::new();
        let mut slot = Some(FakeListener::default());
        refresh(&mut slot, &HotkeyConfig::default(), &mut status, |_| {
            panic!("a running listener must not be started again")
        });
        assert_eq!(slot.unwrap().rebinds.get(), 1);
    }

    #[test]
    fn invalid_reload_keeps_running_listener() {
        let mut status = PlayerStatus::new();
        let mut slot = Some(FakeListener::default());
        refresh(&mut slot, &invalid_config(), &mut status, started);
        assert_eq!(slot.as_ref().unwrap().rebinds.get(), 0);
        assert!(status.hotkey_error.is_some());

        refresh(&mut slot, &HotkeyConfig::default(), &mut status, started);
        assert_eq!(slot.unwrap().rebinds.get(), 1);
        assert!(status.hotkey_error.is_none());
    }
}
