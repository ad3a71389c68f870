/// Fixed-length key-sequence detection for the split / reset / pause hotkeys.
///
/// Each bound sequence has its own [`SequenceTracker`] holding a cursor into the
/// sequence.  Every key press is offered to all trackers independently, so one
/// press may advance several of them and may complete more than one sequence.
use rdev::Key;
use serde::Deserialize;
use thiserror::Error;

use crate::keys::normalize;

/// The action a completed sequence requests from the playback controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Split,
    Reset,
    Pause,
}

impl HotkeyAction {
    pub fn as_str(self) -> &'static str {
        match self {
            HotkeyAction::Split => "split",
            HotkeyAction::Reset => "reset",
            HotkeyAction::Pause => "pause",
        }
    }
}

/// What a tracker does with its cursor when the incoming key is not the one it expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Fall back along the sequence's own prefix structure, so a key that
    /// could begin (or continue) a shorter partial match keeps it.
    #[default]
    Restart,
    /// Always drop to 0, even when the key equals the first element.
    Reset,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("a key sequence must contain at least one key")]
pub struct EmptySequence;

/// An ordered, non-empty list of canonical keys.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySequence {
    keys: Vec<Key>,
    /// `fallback[i]` is the length of the longest proper prefix of
    /// `keys[..=i]` that is also a suffix of it.
    fallback: Vec<usize>,
}

impl KeySequence {
    pub fn new(keys: Vec<Key>) -> Result<Self, EmptySequence> {
        if keys.is_empty() {
            return Err(EmptySequence);
        }
        let keys: Vec<Key> = keys.into_iter().map(normalize).collect();
        let fallback = prefix_function(&keys);
        Ok(Self { keys, fallback })
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }
}

fn prefix_function(keys: &[Key]) -> Vec<usize> {
    let mut fallback = vec![0; keys.len()];
    let mut k = 0;
    for i in 1..keys.len() {
        while k > 0 && keys[i] != keys[k] {
            k = fallback[k - 1];
        }
        if keys[i] == keys[k] {
            k += 1;
        }
        fallback[i] = k;
    }
    fallback
}

/// Cursor state for one bound sequence.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    action: HotkeyAction,
    sequence: KeySequence,
    cursor: usize,
}

impl SequenceTracker {
    pub fn new(action: HotkeyAction, sequence: KeySequence) -> Self {
        Self { action, sequence, cursor: 0 }
    }

    /// Advances or rewinds the cursor for `key` and returns `true` when the
    /// sequence has just been completed.
    fn advance(&mut self, key: Key, policy: MismatchPolicy) -> bool {
        let keys = &self.sequence.keys;
        match policy {
            MismatchPolicy::Reset => {
                if self.cursor < keys.len() && keys[self.cursor] == key {
                    self.cursor += 1;
                } else {
                    self.cursor = 0;
                }
            }
            MismatchPolicy::Restart => loop {
                if self.cursor < keys.len() && keys[self.cursor] == key {
                    self.cursor += 1;
                    break;
                }
                if self.cursor == 0 {
                    break;
                }
                self.cursor = self.sequence.fallback[self.cursor - 1];
            },
        }
        self.cursor == keys.len()
    }
}

/// Key bindings for the three hotkey sequences and the listener-stop key.
#[derive(Debug, Clone)]
pub struct HotkeyBindings {
    pub split: KeySequence,
    pub reset: KeySequence,
    pub pause: KeySequence,
    /// Releasing this key stops the background listener.
    pub stop_listener: Key,
    pub mismatch: MismatchPolicy,
}

/// Tracks every bound sequence against a serial stream of key presses.
pub struct SequenceMatcher {
    trackers: Vec<SequenceTracker>,
    stop_listener: Key,
    policy: MismatchPolicy,
}

impl SequenceMatcher {
    pub fn new(bindings: HotkeyBindings) -> Self {
        let mut matcher = Self {
            trackers: Vec::new(),
            stop_listener: Key::Escape,
            policy: MismatchPolicy::default(),
        };
        matcher.set_bindings(bindings);
        matcher
    }

    /// Replaces all bindings and zeroes every cursor.
    pub fn set_bindings(&mut self, bindings: HotkeyBindings) {
        self.trackers = vec![
            SequenceTracker::new(HotkeyAction::Split, bindings.split),
            SequenceTracker::new(HotkeyAction::Reset, bindings.reset),
            SequenceTracker::new(HotkeyAction::Pause, bindings.pause),
        ];
        self.stop_listener = normalize(bindings.stop_listener);
        self.policy = bindings.mismatch;
    }

    /// Feeds one key press; returns the actions whose sequence it completed,
    /// in split / reset / pause order.
    pub fn feed(&mut self, key: Key) -> Vec<HotkeyAction> {
        let key = normalize(key);
        let policy = self.policy;
        self.trackers
            .iter_mut()
            .filter_map(|t| t.advance(key, policy).then_some(t.action))
            .collect()
    }

    /// Returns `true` if releasing `key` should stop the listener.
    pub fn is_stop_key(&self, key: Key) -> bool {
        normalize(key) == self.stop_listener
    }

    #[cfg(test)]
    pub fn cursor(&self, action: HotkeyAction) -> usize {
        self.trackers
            .iter()
            .find(|t| t.action == action)
            .map_or(0, |t| t.cursor)
    }
}
