/// Key-name parsing and normalisation for hotkey sequences.
///
/// Both named keys (`"ctrl"`, `"f1"`, `"pause"`) and raw key codes (`"#135"`,
/// `"code:135"`) resolve to an [`rdev::Key`], which is the canonical value the
/// sequence matcher compares.  Raw codes become [`Key::Unknown`], exactly what
/// rdev reports for keys it has no name for, so a binding written as a raw code
/// matches the event the listener actually sees.
///
/// Raw codes are platform keycodes as rdev reports them: the X keycode on
/// Linux, the virtual-key code on Windows, the `CGKeyCode` on macOS.  They are
/// not X keysyms, so a keysym such as 65511 (`Meta_L`) never matches on X11.
use rdev::Key;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("empty key name")]
    Empty,
    #[error("unknown key name '{0}'")]
    Unknown(String),
    #[error("invalid raw key code '{0}'")]
    BadCode(String),
}

/// Folds side-specific modifier variants onto a single canonical key.
///
/// `"ctrl"` in a config file means either Control key, so `ControlRight` is
/// reported as `ControlLeft`, and likewise for Shift, Alt/AltGr and Meta.
pub fn normalize(key: Key) -> Key {
    match key {
        Key::ControlRight => Key::ControlLeft,
        Key::ShiftRight => Key::ShiftLeft,
        Key::AltGr => Key::Alt,
        Key::MetaRight => Key::MetaLeft,
        other => other,
    }
}

/// Converts a key name from the config file to its canonical [`Key`].
///
/// Names are case-insensitive.  Supported:
/// - modifiers `ctrl`/`control`, `alt`, `shift`, `meta`/`super`/`win`/`cmd`
/// - function keys `F1`–`F12`
/// - ASCII letters and digits
/// - navigation and editing keys (`escape`, `pause`, `space`, `home`, ...)
/// - raw platform keycodes written as `#<n>` or `code:<n>`
pub fn parse_key(name: &str) -> Result<Key, KeyParseError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(KeyParseError::Empty);
    }

    let lower = trimmed.to_ascii_lowercase();
    if let Some(code) = lower
        .strip_prefix('#')
        .or_else(|| lower.strip_prefix("code:"))
    {
        return code
            .parse::<u32>()
            .map(Key::Unknown)
            .map_err(|_| KeyParseError::BadCode(trimmed.to_string()));
    }

    let key = match lower.as_str() {
        "ctrl" | "control" | "ctrl_l" | "ctrl_r" => Key::ControlLeft,
        "alt" | "alt_l" | "alt_r" | "alt_gr" | "altgr" => Key::Alt,
        "shift" | "shift_l" | "shift_r" => Key::ShiftLeft,
        "meta" | "super" | "win" | "cmd" => Key::MetaLeft,

        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,

        "esc" | "escape" => Key::Escape,
        "pause" | "break" => Key::Pause,
        "space" => Key::Space,
        "tab" => Key::Tab,
        "enter" | "return" => Key::Return,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "insert" | "ins" => Key::Insert,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "page_up" => Key::PageUp,
        "pagedown" | "page_down" => Key::PageDown,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "printscreen" | "print_screen" => Key::PrintScreen,
        "scrolllock" | "scroll_lock" => Key::ScrollLock,
        "capslock" | "caps_lock" => Key::CapsLock,
        "numlock" | "num_lock" => Key::NumLock,

        s if s.len() == 1 => {
            let c = s.chars().next().unwrap_or_default();
            char_key(c).ok_or_else(|| KeyParseError::Unknown(trimmed.to_string()))?
        }
        _ => return Err(KeyParseError::Unknown(trimmed.to_string())),
    };
    Ok(key)
}

/// Parses a whole sequence of key names, failing on the first bad entry.
pub fn parse_keys<S: AsRef<str>>(names: &[S]) -> Result<Vec<Key>, KeyParseError> {
    names.iter().map(|n| parse_key(n.as_ref())).collect()
}

fn char_key(c: char) -> Option<Key> {
    let key = match c {
        'a' => Key::KeyA,
        'b' => Key::KeyB,
        'c' => Key::KeyC,
        'd' => Key::KeyD,
        'e' => Key::KeyE,
        'f' => Key::KeyF,
        'g' => Key::KeyG,
        'h' => Key::KeyH,
        'i' => Key::KeyI,
        'j' => Key::KeyJ,
        'k' => Key::KeyK,
        'l' => Key::KeyL,
        'm' => Key::KeyM,
        'n' => Key::KeyN,
        'o' => Key::KeyO,
        'p' => Key::KeyP,
        'q' => Key::KeyQ,
        'r' => Key::KeyR,
        's' => Key::KeyS,
        't' => Key::KeyT,
        'u' => Key::KeyU,
        'v' => Key::KeyV,
        'w' => Key::KeyW,
        'x' => Key::KeyX,
        'y' => Key::KeyY,
        'z' => Key::KeyZ,
        '0' => Key::Num0,
        '1' => Key::Num1,
        '2' => Key::Num2,
        '3' => Key::Num3,
        '4' => Key::Num4,
        '5' => Key::Num5,
        '6' => Key::Num6,
        '7' => Key::Num7,
        '8' => Key::Num8,
        '9' => Key::Num9,
        _ => return None,
    };
    Some(key)
}
