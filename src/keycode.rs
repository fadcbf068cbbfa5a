//! Physical key identifiers and their configuration names.

use crate::event::Modifiers;
use std::fmt;
use std::str::FromStr;

/// Platform-independent physical key.
///
/// Keys are named after their position on a US QWERTY layout; the backend
/// maps raw scan/virtual codes onto these before translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    // Letters
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF,
    KeyG,
    KeyH,
    KeyI,
    KeyJ,
    KeyK,
    KeyL,
    KeyM,
    KeyN,
    KeyO,
    KeyP,
    KeyQ,
    KeyR,
    KeyS,
    KeyT,
    KeyU,
    KeyV,
    KeyW,
    KeyX,
    KeyY,
    KeyZ,

    // Numbers (top row)
    Num0,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,

    // Function keys
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,

    // Modifiers
    ShiftLeft,
    ShiftRight,
    ControlLeft,
    ControlRight,
    AltLeft,
    AltRight,
    MetaLeft, // Windows/Command/Super
    MetaRight,

    // Editing and navigation
    Escape,
    Tab,
    CapsLock,
    Space,
    Enter,
    Backspace,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    // Lock keys
    NumLock,
    ScrollLock,
    PrintScreen,
    Pause,

    // Punctuation
    Grave,
    Minus,
    Equal,
    BracketLeft,
    BracketRight,
    Backslash,
    Semicolon,
    Quote,
    Comma,
    Period,
    Slash,
    IntlBackslash,

    // Numpad
    Numpad0,
    Numpad1,
    Numpad2,
    Numpad3,
    Numpad4,
    Numpad5,
    Numpad6,
    Numpad7,
    Numpad8,
    Numpad9,
    NumpadAdd,
    NumpadSubtract,
    NumpadMultiply,
    NumpadDivide,
    NumpadDecimal,
    NumpadEnter,

    /// A key with no portable name, carrying its raw platform code.
    Unknown(u32),
}

/// Canonical configuration names. The first entry for a key is the one
/// printed back; later entries are accepted aliases.
const NAMES: &[(&str, Key)] = &[
    ("a", Key::KeyA),
    ("b", Key::KeyB),
    ("c", Key::KeyC),
    ("d", Key::KeyD),
    ("e", Key::KeyE),
    ("f", Key::KeyF),
    ("g", Key::KeyG),
    ("h", Key::KeyH),
    ("i", Key::KeyI),
    ("j", Key::KeyJ),
    ("k", Key::KeyK),
    ("l", Key::KeyL),
    ("m", Key::KeyM),
    ("n", Key::KeyN),
    ("o", Key::KeyO),
    ("p", Key::KeyP),
    ("q", Key::KeyQ),
    ("r", Key::KeyR),
    ("s", Key::KeyS),
    ("t", Key::KeyT),
    ("u", Key::KeyU),
    ("v", Key::KeyV),
    ("w", Key::KeyW),
    ("x", Key::KeyX),
    ("y", Key::KeyY),
    ("z", Key::KeyZ),
    ("0", Key::Num0),
    ("1", Key::Num1),
    ("2", Key::Num2),
    ("3", Key::Num3),
    ("4", Key::Num4),
    ("5", Key::Num5),
    ("6", Key::Num6),
    ("7", Key::Num7),
    ("8", Key::Num8),
    ("9", Key::Num9),
    ("f1", Key::F1),
    ("f2", Key::F2),
    ("f3", Key::F3),
    ("f4", Key::F4),
    ("f5", Key::F5),
    ("f6", Key::F6),
    ("f7", Key::F7),
    ("f8", Key::F8),
    ("f9", Key::F9),
    ("f10", Key::F10),
    ("f11", Key::F11),
    ("f12", Key::F12),
    ("lshift", Key::ShiftLeft),
    ("rshift", Key::ShiftRight),
    ("lctrl", Key::ControlLeft),
    ("rctrl", Key::ControlRight),
    ("lalt", Key::AltLeft),
    ("ralt", Key::AltRight),
    ("lmeta", Key::MetaLeft),
    ("rmeta", Key::MetaRight),
    ("escape", Key::Escape),
    ("esc", Key::Escape),
    ("tab", Key::Tab),
    ("capslock", Key::CapsLock),
    ("space", Key::Space),
    ("return", Key::Enter),
    ("enter", Key::Enter),
    ("backspace", Key::Backspace),
    ("insert", Key::Insert),
    ("delete", Key::Delete),
    ("home", Key::Home),
    ("end", Key::End),
    ("pageup", Key::PageUp),
    ("pagedown", Key::PageDown),
    ("up", Key::ArrowUp),
    ("down", Key::ArrowDown),
    ("left", Key::ArrowLeft),
    ("right", Key::ArrowRight),
    ("numlock", Key::NumLock),
    ("scrolllock", Key::ScrollLock),
    ("printscreen", Key::PrintScreen),
    ("pause", Key::Pause),
    ("grave", Key::Grave),
    ("`", Key::Grave),
    ("minus", Key::Minus),
    ("-", Key::Minus),
    ("equal", Key::Equal),
    ("=", Key::Equal),
    ("lbracket", Key::BracketLeft),
    ("[", Key::BracketLeft),
    ("rbracket", Key::BracketRight),
    ("]", Key::BracketRight),
    ("backslash", Key::Backslash),
    ("\\", Key::Backslash),
    ("semicolon", Key::Semicolon),
    (";", Key::Semicolon),
    ("quote", Key::Quote),
    ("'", Key::Quote),
    ("comma", Key::Comma),
    (",", Key::Comma),
    ("period", Key::Period),
    (".", Key::Period),
    ("slash", Key::Slash),
    ("/", Key::Slash),
    ("intlbackslash", Key::IntlBackslash),
    ("kp0", Key::Numpad0),
    ("kp1", Key::Numpad1),
    ("kp2", Key::Numpad2),
    ("kp3", Key::Numpad3),
    ("kp4", Key::Numpad4),
    ("kp5", Key::Numpad5),
    ("kp6", Key::Numpad6),
    ("kp7", Key::Numpad7),
    ("kp8", Key::Numpad8),
    ("kp9", Key::Numpad9),
    ("kpplus", Key::NumpadAdd),
    ("kpminus", Key::NumpadSubtract),
    ("kpmultiply", Key::NumpadMultiply),
    ("kpdivide", Key::NumpadDivide),
    ("kpdecimal", Key::NumpadDecimal),
    ("kpenter", Key::NumpadEnter),
];

impl Key {
    /// Canonical configuration name, if the key has one.
    pub fn name(&self) -> Option<&'static str> {
        NAMES
            .iter()
            .find(|(_, key)| key == self)
            .map(|(name, _)| *name)
    }

    /// The modifier flag this key contributes while held, if any.
    pub fn modifier(&self) -> Option<Modifiers> {
        match self {
            Key::ShiftLeft | Key::ShiftRight => Some(Modifiers::SHIFT),
            Key::ControlLeft | Key::ControlRight => Some(Modifiers::CTRL),
            Key::AltLeft | Key::AltRight => Some(Modifiers::ALT),
            Key::MetaLeft | Key::MetaRight => Some(Modifiers::META),
            _ => None,
        }
    }

    /// Check if this is a modifier key.
    pub fn is_modifier(&self) -> bool {
        self.modifier().is_some()
    }
}

impl Default for Key {
    fn default() -> Self {
        Key::Unknown(0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self) {
            (Some(name), _) => f.write_str(name),
            (None, Key::Unknown(code)) => write!(f, "<{code}>"),
            (None, other) => write!(f, "{other:?}"),
        }
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        NAMES
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, key)| *key)
            .ok_or_else(|| format!("unknown key name '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!("h".parse::<Key>(), Ok(Key::KeyH));
        assert_eq!("Escape".parse::<Key>(), Ok(Key::Escape));
        assert_eq!("esc".parse::<Key>(), Ok(Key::Escape));
        assert_eq!("return".parse::<Key>(), Ok(Key::Enter));
        assert_eq!("enter".parse::<Key>(), Ok(Key::Enter));
        assert!("hyper".parse::<Key>().is_err());
    }

    #[test]
    fn test_display_uses_canonical_name() {
        assert_eq!(Key::Enter.to_string(), "return");
        assert_eq!(Key::Escape.to_string(), "escape");
        assert_eq!(Key::Unknown(300).to_string(), "<300>");
    }

    #[test]
    fn test_modifier_keys() {
        assert_eq!(Key::ShiftRight.modifier(), Some(Modifiers::SHIFT));
        assert_eq!(Key::MetaLeft.modifier(), Some(Modifiers::META));
        assert!(Key::ControlLeft.is_modifier());
        assert!(!Key::KeyH.is_modifier());
        assert!(!Key::CapsLock.is_modifier());
    }
}
