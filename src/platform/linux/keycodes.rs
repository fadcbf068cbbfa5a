//! Linux keycode to Key mappings.
//!
//! X11 keycodes are evdev keycodes shifted by 8, so one table serves both
//! backends.

use crate::keycode::Key;

// Conversion constant: X11 keycode = evdev keycode + 8
#[cfg(feature = "evdev")]
const X11_EVDEV_OFFSET: u32 = 8;

/// Convert an X11 keycode to our Key enum.
pub fn keycode_to_key(code: u32) -> Key {
    match code {
        // Letters (QWERTY layout)
        38 => Key::KeyA,
        56 => Key::KeyB,
        54 => Key::KeyC,
        40 => Key::KeyD,
        26 => Key::KeyE,
        41 => Key::KeyF,
        42 => Key::KeyG,
        43 => Key::KeyH,
        31 => Key::KeyI,
        44 => Key::KeyJ,
        45 => Key::KeyK,
        46 => Key::KeyL,
        58 => Key::KeyM,
        57 => Key::KeyN,
        32 => Key::KeyO,
        33 => Key::KeyP,
        24 => Key::KeyQ,
        27 => Key::KeyR,
        39 => Key::KeyS,
        28 => Key::KeyT,
        30 => Key::KeyU,
        55 => Key::KeyV,
        25 => Key::KeyW,
        53 => Key::KeyX,
        29 => Key::KeyY,
        52 => Key::KeyZ,

        // Numbers
        19 => Key::Num0,
        10 => Key::Num1,
        11 => Key::Num2,
        12 => Key::Num3,
        13 => Key::Num4,
        14 => Key::Num5,
        15 => Key::Num6,
        16 => Key::Num7,
        17 => Key::Num8,
        18 => Key::Num9,

        // Function keys
        67 => Key::F1,
        68 => Key::F2,
        69 => Key::F3,
        70 => Key::F4,
        71 => Key::F5,
        72 => Key::F6,
        73 => Key::F7,
        74 => Key::F8,
        75 => Key::F9,
        76 => Key::F10,
        95 => Key::F11,
        96 => Key::F12,

        // Modifiers
        50 => Key::ShiftLeft,
        62 => Key::ShiftRight,
        37 => Key::ControlLeft,
        105 => Key::ControlRight,
        64 => Key::AltLeft,
        108 => Key::AltRight,
        133 => Key::MetaLeft,
        134 => Key::MetaRight,

        // Navigation and special
        22 => Key::Backspace,
        23 => Key::Tab,
        36 => Key::Enter,
        66 => Key::CapsLock,
        9 => Key::Escape,
        65 => Key::Space,
        112 => Key::PageUp,
        117 => Key::PageDown,
        115 => Key::End,
        110 => Key::Home,
        113 => Key::ArrowLeft,
        111 => Key::ArrowUp,
        114 => Key::ArrowRight,
        116 => Key::ArrowDown,
        118 => Key::Insert,
        119 => Key::Delete,

        // Lock keys
        77 => Key::NumLock,
        78 => Key::ScrollLock,
        107 => Key::PrintScreen,
        127 => Key::Pause,

        // Punctuation
        49 => Key::Grave,
        20 => Key::Minus,
        21 => Key::Equal,
        34 => Key::BracketLeft,
        35 => Key::BracketRight,
        51 => Key::Backslash,
        47 => Key::Semicolon,
        48 => Key::Quote,
        59 => Key::Comma,
        60 => Key::Period,
        61 => Key::Slash,
        94 => Key::IntlBackslash,

        // Numpad
        90 => Key::Numpad0,
        87 => Key::Numpad1,
        88 => Key::Numpad2,
        89 => Key::Numpad3,
        83 => Key::Numpad4,
        84 => Key::Numpad5,
        85 => Key::Numpad6,
        79 => Key::Numpad7,
        80 => Key::Numpad8,
        81 => Key::Numpad9,
        63 => Key::NumpadMultiply,
        86 => Key::NumpadAdd,
        82 => Key::NumpadSubtract,
        91 => Key::NumpadDecimal,
        106 => Key::NumpadDivide,
        104 => Key::NumpadEnter,

        _ => Key::Unknown(code),
    }
}

/// Convert an evdev keycode to our Key enum.
#[cfg(feature = "evdev")]
pub fn evdev_keycode_to_key(code: u16) -> Key {
    match keycode_to_key((code as u32).wrapping_add(X11_EVDEV_OFFSET)) {
        Key::Unknown(_) => Key::Unknown(code as u32),
        key => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x11_home_row() {
        assert_eq!(keycode_to_key(43), Key::KeyH);
        assert_eq!(keycode_to_key(44), Key::KeyJ);
        assert_eq!(keycode_to_key(45), Key::KeyK);
        assert_eq!(keycode_to_key(46), Key::KeyL);
        assert_eq!(keycode_to_key(9), Key::Escape);
    }

    #[cfg(feature = "evdev")]
    #[test]
    fn test_evdev_offset() {
        // KEY_H, KEY_ESC, KEY_LEFTSHIFT
        assert_eq!(evdev_keycode_to_key(35), Key::KeyH);
        assert_eq!(evdev_keycode_to_key(1), Key::Escape);
        assert_eq!(evdev_keycode_to_key(42), Key::ShiftLeft);
        assert_eq!(evdev_keycode_to_key(600), Key::Unknown(600));
    }
}
