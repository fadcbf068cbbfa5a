//! Event types flowing into and out of the navigation core.

use crate::action::Edge;
use crate::keycode::Key;
use std::fmt;
use std::ops::BitOr;
use std::time::Instant;

/// Whether a key went down or up.
///
/// OS auto-repeat is delivered as additional `Press` edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEdge {
    Press,
    Release,
}

/// Set of held modifier keys.
///
/// Left and right variants collapse into one flag. Lock keys (Caps, Num,
/// Scroll) are never part of the set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const SHIFT: Modifiers = Modifiers(1 << 0);
    pub const CTRL: Modifiers = Modifiers(1 << 1);
    pub const ALT: Modifiers = Modifiers(1 << 2);
    pub const META: Modifiers = Modifiers(1 << 3);

    /// Rebuild a set from its raw bits, ignoring unknown bits.
    pub const fn from_bits(bits: u8) -> Self {
        Modifiers(bits & 0x0F)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Modifiers) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Modifiers) {
        self.0 &= !other.0;
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Modifiers::CTRL, "ctrl"),
            (Modifiers::ALT, "alt"),
            (Modifiers::SHIFT, "shift"),
            (Modifiers::META, "meta"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A raw keyboard event as observed by a platform backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// The portable key.
    pub key: Key,
    /// The raw platform-specific keycode.
    pub raw_code: u32,
    /// Press or release.
    pub edge: KeyEdge,
    /// Modifiers held when the event occurred.
    pub modifiers: Modifiers,
    /// Monotonic timestamp.
    pub time: Instant,
}

impl KeyEvent {
    /// Create a key press event stamped with the current time.
    pub fn press(key: Key, raw_code: u32, modifiers: Modifiers) -> Self {
        Self {
            key,
            raw_code,
            edge: KeyEdge::Press,
            modifiers,
            time: Instant::now(),
        }
    }

    /// Create a key release event stamped with the current time.
    pub fn release(key: Key, raw_code: u32, modifiers: Modifiers) -> Self {
        Self {
            key,
            raw_code,
            edge: KeyEdge::Release,
            modifiers,
            time: Instant::now(),
        }
    }

    pub fn is_press(&self) -> bool {
        self.edge == KeyEdge::Press
    }
}

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    /// Left mouse button (Button 1).
    Left,
    /// Right mouse button (Button 2).
    Right,
    /// Middle mouse button (Button 3).
    Middle,
}

impl Button {
    /// Get the button number (1-indexed, X11 numbering).
    pub fn number(&self) -> u8 {
        match self {
            Button::Left => 1,
            Button::Middle => 2,
            Button::Right => 3,
        }
    }
}

/// Per-tick relative motion in whole pixels and whole wheel lines.
///
/// Screen y grows downward. Positive `scroll_dy` scrolls content up (wheel
/// away from the user); positive `scroll_dx` scrolls right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionVector {
    pub dx: i32,
    pub dy: i32,
    pub scroll_dx: i32,
    pub scroll_dy: i32,
}

impl MotionVector {
    pub fn is_zero(&self) -> bool {
        self.dx == 0 && self.dy == 0 && self.scroll_dx == 0 && self.scroll_dy == 0
    }

    pub fn has_pointer(&self) -> bool {
        self.dx != 0 || self.dy != 0
    }

    pub fn has_scroll(&self) -> bool {
        self.scroll_dx != 0 || self.scroll_dy != 0
    }
}

/// An event synthesized back into the OS by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticEvent {
    /// Relative pointer motion and/or scroll.
    Motion(MotionVector),
    /// Press and release of a button at the current position.
    Click(Button),
    /// Press a button and keep it down.
    ButtonDown(Button),
    /// Release a previously pressed button.
    ButtonUp(Button),
    /// Move the pointer to a screen edge, keeping the other coordinate.
    JumpToEdge(Edge),
}
