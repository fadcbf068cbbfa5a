//! Modifier tracking for backends whose OS events do not carry a reliable
//! modifier mask (evdev, XRecord, low-level Windows hooks).
//!
//! Left and right keys are tracked separately so that releasing one Shift
//! while the other is still down keeps `SHIFT` in the set.

use crate::event::{KeyEdge, Modifiers};
use crate::keycode::Key;
use std::sync::atomic::{AtomicU8, Ordering};

// One bit per physical modifier key.
const HELD_SHIFT_LEFT: u8 = 1 << 0;
const HELD_SHIFT_RIGHT: u8 = 1 << 1;
const HELD_CTRL_LEFT: u8 = 1 << 2;
const HELD_CTRL_RIGHT: u8 = 1 << 3;
const HELD_ALT_LEFT: u8 = 1 << 4;
const HELD_ALT_RIGHT: u8 = 1 << 5;
const HELD_META_LEFT: u8 = 1 << 6;
const HELD_META_RIGHT: u8 = 1 << 7;

fn held_bit(key: Key) -> u8 {
    match key {
        Key::ShiftLeft => HELD_SHIFT_LEFT,
        Key::ShiftRight => HELD_SHIFT_RIGHT,
        Key::ControlLeft => HELD_CTRL_LEFT,
        Key::ControlRight => HELD_CTRL_RIGHT,
        Key::AltLeft => HELD_ALT_LEFT,
        Key::AltRight => HELD_ALT_RIGHT,
        Key::MetaLeft => HELD_META_LEFT,
        Key::MetaRight => HELD_META_RIGHT,
        _ => 0,
    }
}

fn collapse(held: u8) -> Modifiers {
    let mut mods = Modifiers::NONE;
    if held & (HELD_SHIFT_LEFT | HELD_SHIFT_RIGHT) != 0 {
        mods.insert(Modifiers::SHIFT);
    }
    if held & (HELD_CTRL_LEFT | HELD_CTRL_RIGHT) != 0 {
        mods.insert(Modifiers::CTRL);
    }
    if held & (HELD_ALT_LEFT | HELD_ALT_RIGHT) != 0 {
        mods.insert(Modifiers::ALT);
    }
    if held & (HELD_META_LEFT | HELD_META_RIGHT) != 0 {
        mods.insert(Modifiers::META);
    }
    mods
}

/// Lock-free set of physically held modifier keys.
#[derive(Debug, Default)]
pub struct ModifierTracker {
    held: AtomicU8,
}

impl ModifierTracker {
    pub const fn new() -> Self {
        Self {
            held: AtomicU8::new(0),
        }
    }

    /// Apply a key edge and return the modifier set in effect for it.
    ///
    /// Non-modifier keys leave the set untouched.
    pub fn observe(&self, key: Key, edge: KeyEdge) -> Modifiers {
        let bit = held_bit(key);
        if bit == 0 {
            return self.current();
        }
        let held = match edge {
            KeyEdge::Press => self.held.fetch_or(bit, Ordering::SeqCst) | bit,
            KeyEdge::Release => self.held.fetch_and(!bit, Ordering::SeqCst) & !bit,
        };
        collapse(held)
    }

    /// Currently held modifiers.
    pub fn current(&self) -> Modifiers {
        collapse(self.held.load(Ordering::SeqCst))
    }

    /// Forget every held modifier (e.g. after a device grab is lost).
    pub fn reset(&self) {
        self.held.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release() {
        let tracker = ModifierTracker::new();
        assert!(tracker.current().is_empty());

        assert_eq!(
            tracker.observe(Key::ShiftLeft, KeyEdge::Press),
            Modifiers::SHIFT
        );
        assert_eq!(
            tracker.observe(Key::KeyH, KeyEdge::Press),
            Modifiers::SHIFT
        );
        assert_eq!(
            tracker.observe(Key::ShiftLeft, KeyEdge::Release),
            Modifiers::NONE
        );
    }

    #[test]
    fn test_left_and_right_tracked_separately() {
        let tracker = ModifierTracker::new();
        tracker.observe(Key::ShiftLeft, KeyEdge::Press);
        tracker.observe(Key::ShiftRight, KeyEdge::Press);
        tracker.observe(Key::ShiftLeft, KeyEdge::Release);
        assert!(tracker.current().contains(Modifiers::SHIFT));

        tracker.observe(Key::ShiftRight, KeyEdge::Release);
        assert!(tracker.current().is_empty());
    }

    #[test]
    fn test_locks_are_not_modifiers() {
        let tracker = ModifierTracker::new();
        tracker.observe(Key::CapsLock, KeyEdge::Press);
        tracker.observe(Key::NumLock, KeyEdge::Press);
        assert!(tracker.current().is_empty());
    }

    #[test]
    fn test_reset() {
        let tracker = ModifierTracker::new();
        tracker.observe(Key::ControlRight, KeyEdge::Press);
        tracker.observe(Key::MetaLeft, KeyEdge::Press);
        assert_eq!(tracker.current(), Modifiers::CTRL | Modifiers::META);
        tracker.reset();
        assert!(tracker.current().is_empty());
    }
}
