//! macOS pointer injection using CGEvent.

#![allow(unused_unsafe)]

use crate::action::Edge;
use crate::display::{self, DisplayInfo};
use crate::error::{Error, Result};
use crate::event::{Button, MotionVector, SyntheticEvent};
use objc2_core_foundation::{CFRetained, CGPoint};
use objc2_core_graphics::{
    CGEvent, CGEventField, CGEventSource, CGEventSourceStateID, CGEventTapLocation, CGEventType,
    CGMouseButton, CGScrollEventUnit,
};
use std::sync::Mutex;

use super::display::displays;

/// Button currently held down by a drag, if any. Motion while it is held
/// is posted as a dragged event so applications see a drag.
static HELD_BUTTON: Mutex<Option<Button>> = Mutex::new(None);

/// Marker written to `EventSourceUserData` on every event vimnav posts.
pub(crate) const INJECTED_TAG: i64 = 0x766e_6176;

fn post(event: &CGEvent) {
    unsafe {
        CGEvent::set_integer_value_field(
            Some(event),
            CGEventField::EventSourceUserData,
            INJECTED_TAG,
        );
        CGEvent::post(CGEventTapLocation::HIDEventTap, Some(event));
    }
}

fn event_source() -> Result<CFRetained<CGEventSource>> {
    unsafe { CGEventSource::new(CGEventSourceStateID::HIDSystemState) }
        .ok_or_else(|| Error::InjectFailed("Failed to create event source".into()))
}

/// Get current mouse location
fn current_location(source: &CGEventSource) -> Result<CGPoint> {
    unsafe {
        let event = CGEvent::new(Some(source))
            .ok_or_else(|| Error::InjectFailed("Failed to create event".into()))?;
        Ok(CGEvent::location(Some(&event)))
    }
}

fn held_button() -> Option<Button> {
    *HELD_BUTTON.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn set_held_button(button: Option<Button>) {
    *HELD_BUTTON.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = button;
}

/// Convert our Button to CGMouseButton.
fn button_to_cg_button(button: Button) -> CGMouseButton {
    match button {
        Button::Left => CGMouseButton::Left,
        Button::Right => CGMouseButton::Right,
        Button::Middle => CGMouseButton::Center,
    }
}

/// Keep `target` on a display; off-screen targets are clamped to the
/// display the pointer is currently on.
fn constrain(all: &[DisplayInfo], from: CGPoint, target: CGPoint) -> CGPoint {
    if all.iter().any(|d| d.bounds.contains(target.x, target.y)) {
        return target;
    }
    match display::display_for_point(all, from.x, from.y) {
        Some(d) => {
            let (x, y) = d.bounds.clamp(target.x, target.y);
            CGPoint { x, y }
        }
        None => target,
    }
}

fn post_move(source: &CGEventSource, point: CGPoint) -> Result<()> {
    let (event_type, cg_button) = match held_button() {
        Some(Button::Left) => (CGEventType::LeftMouseDragged, CGMouseButton::Left),
        Some(Button::Right) => (CGEventType::RightMouseDragged, CGMouseButton::Right),
        Some(Button::Middle) => (CGEventType::OtherMouseDragged, CGMouseButton::Center),
        None => (CGEventType::MouseMoved, CGMouseButton::Left),
    };
    unsafe {
        let event = CGEvent::new_mouse_event(Some(source), event_type, point, cg_button)
            .ok_or_else(|| Error::InjectFailed("Failed to create mouse event".into()))?;
        post(&event);
    }
    Ok(())
}

fn move_by(source: &CGEventSource, dx: i32, dy: i32) -> Result<()> {
    let from = current_location(source)?;
    let target = CGPoint {
        x: from.x + dx as f64,
        y: from.y + dy as f64,
    };
    let target = match displays() {
        Ok(all) => constrain(&all, from, target),
        Err(e) => {
            log::debug!("display query failed, moving unclamped: {e}");
            target
        }
    };
    post_move(source, target)
}

fn scroll_by(source: &CGEventSource, dx: i32, dy: i32) -> Result<()> {
    unsafe {
        // Positive wheel 2 scrolls left.
        let event = CGEvent::new_scroll_wheel_event2(
            Some(source),
            CGScrollEventUnit::Line,
            2, // wheel_count
            dy,
            -dx,
            0,
        )
        .ok_or_else(|| Error::InjectFailed("Failed to create scroll event".into()))?;

        post(&event);
    }
    Ok(())
}

fn post_button(source: &CGEventSource, button: Button, down: bool) -> Result<()> {
    let point = current_location(source)?;
    let event_type = match (button, down) {
        (Button::Left, true) => CGEventType::LeftMouseDown,
        (Button::Left, false) => CGEventType::LeftMouseUp,
        (Button::Right, true) => CGEventType::RightMouseDown,
        (Button::Right, false) => CGEventType::RightMouseUp,
        (Button::Middle, true) => CGEventType::OtherMouseDown,
        (Button::Middle, false) => CGEventType::OtherMouseUp,
    };

    unsafe {
        let event =
            CGEvent::new_mouse_event(Some(source), event_type, point, button_to_cg_button(button))
                .ok_or_else(|| Error::InjectFailed("Failed to create mouse event".into()))?;

        if button == Button::Middle {
            CGEvent::set_integer_value_field(
                Some(&event),
                CGEventField::MouseEventButtonNumber,
                2,
            );
        }

        post(&event);
    }
    Ok(())
}

fn jump_to_edge(source: &CGEventSource, edge: Edge) -> Result<()> {
    let from = current_location(source)?;
    let all = displays()?;
    let display = display::display_for_point(&all, from.x, from.y)
        .ok_or_else(|| Error::InjectFailed("no active display".into()))?;
    let (x, y) = display.bounds.edge_point(edge, from.x, from.y);
    post_move(source, CGPoint { x, y })
}

fn motion(source: &CGEventSource, vector: &MotionVector) -> Result<()> {
    if vector.has_pointer() {
        move_by(source, vector.dx, vector.dy)?;
    }
    if vector.has_scroll() {
        scroll_by(source, vector.scroll_dx, vector.scroll_dy)?;
    }
    Ok(())
}

/// Post one synthetic pointer event.
pub fn inject(event: &SyntheticEvent) -> Result<()> {
    let source = event_source()?;
    match event {
        SyntheticEvent::Motion(vector) => motion(&source, vector),
        SyntheticEvent::Click(button) => {
            post_button(&source, *button, true)?;
            post_button(&source, *button, false)
        }
        SyntheticEvent::ButtonDown(button) => {
            post_button(&source, *button, true)?;
            set_held_button(Some(*button));
            Ok(())
        }
        SyntheticEvent::ButtonUp(button) => {
            set_held_button(None);
            post_button(&source, *button, false)
        }
        SyntheticEvent::JumpToEdge(edge) => jump_to_edge(&source, *edge),
    }
}
