//! Linux evdev pointer injection using uinput.
//!
//! A virtual relative pointer is created on first use. Motion is relative,
//! so the compositor applies its own clamping to the screen.

use crate::action::Edge;
use crate::error::{Error, Result};
use crate::event::{Button, MotionVector, SyntheticEvent};
use evdev::{
    AttributeSet, EventType as EvdevEventType, InputEvent, Key as EvdevKey, RelativeAxisType,
    uinput::{VirtualDevice, VirtualDeviceBuilder},
};
use std::sync::{Mutex, MutexGuard};

/// Larger than any screen; the compositor stops the pointer at the edge.
const EDGE_TRAVEL: i32 = 32767;

const POINTER_NAME: &str = "vimnav virtual pointer";

/// Lazy-initialized virtual pointer
static VIRTUAL_POINTER: Mutex<Option<VirtualDevice>> = Mutex::new(None);

/// Get or create the virtual pointer
fn virtual_pointer() -> Result<MutexGuard<'static, Option<VirtualDevice>>> {
    let mut guard = VIRTUAL_POINTER
        .lock()
        .map_err(|_| Error::ThreadError("mutex poisoned".into()))?;

    if guard.is_none() {
        let mut keys = AttributeSet::<EvdevKey>::new();
        keys.insert(EvdevKey::BTN_LEFT);
        keys.insert(EvdevKey::BTN_RIGHT);
        keys.insert(EvdevKey::BTN_MIDDLE);

        let mut rel_axes = AttributeSet::<RelativeAxisType>::new();
        rel_axes.insert(RelativeAxisType::REL_X);
        rel_axes.insert(RelativeAxisType::REL_Y);
        rel_axes.insert(RelativeAxisType::REL_WHEEL);
        rel_axes.insert(RelativeAxisType::REL_HWHEEL);

        let device = VirtualDeviceBuilder::new()
            .map_err(|e| {
                Error::InjectFailed(format!(
                    "Failed to open /dev/uinput: {}. Make sure it is accessible \
                     (you may need to be in the 'input' group or have appropriate udev rules).",
                    e
                ))
            })?
            .name(POINTER_NAME)
            .with_keys(&keys)
            .map_err(|e| Error::InjectFailed(format!("Failed to add buttons: {}", e)))?
            .with_relative_axes(&rel_axes)
            .map_err(|e| Error::InjectFailed(format!("Failed to add relative axes: {}", e)))?
            .build()
            .map_err(|e| Error::InjectFailed(format!("Failed to create virtual pointer: {}", e)))?;

        *guard = Some(device);
    }

    Ok(guard)
}

/// Emit one batch; the device terminates it with SYN_REPORT.
fn emit(events: &[InputEvent]) -> Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    let mut guard = virtual_pointer()?;
    let device = guard
        .as_mut()
        .ok_or_else(|| Error::InjectFailed("Virtual pointer not initialized".into()))?;
    device
        .emit(events)
        .map_err(|e| Error::InjectFailed(format!("Failed to emit pointer event: {}", e)))
}

fn relative(axis: RelativeAxisType, value: i32) -> InputEvent {
    InputEvent::new(EvdevEventType::RELATIVE, axis.0, value)
}

/// Convert Button to evdev key code
fn button_to_evdev_key(button: Button) -> EvdevKey {
    match button {
        Button::Left => EvdevKey::BTN_LEFT,
        Button::Right => EvdevKey::BTN_RIGHT,
        Button::Middle => EvdevKey::BTN_MIDDLE,
    }
}

fn button(button: Button, pressed: bool) -> InputEvent {
    InputEvent::new(
        EvdevEventType::KEY,
        button_to_evdev_key(button).code(),
        pressed as i32,
    )
}

/// REL_WHEEL is positive upwards and REL_HWHEEL positive rightwards, the
/// same orientation as [`MotionVector`] scroll components.
fn motion_events(vector: &MotionVector) -> Vec<InputEvent> {
    [
        (RelativeAxisType::REL_X, vector.dx),
        (RelativeAxisType::REL_Y, vector.dy),
        (RelativeAxisType::REL_WHEEL, vector.scroll_dy),
        (RelativeAxisType::REL_HWHEEL, vector.scroll_dx),
    ]
    .into_iter()
    .filter(|(_, value)| *value != 0)
    .map(|(axis, value)| relative(axis, value))
    .collect()
}

fn edge_event(edge: Edge) -> InputEvent {
    match edge {
        Edge::Top => relative(RelativeAxisType::REL_Y, -EDGE_TRAVEL),
        Edge::Bottom => relative(RelativeAxisType::REL_Y, EDGE_TRAVEL),
        Edge::Left => relative(RelativeAxisType::REL_X, -EDGE_TRAVEL),
        Edge::Right => relative(RelativeAxisType::REL_X, EDGE_TRAVEL),
    }
}

/// Emit one synthetic pointer event.
pub fn inject(event: &SyntheticEvent) -> Result<()> {
    match event {
        SyntheticEvent::Motion(vector) => emit(&motion_events(vector)),
        SyntheticEvent::Click(b) => {
            emit(&[button(*b, true)])?;
            emit(&[button(*b, false)])
        }
        SyntheticEvent::ButtonDown(b) => emit(&[button(*b, true)]),
        SyntheticEvent::ButtonUp(b) => emit(&[button(*b, false)]),
        SyntheticEvent::JumpToEdge(edge) => emit(&[edge_event(*edge)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_events_skip_zero_axes() {
        let events = motion_events(&MotionVector {
            dx: 3,
            dy: 0,
            scroll_dx: 0,
            scroll_dy: -2,
        });
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].code(), RelativeAxisType::REL_X.0);
        assert_eq!(events[0].value(), 3);
        assert_eq!(events[1].code(), RelativeAxisType::REL_WHEEL.0);
        assert_eq!(events[1].value(), -2);
        assert!(motion_events(&MotionVector::default()).is_empty());
    }

    #[test]
    fn test_edge_event_direction() {
        let top = edge_event(Edge::Top);
        assert_eq!(top.code(), RelativeAxisType::REL_Y.0);
        assert_eq!(top.value(), -EDGE_TRAVEL);
        assert_eq!(edge_event(Edge::Right).value(), EDGE_TRAVEL);
    }
}
