//! Windows pointer injection using SendInput.

use crate::action::Edge;
use crate::display::{self, Rect};
use crate::error::{Error, Result};
use crate::event::{Button, MotionVector, SyntheticEvent};
use std::mem::size_of;
use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    INPUT, INPUT_0, INPUT_MOUSE, MOUSE_EVENT_FLAGS, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_HWHEEL,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_VIRTUALDESK,
    MOUSEEVENTF_WHEEL, MOUSEINPUT, SendInput,
};
use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

use super::display::{displays, virtual_screen};

const WHEEL_DELTA: i32 = 120;

/// Send a mouse event
fn sim_mouse_event(flags: MOUSE_EVENT_FLAGS, data: i32, dx: i32, dy: i32) -> Result<()> {
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: data as u32,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };

    let inputs = [input];
    let result = unsafe { SendInput(&inputs, size_of::<INPUT>() as i32) };

    if result != 1 {
        Err(Error::InjectFailed("SendInput failed for mouse event".into()))
    } else {
        Ok(())
    }
}

fn cursor_pos() -> Result<(f64, f64)> {
    let mut point = POINT::default();
    unsafe { GetCursorPos(&mut point) }
        .map_err(|e| Error::InjectFailed(format!("GetCursorPos failed: {e}")))?;
    Ok((point.x as f64, point.y as f64))
}

/// Map a virtual desktop point onto the 0..=65535 absolute input range.
fn normalize(screen: &Rect, x: f64, y: f64) -> (i32, i32) {
    let nx = ((x - screen.x) * 65535.0 / (screen.width - 1.0).max(1.0)).round();
    let ny = ((y - screen.y) * 65535.0 / (screen.height - 1.0).max(1.0)).round();
    (nx as i32, ny as i32)
}

fn move_to(x: f64, y: f64) -> Result<()> {
    let screen = virtual_screen()?;
    let (nx, ny) = normalize(&screen, x, y);
    sim_mouse_event(
        MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK,
        0,
        nx,
        ny,
    )
}

fn move_by(dx: i32, dy: i32) -> Result<()> {
    let (x, y) = cursor_pos()?;
    let (tx, ty) = (x + dx as f64, y + dy as f64);
    let all = displays()?;
    let (tx, ty) = if all.iter().any(|d| d.bounds.contains(tx, ty)) {
        (tx, ty)
    } else if let Some(current) = display::display_for_point(&all, x, y) {
        current.bounds.clamp(tx, ty)
    } else {
        (tx, ty)
    };
    move_to(tx, ty)
}

fn scroll_by(dx: i32, dy: i32) -> Result<()> {
    if dy != 0 {
        sim_mouse_event(MOUSEEVENTF_WHEEL, dy.saturating_mul(WHEEL_DELTA), 0, 0)?;
    }
    if dx != 0 {
        sim_mouse_event(MOUSEEVENTF_HWHEEL, dx.saturating_mul(WHEEL_DELTA), 0, 0)?;
    }
    Ok(())
}

fn button_flags(button: Button, down: bool) -> MOUSE_EVENT_FLAGS {
    match (button, down) {
        (Button::Left, true) => MOUSEEVENTF_LEFTDOWN,
        (Button::Left, false) => MOUSEEVENTF_LEFTUP,
        (Button::Right, true) => MOUSEEVENTF_RIGHTDOWN,
        (Button::Right, false) => MOUSEEVENTF_RIGHTUP,
        (Button::Middle, true) => MOUSEEVENTF_MIDDLEDOWN,
        (Button::Middle, false) => MOUSEEVENTF_MIDDLEUP,
    }
}

fn jump_to_edge(edge: Edge) -> Result<()> {
    let (x, y) = cursor_pos()?;
    let all = displays()?;
    let current = display::display_for_point(&all, x, y)
        .ok_or_else(|| Error::InjectFailed("no monitor found".into()))?;
    let (tx, ty) = current.bounds.edge_point(edge, x, y);
    move_to(tx, ty)
}

fn motion(vector: &MotionVector) -> Result<()> {
    if vector.has_pointer() {
        move_by(vector.dx, vector.dy)?;
    }
    if vector.has_scroll() {
        scroll_by(vector.scroll_dx, vector.scroll_dy)?;
    }
    Ok(())
}

/// Send one synthetic pointer event.
pub fn inject(event: &SyntheticEvent) -> Result<()> {
    match event {
        SyntheticEvent::Motion(vector) => motion(vector),
        SyntheticEvent::Click(button) => {
            sim_mouse_event(button_flags(*button, true), 0, 0, 0)?;
            sim_mouse_event(button_flags(*button, false), 0, 0, 0)
        }
        SyntheticEvent::ButtonDown(button) => sim_mouse_event(button_flags(*button, true), 0, 0, 0),
        SyntheticEvent::ButtonUp(button) => sim_mouse_event(button_flags(*button, false), 0, 0, 0),
        SyntheticEvent::JumpToEdge(edge) => jump_to_edge(*edge),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_covers_virtual_desktop() {
        let screen = Rect {
            x: -1920.0,
            y: 0.0,
            width: 3840.0,
            height: 1080.0,
        };
        assert_eq!(normalize(&screen, -1920.0, 0.0), (0, 0));
        assert_eq!(normalize(&screen, 1919.0, 1079.0), (65535, 65535));
    }
}
