//! X11 pointer injection using XTest.

use crate::action::Edge;
use crate::display::Rect;
use crate::error::{Error, Result};
use crate::event::{Button, MotionVector, SyntheticEvent};
use std::os::raw::{c_int, c_uint};
use x11::xlib;
use x11::xtest;

use super::display::with_display;

const TRUE: c_int = 1;
const FALSE: c_int = 0;

/// Core protocol wheel buttons.
const WHEEL_UP: c_uint = 4;
const WHEEL_DOWN: c_uint = 5;
const WHEEL_LEFT: c_uint = 6;
const WHEEL_RIGHT: c_uint = 7;

/// Pointer position on the root window.
fn pointer_position(display: *mut xlib::Display) -> Result<(f64, f64)> {
    let screen = unsafe { xlib::XDefaultScreen(display) };
    let root = unsafe { xlib::XRootWindow(display, screen) };

    let mut root_return = 0;
    let mut child_return = 0;
    let mut root_x: c_int = 0;
    let mut root_y: c_int = 0;
    let mut win_x: c_int = 0;
    let mut win_y: c_int = 0;
    let mut mask: c_uint = 0;

    let result = unsafe {
        xlib::XQueryPointer(
            display,
            root,
            &mut root_return,
            &mut child_return,
            &mut root_x,
            &mut root_y,
            &mut win_x,
            &mut win_y,
            &mut mask,
        )
    };

    if result == FALSE {
        Err(Error::InjectFailed("XQueryPointer failed".into()))
    } else {
        Ok((root_x as f64, root_y as f64))
    }
}

fn check(result: c_int, what: &str) -> Result<()> {
    if result == 0 {
        Err(Error::InjectFailed(format!("{what} failed")))
    } else {
        Ok(())
    }
}

/// Get X11 button code
fn button_to_code(button: Button) -> c_uint {
    match button {
        Button::Left => 1,
        Button::Middle => 2,
        Button::Right => 3,
    }
}

fn fake_button(display: *mut xlib::Display, code: c_uint, pressed: bool) -> Result<()> {
    let is_press = if pressed { TRUE } else { FALSE };
    check(
        unsafe { xtest::XTestFakeButtonEvent(display, code, is_press, 0) },
        "XTestFakeButtonEvent",
    )
}

/// Wheel steps become repeated clicks of buttons 4 to 7.
fn wheel_clicks(vector: &MotionVector) -> Vec<(c_uint, u32)> {
    let mut clicks = Vec::new();
    if vector.scroll_dy != 0 {
        let button = if vector.scroll_dy > 0 { WHEEL_UP } else { WHEEL_DOWN };
        clicks.push((button, vector.scroll_dy.unsigned_abs()));
    }
    if vector.scroll_dx != 0 {
        let button = if vector.scroll_dx > 0 { WHEEL_RIGHT } else { WHEEL_LEFT };
        clicks.push((button, vector.scroll_dx.unsigned_abs()));
    }
    clicks
}

fn motion(display: *mut xlib::Display, vector: &MotionVector) -> Result<()> {
    if vector.has_pointer() {
        // The server clamps relative motion to the screen.
        check(
            unsafe { xtest::XTestFakeRelativeMotionEvent(display, vector.dx, vector.dy, 0) },
            "XTestFakeRelativeMotionEvent",
        )?;
    }
    for (button, count) in wheel_clicks(vector) {
        for _ in 0..count {
            fake_button(display, button, true)?;
            fake_button(display, button, false)?;
        }
    }
    Ok(())
}

fn jump_to_edge(display: *mut xlib::Display, edge: Edge) -> Result<()> {
    let (x, y) = pointer_position(display)?;
    let screen = unsafe { xlib::XDefaultScreen(display) };
    let bounds = Rect {
        x: 0.0,
        y: 0.0,
        width: unsafe { xlib::XDisplayWidth(display, screen) } as f64,
        height: unsafe { xlib::XDisplayHeight(display, screen) } as f64,
    };
    let (tx, ty) = bounds.edge_point(edge, x, y);
    check(
        unsafe { xtest::XTestFakeMotionEvent(display, -1, tx as c_int, ty as c_int, 0) },
        "XTestFakeMotionEvent",
    )
}

/// Send one synthetic pointer event through XTest.
pub fn inject(event: &SyntheticEvent) -> Result<()> {
    with_display(|display| {
        let result = match event {
            SyntheticEvent::Motion(vector) => motion(display, vector),
            SyntheticEvent::Click(button) => {
                let code = button_to_code(*button);
                fake_button(display, code, true).and_then(|_| fake_button(display, code, false))
            }
            SyntheticEvent::ButtonDown(button) => {
                fake_button(display, button_to_code(*button), true)
            }
            SyntheticEvent::ButtonUp(button) => {
                fake_button(display, button_to_code(*button), false)
            }
            SyntheticEvent::JumpToEdge(edge) => jump_to_edge(display, *edge),
        };
        unsafe {
            xlib::XFlush(display);
            xlib::XSync(display, FALSE);
        }
        result
    })
}
