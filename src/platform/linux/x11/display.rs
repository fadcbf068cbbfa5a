//! X11 display queries.

use crate::display::{DisplayInfo, Rect};
use crate::error::{Error, Result};
use std::ptr::null;
use x11::xlib;

/// The default screen as a single display.
pub fn displays() -> Result<Vec<DisplayInfo>> {
    with_display(|display| unsafe {
        let screen = xlib::XDefaultScreen(display);
        let width = xlib::XDisplayWidth(display, screen) as f64;
        let height = xlib::XDisplayHeight(display, screen) as f64;

        Ok(vec![DisplayInfo {
            id: 1,
            bounds: Rect {
                x: 0.0,
                y: 0.0,
                width,
                height,
            },
            is_primary: true,
        }])
    })
}

/// Whether an X server is reachable from this process.
pub fn can_open_display() -> bool {
    with_display(|_| Ok(())).is_ok()
}

pub(super) fn with_display<T>(f: impl FnOnce(*mut xlib::Display) -> Result<T>) -> Result<T> {
    unsafe {
        let display = xlib::XOpenDisplay(null());
        if display.is_null() {
            return Err(Error::Platform("XOpenDisplay failed".into()));
        }
        let result = f(display);
        xlib::XCloseDisplay(display);
        result
    }
}
