//! Linux evdev implementation.
//!
//! Keys are read from `/dev/input/event*` and pointer events are written to
//! `/dev/uinput`. This works on both X11 and Wayland.
//!
//! ## Permissions
//!
//! The process must be able to read the keyboard devices and write
//! `/dev/uinput`, either as root (not recommended) or as a user in the
//! `input` group with a matching udev rule for uinput:
//! ```bash
//! sudo usermod -aG input $USER
//! # Then log out and back in
//! ```

mod listen;
mod simulate;

pub use listen::{run_grab_hook, stop_hook};
pub use simulate::inject;

use crate::backend::Capability;
use crate::display::DisplayInfo;
use crate::error::{Error, Result};
use std::ffi::CString;
use std::fs;

/// Names of the uinput devices we create; never grabbed back.
const DEVICE_NAME_PREFIX: &str = "vimnav ";

fn accessible(path: &str, mode: libc::c_int) -> bool {
    let Ok(path) = CString::new(path) else {
        return false;
    };
    // SAFETY: `path` is a valid NUL-terminated string.
    unsafe { libc::access(path.as_ptr(), mode) == 0 }
}

/// Granted when uinput is writable and at least one event device is
/// readable.
pub fn capability() -> Capability {
    if !accessible("/dev/uinput", libc::R_OK | libc::W_OK) {
        return Capability::Denied;
    }
    let Ok(dir) = fs::read_dir("/dev/input") else {
        return Capability::Denied;
    };
    let readable = dir.flatten().any(|entry| {
        entry.file_name().to_string_lossy().starts_with("event")
            && entry
                .path()
                .to_str()
                .is_some_and(|path| accessible(path, libc::R_OK))
    });
    if readable {
        Capability::Granted
    } else {
        Capability::Denied
    }
}

pub fn displays() -> Result<Vec<DisplayInfo>> {
    Err(Error::NotSupported(
        "Display information not available for evdev backend".into(),
    ))
}
