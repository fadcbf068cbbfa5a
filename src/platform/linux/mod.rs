//! Linux platform implementation.
//!
//! Supports two backends:
//! - **evdev** (default): grabs keyboards under /dev/input and injects
//!   through uinput. Works on X11 and Wayland and can consume keys.
//! - **X11**: XRecord for listening, XTest for injection. Keys cannot be
//!   consumed, so they also reach the focused window.
//!
//! ## Feature Flags
//!
//! - `evdev` (default): use evdev/uinput
//! - `x11`: use X11 (build with `--no-default-features --features x11`)
//!
//! When both are enabled, evdev is used.
//!
//! ## Permissions for evdev
//!
//! The evdev backend requires access to /dev/input devices and /dev/uinput:
//! ```bash
//! sudo usermod -aG input $USER
//! # Then log out and back in
//! ```

#[cfg(any(feature = "x11", feature = "evdev"))]
mod keycodes;

#[cfg(all(feature = "x11", not(feature = "evdev")))]
mod x11;

#[cfg(feature = "evdev")]
mod evdev;

#[cfg(feature = "evdev")]
pub use evdev::*;

#[cfg(all(feature = "x11", not(feature = "evdev")))]
pub use x11::*;

// If neither X11 nor evdev features are enabled, provide stub implementations
#[cfg(not(any(feature = "x11", feature = "evdev")))]
mod stub {
    use crate::backend::{Capability, KeyHandler};
    use crate::display::DisplayInfo;
    use crate::error::{Error, Result};
    use crate::event::SyntheticEvent;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    const NO_BACKEND: &str = "No Linux backend enabled. Enable 'x11' or 'evdev' feature.";

    pub fn run_grab_hook(_running: &Arc<AtomicBool>, _handler: Box<dyn KeyHandler>) -> Result<()> {
        Err(Error::NotSupported(NO_BACKEND.into()))
    }

    pub fn stop_hook() -> Result<()> {
        Ok(())
    }

    pub fn inject(_event: &SyntheticEvent) -> Result<()> {
        Err(Error::NotSupported(NO_BACKEND.into()))
    }

    pub fn capability() -> Capability {
        Capability::Unknown
    }

    pub fn displays() -> Result<Vec<DisplayInfo>> {
        Err(Error::NotSupported(NO_BACKEND.into()))
    }
}

#[cfg(not(any(feature = "x11", feature = "evdev")))]
pub use stub::*;
