//! macOS backend: a CGEventTap for capture, CGEventPost for injection.
//!
//! Both require the process to be trusted for Accessibility
//! (System Settings > Privacy & Security > Accessibility).

mod display;
mod keycodes;
mod listen;
mod simulate;

pub use display::displays;
pub use listen::{run_grab_hook, stop_hook};
pub use simulate::inject;

use crate::backend::Capability;

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrusted() -> bool;
}

/// Accessibility trust is re-read on every call; the user can revoke it
/// at any time.
pub fn capability() -> Capability {
    // SAFETY: no arguments, reads process-wide trust state.
    if unsafe { AXIsProcessTrusted() } {
        Capability::Granted
    } else {
        Capability::Denied
    }
}
