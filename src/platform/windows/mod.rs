//! Windows backend: WH_KEYBOARD_LL for capture, SendInput for injection.

mod display;
mod keycodes;
mod listen;
mod simulate;

pub use display::displays;
pub use listen::{run_grab_hook, stop_hook};
pub use simulate::inject;

use crate::backend::Capability;

/// Low-level hooks and SendInput need no grant on Windows. Injection into
/// elevated windows is still blocked by UIPI.
pub fn capability() -> Capability {
    Capability::Granted
}
