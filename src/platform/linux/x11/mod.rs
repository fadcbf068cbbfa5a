//! X11 implementation: XRecord for capture, XTest for injection.

mod display;
mod listen;
mod simulate;

pub use display::displays;
pub use listen::{run_grab_hook, stop_hook};
pub use simulate::inject;

use crate::backend::Capability;

/// X11 grants any client that can connect.
pub fn capability() -> Capability {
    if display::can_open_display() {
        Capability::Granted
    } else {
        Capability::Denied
    }
}
