//! Key translation: physical key + modifiers → navigation action.

use crate::action::NavigationAction;
use crate::binding::BindingSnapshot;
use crate::event::KeyEvent;

/// Translate a key event against a snapshot.
///
/// The toggle chord shadows every other binding on the same key and
/// modifiers. Otherwise an exact modifier match beats a modifier-insensitive
/// fallback. `None` means the key is not ours and should pass through.
pub fn translate(event: &KeyEvent, snapshot: &BindingSnapshot) -> Option<NavigationAction> {
    if snapshot.toggle().matches(event.key, event.modifiers) {
        return Some(NavigationAction::ToggleMode);
    }
    snapshot.lookup(event.key, event.modifiers)
}
