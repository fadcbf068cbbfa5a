//! Key bindings and the immutable snapshot the translator reads.

use crate::action::NavigationAction;
use crate::event::Modifiers;
use crate::keycode::Key;
use crate::motion::MotionTuning;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

/// How a binding treats the modifier set of an incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierMatch {
    /// Only this exact set of modifiers matches.
    Exact(Modifiers),
    /// Any modifier set matches, unless an exact binding claims it first.
    Any,
}

/// A key plus modifier requirement, written `shift+h` or `any+space` in
/// configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    pub key: Key,
    pub modifiers: ModifierMatch,
}

impl Chord {
    pub fn new(key: Key, modifiers: ModifierMatch) -> Self {
        Self { key, modifiers }
    }

    /// A chord that fires with no modifiers held.
    pub fn bare(key: Key) -> Self {
        Self::new(key, ModifierMatch::Exact(Modifiers::NONE))
    }

    pub fn matches(&self, key: Key, modifiers: Modifiers) -> bool {
        if self.key != key {
            return false;
        }
        match self.modifiers {
            ModifierMatch::Exact(required) => required == modifiers,
            ModifierMatch::Any => true,
        }
    }
}

fn parse_modifier(name: &str) -> Option<Modifiers> {
    match name {
        "shift" => Some(Modifiers::SHIFT),
        "ctrl" | "control" => Some(Modifiers::CTRL),
        "alt" | "option" => Some(Modifiers::ALT),
        "meta" | "cmd" | "super" | "win" => Some(Modifiers::META),
        _ => None,
    }
}

impl FromStr for Chord {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim().to_ascii_lowercase();
        if spec.is_empty() {
            return Err("empty key spec".into());
        }
        let (prefix, key_name) = spec.rsplit_once('+').unwrap_or(("", spec.as_str()));
        let key: Key = key_name.parse()?;

        let mut mods = Modifiers::NONE;
        let mut any = false;
        for part in prefix.split('+').filter(|p| !p.is_empty()) {
            if part == "any" {
                any = true;
            } else if let Some(flag) = parse_modifier(part) {
                mods.insert(flag);
            } else {
                return Err(format!("unknown modifier '{part}' in '{s}'"));
            }
        }
        if any && !mods.is_empty() {
            return Err(format!("'any' cannot be combined with other modifiers in '{s}'"));
        }

        let modifiers = if any {
            ModifierMatch::Any
        } else {
            ModifierMatch::Exact(mods)
        };
        Ok(Chord { key, modifiers })
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifiers {
            ModifierMatch::Any => write!(f, "any+{}", self.key),
            ModifierMatch::Exact(mods) if mods.is_empty() => write!(f, "{}", self.key),
            ModifierMatch::Exact(mods) => write!(f, "{mods}+{}", self.key),
        }
    }
}

/// One configured `chord → action` mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub chord: Chord,
    pub action: NavigationAction,
}

impl Binding {
    pub fn new(chord: Chord, action: NavigationAction) -> Self {
        Self { chord, action }
    }
}

/// Validated, immutable view of the active configuration.
///
/// Duplicate detection is the configuration provider's job; if duplicates
/// do reach this constructor the later binding wins.
#[derive(Debug, Clone)]
pub struct BindingSnapshot {
    toggle: Chord,
    exact: HashMap<(Key, Modifiers), NavigationAction>,
    fallback: HashMap<Key, NavigationAction>,
    bindings: Vec<Binding>,
    tuning: MotionTuning,
}

impl BindingSnapshot {
    pub fn new(toggle: Chord, bindings: Vec<Binding>, tuning: MotionTuning) -> Self {
        let mut exact = HashMap::new();
        let mut fallback = HashMap::new();
        for binding in &bindings {
            match binding.chord.modifiers {
                ModifierMatch::Exact(mods) => {
                    exact.insert((binding.chord.key, mods), binding.action);
                }
                ModifierMatch::Any => {
                    fallback.insert(binding.chord.key, binding.action);
                }
            }
        }
        Self {
            toggle,
            exact,
            fallback,
            bindings,
            tuning,
        }
    }

    pub fn toggle(&self) -> Chord {
        self.toggle
    }

    /// Look a key up: exact modifier match first, then the fallback.
    pub fn lookup(&self, key: Key, modifiers: Modifiers) -> Option<NavigationAction> {
        self.exact
            .get(&(key, modifiers))
            .or_else(|| self.fallback.get(&key))
            .copied()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn tuning(&self) -> &MotionTuning {
        &self.tuning
    }
}

/// Shared slot holding the current snapshot.
///
/// Reload replaces the whole `Arc`; readers clone it and never observe a
/// half-updated snapshot. `None` means no valid configuration was ever
/// supplied.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    inner: RwLock<Option<Arc<BindingSnapshot>>>,
}

impl SnapshotCell {
    pub fn new(snapshot: Option<BindingSnapshot>) -> Self {
        Self {
            inner: RwLock::new(snapshot.map(Arc::new)),
        }
    }

    pub fn load(&self) -> Option<Arc<BindingSnapshot>> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Swap in a new snapshot, returning the previous one.
    pub fn store(&self, snapshot: BindingSnapshot) -> Option<Arc<BindingSnapshot>> {
        let next = Some(Arc::new(snapshot));
        match self.inner.write() {
            Ok(mut guard) => std::mem::replace(&mut *guard, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Direction, HoldKind, Magnitude};

    #[test]
    fn test_parse_chords() {
        let chord: Chord = "shift+h".parse().unwrap();
        assert_eq!(chord.key, Key::KeyH);
        assert_eq!(chord.modifiers, ModifierMatch::Exact(Modifiers::SHIFT));

        let chord: Chord = "Ctrl+Cmd+J".parse().unwrap();
        assert_eq!(
            chord.modifiers,
            ModifierMatch::Exact(Modifiers::CTRL | Modifiers::META)
        );

        let chord: Chord = "any+space".parse().unwrap();
        assert_eq!(chord, Chord::new(Key::Space, ModifierMatch::Any));

        let chord: Chord = "escape".parse().unwrap();
        assert_eq!(chord, Chord::bare(Key::Escape));
    }

    #[test]
    fn test_parse_chord_errors() {
        assert!("".parse::<Chord>().is_err());
        assert!("hyper+h".parse::<Chord>().is_err());
        assert!("any+shift+h".parse::<Chord>().is_err());
        assert!("shift+nosuchkey".parse::<Chord>().is_err());
    }

    #[test]
    fn test_chord_display() {
        assert_eq!("shift+g".parse::<Chord>().unwrap().to_string(), "shift+g");
        assert_eq!("any+space".parse::<Chord>().unwrap().to_string(), "any+space");
        assert_eq!(Chord::bare(Key::Enter).to_string(), "return");
    }

    #[test]
    fn test_chord_matching() {
        let exact = Chord::bare(Key::Escape);
        assert!(exact.matches(Key::Escape, Modifiers::NONE));
        assert!(!exact.matches(Key::Escape, Modifiers::SHIFT));

        let any = Chord::new(Key::Space, ModifierMatch::Any);
        assert!(any.matches(Key::Space, Modifiers::SHIFT | Modifiers::ALT));
        assert!(!any.matches(Key::KeyH, Modifiers::NONE));
    }

    #[test]
    fn test_lookup_prefers_exact() {
        let snapshot = BindingSnapshot::new(
            Chord::bare(Key::Escape),
            vec![
                Binding::new(
                    Chord::new(Key::KeyH, ModifierMatch::Any),
                    NavigationAction::ModifierHold(HoldKind::Precision),
                ),
                Binding::new(
                    Chord::bare(Key::KeyH),
                    NavigationAction::MoveCursor(Direction::Left, Magnitude::Normal),
                ),
            ],
            MotionTuning::default(),
        );
        assert_eq!(
            snapshot.lookup(Key::KeyH, Modifiers::NONE),
            Some(NavigationAction::MoveCursor(Direction::Left, Magnitude::Normal))
        );
        assert_eq!(
            snapshot.lookup(Key::KeyH, Modifiers::ALT),
            Some(NavigationAction::ModifierHold(HoldKind::Precision))
        );
        assert_eq!(snapshot.lookup(Key::KeyJ, Modifiers::NONE), None);
    }

    #[test]
    fn test_snapshot_cell_swap() {
        let cell = SnapshotCell::default();
        assert!(cell.load().is_none());

        let first = BindingSnapshot::new(Chord::bare(Key::Escape), vec![], MotionTuning::default());
        assert!(cell.store(first).is_none());
        let held = cell.load().unwrap();

        let second = BindingSnapshot::new(Chord::bare(Key::F12), vec![], MotionTuning::default());
        let previous = cell.store(second).unwrap();

        // Readers holding the old Arc keep a consistent view.
        assert_eq!(held.toggle().key, Key::Escape);
        assert_eq!(previous.toggle().key, Key::Escape);
        assert_eq!(cell.load().unwrap().toggle().key, Key::F12);
    }
}
