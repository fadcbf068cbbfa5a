//! The modal controller: decides whether navigation mode is active and
//! whether each key event is swallowed or passed through.

use crate::action::NavigationAction;
use crate::backend::{Capability, Disposition};
use crate::binding::SnapshotCell;
use crate::event::{KeyEdge, KeyEvent};
use crate::keycode::Key;
use crate::motion::MotionHandle;
use crate::status::{StatusEvent, StatusSink};
use crate::translate::translate;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Whether navigation mode is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeState {
    Inactive,
    Active,
}

impl fmt::Display for ModeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeState::Inactive => f.write_str("inactive"),
            ModeState::Active => f.write_str("active"),
        }
    }
}

/// Why a mode transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionReason {
    /// The user pressed the toggle chord.
    Toggle,
    /// The OS revoked (or never granted) input permission.
    CapabilityDenied,
    /// A configuration reload was rejected.
    ConfigRejected,
    Shutdown,
}

impl TransitionReason {
    fn is_forced(self) -> bool {
        self != TransitionReason::Toggle
    }
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionReason::Toggle => f.write_str("toggle"),
            TransitionReason::CapabilityDenied => f.write_str("capability denied"),
            TransitionReason::ConfigRejected => f.write_str("config rejected"),
            TransitionReason::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// Two-state machine driving consumption decisions.
///
/// Mode is `Active` only while the toggle has been seen an odd number of
/// times since the last forced reset and injection capability is granted.
pub struct ModalController {
    mode: ModeState,
    snapshots: Arc<SnapshotCell>,
    motion: MotionHandle,
    status: Arc<dyn StatusSink>,
    capability: Capability,
    toggles: u64,
    /// Keys whose press was consumed, with the action they started.
    swallowed: HashMap<Key, Option<NavigationAction>>,
    warned_unconfigured: bool,
}

impl ModalController {
    pub fn new(
        snapshots: Arc<SnapshotCell>,
        motion: MotionHandle,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        motion.disable();
        Self {
            mode: ModeState::Inactive,
            snapshots,
            motion,
            status,
            capability: Capability::Unknown,
            toggles: 0,
            swallowed: HashMap::new(),
            warned_unconfigured: false,
        }
    }

    pub fn mode(&self) -> ModeState {
        self.mode
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Toggle occurrences since start or the last forced reset.
    pub fn toggle_count(&self) -> u64 {
        self.toggles
    }

    /// Decide the fate of one key event.
    pub fn handle(&mut self, event: &KeyEvent) -> Disposition {
        match event.edge {
            KeyEdge::Press => self.on_press(event),
            KeyEdge::Release => self.on_release(event),
        }
    }

    fn on_press(&mut self, event: &KeyEvent) -> Disposition {
        // Auto-repeat of a swallowed key: keep swallowing, do not re-trigger.
        if self.swallowed.contains_key(&event.key) {
            return Disposition::Consume;
        }

        let Some(snapshot) = self.snapshots.load() else {
            if !self.warned_unconfigured {
                log::warn!("no valid configuration loaded; navigation mode is unavailable");
                self.warned_unconfigured = true;
            }
            return Disposition::PassThrough;
        };

        match translate(event, &snapshot) {
            Some(NavigationAction::ToggleMode) => {
                self.on_toggle();
                self.swallowed.insert(event.key, None);
                Disposition::Consume
            }
            Some(action) if self.mode == ModeState::Active => {
                log::trace!("{} -> {action}", event.key);
                self.motion.begin(event.key, action);
                self.swallowed.insert(event.key, Some(action));
                Disposition::Consume
            }
            _ => Disposition::PassThrough,
        }
    }

    fn on_release(&mut self, event: &KeyEvent) -> Disposition {
        match self.swallowed.remove(&event.key) {
            Some(Some(_)) => {
                self.motion.end(event.key);
                Disposition::Consume
            }
            Some(None) => Disposition::Consume,
            None => Disposition::PassThrough,
        }
    }

    fn on_toggle(&mut self) {
        match self.mode {
            ModeState::Active => {
                self.toggles += 1;
                self.transition(ModeState::Inactive, TransitionReason::Toggle);
            }
            ModeState::Inactive if self.capability != Capability::Granted => {
                log::warn!(
                    "toggle ignored: input capability is {}; grant input permissions and retry",
                    self.capability
                );
            }
            ModeState::Inactive => {
                self.toggles += 1;
                self.transition(ModeState::Active, TransitionReason::Toggle);
            }
        }
    }

    fn transition(&mut self, to: ModeState, reason: TransitionReason) {
        let from = self.mode;
        if from == to {
            return;
        }
        self.mode = to;
        match to {
            ModeState::Active => self.motion.enable(),
            ModeState::Inactive => self.motion.disable(),
        }
        if reason.is_forced() {
            log::warn!("navigation mode forced {from} -> {to}: {reason}");
        } else {
            log::info!("navigation mode {from} -> {to}");
        }
        self.status
            .notify(StatusEvent::ModeChanged { from, to, reason });
    }

    /// Leave navigation mode for a reason other than the toggle and reset
    /// the toggle parity. Held motion stops immediately.
    pub fn force_inactive(&mut self, reason: TransitionReason) {
        self.toggles = 0;
        self.motion.disable();
        self.transition(ModeState::Inactive, reason);
    }

    /// Record a new capability reading. `Denied` forces navigation off.
    pub fn set_capability(&mut self, capability: Capability) {
        let from = self.capability;
        if from != capability {
            self.capability = capability;
            if capability == Capability::Denied {
                log::warn!("input capability lost ({from} -> {capability})");
            } else {
                log::info!("input capability {from} -> {capability}");
            }
            self.status
                .notify(StatusEvent::CapabilityChanged { from, to: capability });
        }
        if capability == Capability::Denied {
            self.force_inactive(TransitionReason::CapabilityDenied);
        }
    }

    /// A configuration reload failed validation.
    pub fn config_rejected(&mut self) {
        self.force_inactive(TransitionReason::ConfigRejected);
    }

    pub fn shutdown(&mut self) {
        self.force_inactive(TransitionReason::Shutdown);
        self.swallowed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Direction, HoldKind, Magnitude};
    use crate::backend::testing::RecordingBackend;
    use crate::binding::{Binding, BindingSnapshot, Chord, ModifierMatch};
    use crate::event::{Button, Modifiers, MotionVector, SyntheticEvent};
    use crate::motion::{Curve, MotionEngine, MotionTuning};
    use crate::status::status_unbounded_channel;
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    fn tuning() -> MotionTuning {
        MotionTuning {
            tick_interval: Duration::from_millis(1000),
            cursor: Curve {
                initial_step: 1.0,
                max_step: 6.0,
                base: 2.0,
                multiplier: 1.0,
            },
            ..MotionTuning::default()
        }
    }

    fn snapshot() -> BindingSnapshot {
        let bind = |spec: &str, action: NavigationAction| {
            Binding::new(spec.parse::<Chord>().unwrap(), action)
        };
        BindingSnapshot::new(
            Chord::bare(Key::Escape),
            vec![
                bind("h", NavigationAction::MoveCursor(Direction::Left, Magnitude::Normal)),
                bind("j", NavigationAction::MoveCursor(Direction::Down, Magnitude::Normal)),
                bind("k", NavigationAction::MoveCursor(Direction::Up, Magnitude::Normal)),
                bind("l", NavigationAction::MoveCursor(Direction::Right, Magnitude::Normal)),
                bind("return", NavigationAction::Click(Button::Left)),
                Binding::new(
                    Chord::new(Key::Space, ModifierMatch::Any),
                    NavigationAction::ModifierHold(HoldKind::Precision),
                ),
            ],
            tuning(),
        )
    }

    struct Fixture {
        backend: Arc<RecordingBackend>,
        engine: MotionEngine,
        controller: ModalController,
        status: Receiver<StatusEvent>,
    }

    impl Fixture {
        fn new(snapshot: Option<BindingSnapshot>) -> Self {
            let backend = RecordingBackend::new();
            let engine = MotionEngine::new(tuning(), backend.clone());
            let (sink, status) = status_unbounded_channel();
            let mut controller = ModalController::new(
                Arc::new(SnapshotCell::new(snapshot)),
                engine.handle(),
                Arc::new(sink),
            );
            controller.set_capability(Capability::Granted);
            // Discard the capability notification.
            let _ = status.try_recv();
            Self {
                backend,
                engine,
                controller,
                status,
            }
        }

        fn press(&mut self, key: Key) -> Disposition {
            self.controller
                .handle(&KeyEvent::press(key, 0, Modifiers::NONE))
        }

        fn release(&mut self, key: Key) -> Disposition {
            self.controller
                .handle(&KeyEvent::release(key, 0, Modifiers::NONE))
        }

        fn toggle(&mut self) {
            assert_eq!(self.press(Key::Escape), Disposition::Consume);
            assert_eq!(self.release(Key::Escape), Disposition::Consume);
        }

        fn motions(&self) -> Vec<MotionVector> {
            self.backend
                .injected()
                .into_iter()
                .filter_map(|e| match e {
                    SyntheticEvent::Motion(v) => Some(v),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_inactive_passes_everything_but_toggle() {
        let mut fx = Fixture::new(Some(snapshot()));
        for key in [Key::KeyH, Key::KeyJ, Key::Enter, Key::Space, Key::KeyA] {
            assert_eq!(fx.press(key), Disposition::PassThrough);
            assert_eq!(fx.release(key), Disposition::PassThrough);
        }
        assert_eq!(fx.controller.mode(), ModeState::Inactive);
        assert_eq!(fx.engine.tick(), None);
    }

    #[test]
    fn test_toggle_flips_once_per_occurrence() {
        let mut fx = Fixture::new(Some(snapshot()));

        assert_eq!(fx.press(Key::Escape), Disposition::Consume);
        assert_eq!(fx.controller.mode(), ModeState::Active);
        // Auto-repeat of the toggle key does not flip again.
        assert_eq!(fx.press(Key::Escape), Disposition::Consume);
        assert_eq!(fx.press(Key::Escape), Disposition::Consume);
        assert_eq!(fx.controller.mode(), ModeState::Active);
        assert_eq!(fx.release(Key::Escape), Disposition::Consume);

        fx.toggle();
        assert_eq!(fx.controller.mode(), ModeState::Inactive);
        assert_eq!(fx.controller.toggle_count(), 2);

        let events: Vec<_> = fx.status.try_iter().collect();
        assert_eq!(
            events,
            vec![
                StatusEvent::ModeChanged {
                    from: ModeState::Inactive,
                    to: ModeState::Active,
                    reason: TransitionReason::Toggle,
                },
                StatusEvent::ModeChanged {
                    from: ModeState::Active,
                    to: ModeState::Inactive,
                    reason: TransitionReason::Toggle,
                },
            ]
        );
    }

    #[test]
    fn test_active_consumes_bound_and_passes_unbound() {
        let mut fx = Fixture::new(Some(snapshot()));
        fx.toggle();

        assert_eq!(fx.press(Key::KeyH), Disposition::Consume);
        assert_eq!(fx.press(Key::KeyA), Disposition::PassThrough);
        assert_eq!(fx.release(Key::KeyA), Disposition::PassThrough);
        assert_eq!(fx.release(Key::KeyH), Disposition::Consume);
    }

    #[test]
    fn test_release_follows_press_disposition() {
        let mut fx = Fixture::new(Some(snapshot()));

        // Pressed while inactive, released while active: not ours.
        assert_eq!(fx.press(Key::KeyL), Disposition::PassThrough);
        fx.toggle();
        assert_eq!(fx.release(Key::KeyL), Disposition::PassThrough);

        // Pressed while active, released after toggling off: still ours.
        assert_eq!(fx.press(Key::KeyJ), Disposition::Consume);
        fx.toggle();
        assert_eq!(fx.release(Key::KeyJ), Disposition::Consume);
    }

    #[test]
    fn test_golden_sequence_through_controller() {
        let mut fx = Fixture::new(Some(snapshot()));
        fx.toggle();
        assert_eq!(fx.press(Key::KeyL), Disposition::Consume);
        for _ in 0..5 {
            fx.engine.tick();
            // Auto-repeat in between ticks changes nothing.
            assert_eq!(fx.press(Key::KeyL), Disposition::Consume);
        }
        assert_eq!(fx.release(Key::KeyL), Disposition::Consume);
        fx.toggle();
        assert_eq!(fx.engine.tick(), None);

        let dx: Vec<i32> = fx.motions().iter().map(|v| v.dx).collect();
        assert_eq!(dx, vec![1, 2, 4, 6, 6]);
    }

    #[test]
    fn test_click_once_per_press_edge() {
        let mut fx = Fixture::new(Some(snapshot()));
        fx.toggle();

        fx.press(Key::Enter);
        fx.engine.tick();
        fx.press(Key::Enter);
        fx.press(Key::Enter);
        fx.engine.tick();
        fx.release(Key::Enter);
        fx.engine.tick();

        fx.press(Key::Enter);
        fx.release(Key::Enter);
        fx.engine.tick();

        assert_eq!(
            fx.backend.injected(),
            vec![
                SyntheticEvent::Click(Button::Left),
                SyntheticEvent::Click(Button::Left),
            ]
        );
    }

    #[test]
    fn test_capability_denied_forces_inactive() {
        let mut fx = Fixture::new(Some(snapshot()));
        fx.toggle();
        fx.press(Key::KeyL);
        assert!(fx.engine.tick().is_some());
        let _ = fx.status.try_iter().count();

        fx.controller.set_capability(Capability::Denied);
        assert_eq!(fx.controller.mode(), ModeState::Inactive);
        assert_eq!(fx.controller.toggle_count(), 0);
        assert_eq!(fx.engine.tick(), None);

        let events: Vec<_> = fx.status.try_iter().collect();
        assert!(events.contains(&StatusEvent::ModeChanged {
            from: ModeState::Active,
            to: ModeState::Inactive,
            reason: TransitionReason::CapabilityDenied,
        }));

        // The held key's release is still swallowed.
        assert_eq!(fx.release(Key::KeyL), Disposition::Consume);

        // Toggle is consumed but cannot activate without capability.
        fx.toggle();
        assert_eq!(fx.controller.mode(), ModeState::Inactive);

        fx.controller.set_capability(Capability::Granted);
        assert_eq!(fx.controller.mode(), ModeState::Inactive);
        fx.toggle();
        assert_eq!(fx.controller.mode(), ModeState::Active);
    }

    #[test]
    fn test_no_snapshot_refuses_activation() {
        let mut fx = Fixture::new(None);
        assert_eq!(fx.press(Key::Escape), Disposition::PassThrough);
        assert_eq!(fx.release(Key::Escape), Disposition::PassThrough);
        assert_eq!(fx.controller.mode(), ModeState::Inactive);
    }

    #[test]
    fn test_config_rejected_and_shutdown() {
        let mut fx = Fixture::new(Some(snapshot()));
        fx.toggle();
        fx.controller.config_rejected();
        assert_eq!(fx.controller.mode(), ModeState::Inactive);

        fx.toggle();
        assert_eq!(fx.controller.mode(), ModeState::Active);
        fx.controller.shutdown();
        assert_eq!(fx.controller.mode(), ModeState::Inactive);

        let reasons: Vec<_> = fx
            .status
            .try_iter()
            .filter_map(|e| match e {
                StatusEvent::ModeChanged { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(
            reasons,
            vec![
                TransitionReason::Toggle,
                TransitionReason::ConfigRejected,
                TransitionReason::Toggle,
                TransitionReason::Shutdown,
            ]
        );
    }

    #[test]
    fn test_forced_reset_while_inactive_is_silent() {
        let mut fx = Fixture::new(Some(snapshot()));
        fx.controller.config_rejected();
        assert_eq!(fx.status.try_iter().count(), 0);
    }
}
