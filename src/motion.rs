//! Motion engine: turns held navigation keys into paced pointer and scroll
//! injections.
//!
//! Key handling only touches [`MotionState`] under a short lock. A single
//! worker thread evaluates the state once per tick and performs every
//! injection with the lock released, so a slow backend never stalls the key
//! callback. The worker parks on a condition variable whenever there is
//! nothing to do.

use crate::action::{Direction, HoldKind, Magnitude, NavigationAction};
use crate::backend::InputBackend;
use crate::error::{Error, Result};
use crate::event::{Button, MotionVector, SyntheticEvent};
use crate::keycode::Key;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Minimum spacing between two "inject failed" warnings.
pub const INJECT_WARN_INTERVAL: Duration = Duration::from_secs(5);

const DIRECTIONS: [Direction; 4] = [
    Direction::Left,
    Direction::Down,
    Direction::Up,
    Direction::Right,
];

/// Acceleration curve: `min(initial + multiplier * (base^t - 1), max)` where
/// `t` is the time in seconds since the held set last changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Curve {
    pub initial_step: f64,
    pub max_step: f64,
    pub base: f64,
    pub multiplier: f64,
}

impl Curve {
    pub fn speed(&self, held_secs: f64) -> f64 {
        // A flat curve must not evaluate base^t, which overflows on long holds.
        if self.multiplier == 0.0 {
            return self.initial_step.min(self.max_step);
        }
        let ramp = self.multiplier * (self.base.powf(held_secs) - 1.0);
        (self.initial_step + ramp).min(self.max_step)
    }
}

/// Tunables for the motion engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionTuning {
    pub tick_interval: Duration,
    pub cursor: Curve,
    pub scroll: Curve,
    pub precision_divisor: f64,
}

impl Default for MotionTuning {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(16),
            cursor: Curve {
                initial_step: 1.0,
                max_step: 40.0,
                base: 2.0,
                multiplier: 10.0,
            },
            scroll: Curve {
                initial_step: 0.2,
                max_step: 3.0,
                base: 2.0,
                multiplier: 0.5,
            },
            precision_divisor: 10.0,
        }
    }
}

/// Sub-unit remainders carried between ticks.
#[derive(Debug, Default, Clone, Copy)]
struct Carry {
    x: f64,
    y: f64,
}

impl Carry {
    /// Add a fractional delta and take out the whole units.
    fn take(&mut self, fx: f64, fy: f64) -> (i32, i32) {
        self.x += fx;
        self.y += fy;
        let wx = self.x.trunc();
        let wy = self.y.trunc();
        self.x -= wx;
        self.y -= wy;
        (wx as i32, wy as i32)
    }
}

/// Rate limiter for injection failure warnings.
#[derive(Debug, Default)]
struct InjectWarnings {
    last: Option<Instant>,
    suppressed: u32,
}

impl InjectWarnings {
    fn record(&mut self, err: &Error, now: Instant) {
        let due = self
            .last
            .is_none_or(|last| now.duration_since(last) >= INJECT_WARN_INTERVAL);
        if !due {
            self.suppressed += 1;
            return;
        }
        if self.suppressed > 0 {
            log::warn!("{err} ({} similar failures suppressed)", self.suppressed);
        } else {
            log::warn!("{err}");
        }
        self.last = Some(now);
        self.suppressed = 0;
    }
}

/// Held keys and pending one-shot actions shared between the key callback
/// and the worker.
#[derive(Debug)]
struct MotionState {
    enabled: bool,
    shutdown: bool,
    moves: HashMap<Key, (Direction, Magnitude)>,
    scrolls: HashMap<Key, Direction>,
    precision: HashSet<Key>,
    move_ticks: u32,
    scroll_ticks: u32,
    move_carry: Carry,
    scroll_carry: Carry,
    pending: VecDeque<SyntheticEvent>,
    drag_held: bool,
    tuning: MotionTuning,
    next_tick: Option<Instant>,
    last_injected: Option<Instant>,
    warnings: InjectWarnings,
}

impl MotionState {
    fn new(tuning: MotionTuning) -> Self {
        Self {
            enabled: false,
            shutdown: false,
            moves: HashMap::new(),
            scrolls: HashMap::new(),
            precision: HashSet::new(),
            move_ticks: 0,
            scroll_ticks: 0,
            move_carry: Carry::default(),
            scroll_carry: Carry::default(),
            pending: VecDeque::new(),
            drag_held: false,
            tuning,
            next_tick: None,
            last_injected: None,
            warnings: InjectWarnings::default(),
        }
    }

    /// Bitmask of the distinct cursor directions held. The high nibble marks
    /// directions held only through precise bindings.
    fn move_composition(&self) -> u8 {
        let mut normal = 0u8;
        let mut precise = 0u8;
        for (direction, magnitude) in self.moves.values() {
            let bit = 1 << (*direction as u8);
            match magnitude {
                Magnitude::Normal => normal |= bit,
                Magnitude::Precise => precise |= bit,
            }
        }
        normal | ((precise & !normal) << 4)
    }

    fn scroll_composition(&self) -> u8 {
        self.scrolls
            .values()
            .fold(0u8, |acc, direction| acc | 1 << (*direction as u8))
    }

    fn has_motion(&self) -> bool {
        !self.moves.is_empty() || !self.scrolls.is_empty()
    }

    fn begin(&mut self, key: Key, action: NavigationAction) {
        match action {
            NavigationAction::MoveCursor(direction, magnitude) => {
                let before = self.move_composition();
                self.moves.insert(key, (direction, magnitude));
                if self.move_composition() != before {
                    self.move_ticks = 0;
                }
            }
            NavigationAction::Scroll(direction) => {
                let before = self.scroll_composition();
                self.scrolls.insert(key, direction);
                if self.scroll_composition() != before {
                    self.scroll_ticks = 0;
                }
            }
            NavigationAction::ModifierHold(HoldKind::Precision) => {
                self.precision.insert(key);
            }
            NavigationAction::Click(button) => {
                self.pending.push_back(SyntheticEvent::Click(button));
            }
            NavigationAction::ToggleDrag => {
                let event = if self.drag_held {
                    SyntheticEvent::ButtonUp(Button::Left)
                } else {
                    SyntheticEvent::ButtonDown(Button::Left)
                };
                self.drag_held = !self.drag_held;
                self.pending.push_back(event);
            }
            NavigationAction::JumpToEdge(edge) => {
                self.pending.push_back(SyntheticEvent::JumpToEdge(edge));
            }
            NavigationAction::ToggleMode => {}
        }
    }

    fn end(&mut self, key: Key) {
        let before = self.move_composition();
        if self.moves.remove(&key).is_some() && self.move_composition() != before {
            self.move_ticks = 0;
            if self.moves.is_empty() {
                self.move_carry = Carry::default();
            }
        }
        let before = self.scroll_composition();
        if self.scrolls.remove(&key).is_some() && self.scroll_composition() != before {
            self.scroll_ticks = 0;
            if self.scrolls.is_empty() {
                self.scroll_carry = Carry::default();
            }
        }
        self.precision.remove(&key);
    }

    /// Drop all held state; queue a release for a held drag button.
    fn clear(&mut self) {
        self.moves.clear();
        self.scrolls.clear();
        self.precision.clear();
        self.move_ticks = 0;
        self.scroll_ticks = 0;
        self.move_carry = Carry::default();
        self.scroll_carry = Carry::default();
        self.next_tick = None;
        if self.drag_held {
            self.drag_held = false;
            self.pending.push_back(SyntheticEvent::ButtonUp(Button::Left));
        }
    }

    /// Evaluate one tick and advance the ramp counters.
    fn advance(&mut self) -> MotionVector {
        let tick_secs = self.tuning.tick_interval.as_secs_f64();
        let mut vector = MotionVector::default();

        let composition = self.move_composition();
        if composition != 0 {
            let speed = self
                .tuning
                .cursor
                .speed(f64::from(self.move_ticks) * tick_secs);
            let slowed = !self.precision.is_empty();
            let (mut fx, mut fy) = (0.0, 0.0);
            for direction in DIRECTIONS {
                let bit = 1 << (direction as u8);
                if composition & (bit | bit << 4) == 0 {
                    continue;
                }
                let precise = slowed || composition & (bit << 4) != 0;
                let step = if precise {
                    speed / self.tuning.precision_divisor
                } else {
                    speed
                };
                let (ux, uy) = direction.unit();
                fx += ux * step;
                fy += uy * step;
            }
            (vector.dx, vector.dy) = self.move_carry.take(fx, fy);
            self.move_ticks = self.move_ticks.saturating_add(1);
        }

        let composition = self.scroll_composition();
        if composition != 0 {
            let speed = self
                .tuning
                .scroll
                .speed(f64::from(self.scroll_ticks) * tick_secs);
            let (mut fx, mut fy) = (0.0, 0.0);
            for direction in DIRECTIONS {
                if composition & (1 << (direction as u8)) != 0 {
                    let (ux, uy) = direction.scroll_unit();
                    fx += ux * speed;
                    fy += uy * speed;
                }
            }
            (vector.scroll_dx, vector.scroll_dy) = self.scroll_carry.take(fx, fy);
            self.scroll_ticks = self.scroll_ticks.saturating_add(1);
        }

        vector
    }
}

/// What the worker should do next.
#[derive(Debug, PartialEq)]
enum Step {
    Exit,
    Park,
    Sleep(Duration),
    Emit(Vec<SyntheticEvent>),
}

fn poll(state: &mut MotionState, now: Instant) -> Step {
    if !state.pending.is_empty() {
        return Step::Emit(state.pending.drain(..).collect());
    }
    if state.shutdown {
        return Step::Exit;
    }
    if !state.enabled || !state.has_motion() {
        state.next_tick = None;
        return Step::Park;
    }

    let due = *state.next_tick.get_or_insert(now);
    if now < due {
        return Step::Sleep(due - now);
    }

    let vector = state.advance();
    // Late ticks are not replayed: schedule from now if we fell behind.
    let interval = state.tuning.tick_interval;
    let next = due + interval;
    state.next_tick = Some(if next <= now { now + interval } else { next });

    if vector.is_zero() {
        Step::Emit(Vec::new())
    } else {
        Step::Emit(vec![SyntheticEvent::Motion(vector)])
    }
}

struct Shared {
    state: Mutex<MotionState>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MotionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Inject a batch and fold the outcome back into the state.
fn deliver(backend: &dyn InputBackend, shared: &Shared, events: &[SyntheticEvent]) {
    let mut failures = Vec::new();
    let mut delivered = false;
    for event in events {
        match backend.inject(event) {
            Ok(()) => delivered = true,
            Err(err) => failures.push(err),
        }
    }
    if failures.is_empty() && !delivered {
        return;
    }
    let now = Instant::now();
    let mut state = shared.lock();
    if delivered {
        state.last_injected = Some(now);
    }
    for err in &failures {
        state.warnings.record(err, now);
    }
}

fn run_worker(shared: Arc<Shared>, backend: Arc<dyn InputBackend>) {
    log::debug!("motion worker started");
    let mut state = shared.lock();
    loop {
        match poll(&mut state, Instant::now()) {
            Step::Exit => break,
            Step::Park => {
                state = shared
                    .wake
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
            Step::Sleep(timeout) => {
                state = shared
                    .wake
                    .wait_timeout(state, timeout)
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .0;
            }
            Step::Emit(events) => {
                if events.is_empty() {
                    continue;
                }
                drop(state);
                deliver(backend.as_ref(), &shared, &events);
                state = shared.lock();
            }
        }
    }
    log::debug!("motion worker stopped");
}

/// Cheap, cloneable handle used by the modal controller.
#[derive(Clone)]
pub struct MotionHandle {
    shared: Arc<Shared>,
}

impl MotionHandle {
    /// Start the action bound to `key`. Ignored while disabled.
    ///
    /// Continuous actions last until [`end`](Self::end) is called for the
    /// same key; one-shot actions are queued once per call.
    pub fn begin(&self, key: Key, action: NavigationAction) {
        let mut state = self.shared.lock();
        if !state.enabled || state.shutdown {
            return;
        }
        state.begin(key, action);
        self.shared.wake.notify_all();
    }

    /// Stop whatever `key` started.
    pub fn end(&self, key: Key) {
        let mut state = self.shared.lock();
        state.end(key);
        self.shared.wake.notify_all();
    }

    pub fn enable(&self) {
        let mut state = self.shared.lock();
        if !state.shutdown {
            state.enabled = true;
        }
    }

    /// Stop all motion and release a held drag button.
    pub fn disable(&self) {
        let mut state = self.shared.lock();
        state.enabled = false;
        state.clear();
        self.shared.wake.notify_all();
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.lock().enabled
    }

    /// Replace the tuning; takes effect on the next tick.
    pub fn set_tuning(&self, tuning: MotionTuning) {
        let mut state = self.shared.lock();
        state.tuning = tuning;
        state.next_tick = None;
        self.shared.wake.notify_all();
    }

    /// True when nothing is held and nothing is queued.
    pub fn is_idle(&self) -> bool {
        let state = self.shared.lock();
        !state.has_motion() && state.pending.is_empty()
    }

    /// When the last synthetic event was successfully delivered.
    pub fn last_injected(&self) -> Option<Instant> {
        self.shared.lock().last_injected
    }
}

/// Owns the worker thread and the backend used for injection.
pub struct MotionEngine {
    handle: MotionHandle,
    backend: Arc<dyn InputBackend>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MotionEngine {
    pub fn new(tuning: MotionTuning, backend: Arc<dyn InputBackend>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(MotionState::new(tuning)),
            wake: Condvar::new(),
        });
        Self {
            handle: MotionHandle { shared },
            backend,
            worker: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> MotionHandle {
        self.handle.clone()
    }

    /// Spawn the tick worker.
    pub fn start(&self) -> Result<()> {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if worker.is_some() {
            return Err(Error::AlreadyRunning);
        }
        {
            let mut state = self.handle.shared.lock();
            state.shutdown = false;
        }
        let shared = self.handle.shared.clone();
        let backend = self.backend.clone();
        let thread = std::thread::Builder::new()
            .name("vimnav-motion".into())
            .spawn(move || run_worker(shared, backend))
            .map_err(|e| Error::ThreadError(format!("failed to spawn motion worker: {e}")))?;
        *worker = Some(thread);
        Ok(())
    }

    /// Evaluate one tick synchronously on the calling thread, ignoring the
    /// schedule. For use without a worker.
    ///
    /// Returns the motion vector that was injected, if any.
    pub fn tick(&self) -> Option<MotionVector> {
        let (mut events, vector) = {
            let mut state = self.handle.shared.lock();
            let events: Vec<_> = state.pending.drain(..).collect();
            let vector = if state.enabled && state.has_motion() {
                Some(state.advance()).filter(|v| !v.is_zero())
            } else {
                None
            };
            (events, vector)
        };
        if let Some(vector) = vector {
            events.push(SyntheticEvent::Motion(vector));
        }
        deliver(self.backend.as_ref(), &self.handle.shared, &events);
        vector
    }

    /// Clear held state, release a held drag button, flush queued events and
    /// join the worker. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.handle.shared.lock();
            state.enabled = false;
            state.clear();
            state.shutdown = true;
            self.handle.shared.wake.notify_all();
        }
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match worker {
            Some(thread) => thread
                .join()
                .map_err(|_| Error::ThreadError("failed to join motion worker".into())),
            None => {
                // No worker to drain the queue; deliver it here.
                let events: Vec<_> = self.handle.shared.lock().pending.drain(..).collect();
                deliver(self.backend.as_ref(), &self.handle.shared, &events);
                Ok(())
            }
        }
    }
}

impl Drop for MotionEngine {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Edge;
    use crate::backend::testing::RecordingBackend;

    fn golden_tuning() -> MotionTuning {
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

    fn motions(events: &[SyntheticEvent]) -> Vec<MotionVector> {
        events
            .iter()
            .filter_map(|e| match e {
                SyntheticEvent::Motion(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    const MOVE_RIGHT: NavigationAction =
        NavigationAction::MoveCursor(Direction::Right, Magnitude::Normal);
    const MOVE_DOWN: NavigationAction =
        NavigationAction::MoveCursor(Direction::Down, Magnitude::Normal);

    #[test]
    fn test_curve_shape() {
        let curve = golden_tuning().cursor;
        assert_eq!(curve.speed(0.0), 1.0);
        assert_eq!(curve.speed(1.0), 2.0);
        assert_eq!(curve.speed(2.0), 4.0);
        assert_eq!(curve.speed(3.0), 6.0);
        assert_eq!(curve.speed(30.0), 6.0);

        let defaults = MotionTuning::default();
        let mut last = 0.0;
        for n in 0..200 {
            let speed = defaults.cursor.speed(n as f64 * 0.016);
            assert!(speed >= last);
            assert!(speed <= defaults.cursor.max_step);
            last = speed;
        }
    }

    #[test]
    fn test_flat_curve_stays_constant_on_long_holds() {
        let curve = Curve {
            multiplier: 0.0,
            ..MotionTuning::default().cursor
        };
        for secs in [0.0, 1.0, 1000.0, 1100.0, 1.0e6] {
            assert_eq!(curve.speed(secs), curve.initial_step);
        }
    }

    #[test]
    fn test_golden_sequence() {
        let backend = RecordingBackend::new();
        let engine = MotionEngine::new(golden_tuning(), backend.clone());
        let handle = engine.handle();

        handle.enable();
        handle.begin(Key::KeyL, MOVE_RIGHT);
        for _ in 0..5 {
            engine.tick();
        }
        handle.end(Key::KeyL);
        assert_eq!(engine.tick(), None);
        handle.disable();

        let dx: Vec<i32> = motions(&backend.injected()).iter().map(|v| v.dx).collect();
        assert_eq!(dx, vec![1, 2, 4, 6, 6]);
        assert!(motions(&backend.injected()).iter().all(|v| v.dy == 0));
    }

    #[test]
    fn test_diagonal_is_vector_sum() {
        let backend = RecordingBackend::new();
        let engine = MotionEngine::new(golden_tuning(), backend.clone());
        let handle = engine.handle();
        handle.enable();

        handle.begin(Key::KeyL, MOVE_RIGHT);
        handle.begin(Key::KeyJ, MOVE_DOWN);
        let v = engine.tick().unwrap();
        assert_eq!((v.dx, v.dy), (1, 1));
        let v = engine.tick().unwrap();
        assert_eq!((v.dx, v.dy), (2, 2));
    }

    #[test]
    fn test_opposites_cancel() {
        let backend = RecordingBackend::new();
        let engine = MotionEngine::new(golden_tuning(), backend.clone());
        let handle = engine.handle();
        handle.enable();

        handle.begin(Key::KeyH, NavigationAction::MoveCursor(Direction::Left, Magnitude::Normal));
        handle.begin(Key::KeyL, MOVE_RIGHT);
        assert_eq!(engine.tick(), None);
        assert!(backend.injected().is_empty());
    }

    #[test]
    fn test_composition_change_resets_ramp() {
        let backend = RecordingBackend::new();
        let engine = MotionEngine::new(golden_tuning(), backend.clone());
        let handle = engine.handle();
        handle.enable();

        handle.begin(Key::KeyL, MOVE_RIGHT);
        engine.tick();
        engine.tick();
        assert_eq!(engine.tick().unwrap().dx, 4);

        // Adding a direction restarts the ramp.
        handle.begin(Key::KeyJ, MOVE_DOWN);
        assert_eq!(engine.tick().unwrap().dx, 1);
    }

    #[test]
    fn test_precision_carries_remainder() {
        let backend = RecordingBackend::new();
        let mut tuning = golden_tuning();
        tuning.cursor.base = 1.0;
        tuning.precision_divisor = 4.0;
        let engine = MotionEngine::new(tuning, backend.clone());
        let handle = engine.handle();
        handle.enable();

        handle.begin(Key::Space, NavigationAction::ModifierHold(HoldKind::Precision));
        handle.begin(Key::KeyL, MOVE_RIGHT);
        // 0.25 per tick: whole pixels only every fourth tick.
        let ticks: Vec<Option<MotionVector>> = (0..8).map(|_| engine.tick()).collect();
        let moved = ticks.iter().filter(|t| t.is_some()).count();
        assert_eq!(moved, 2);
        assert_eq!(motions(&backend.injected()).iter().map(|v| v.dx).sum::<i32>(), 2);
    }

    #[test]
    fn test_scroll_is_independent() {
        let backend = RecordingBackend::new();
        let mut tuning = golden_tuning();
        tuning.scroll = Curve {
            initial_step: 1.0,
            max_step: 1.0,
            base: 2.0,
            multiplier: 0.0,
        };
        let engine = MotionEngine::new(tuning, backend.clone());
        let handle = engine.handle();
        handle.enable();

        handle.begin(Key::KeyK, NavigationAction::Scroll(Direction::Up));
        let v = engine.tick().unwrap();
        assert_eq!((v.dx, v.dy, v.scroll_dx, v.scroll_dy), (0, 0, 0, 1));

        handle.begin(Key::KeyL, MOVE_RIGHT);
        let v = engine.tick().unwrap();
        assert_eq!((v.dx, v.scroll_dy), (1, 1));
    }

    #[test]
    fn test_click_is_one_shot() {
        let backend = RecordingBackend::new();
        let engine = MotionEngine::new(golden_tuning(), backend.clone());
        let handle = engine.handle();
        handle.enable();

        handle.begin(Key::Enter, NavigationAction::Click(Button::Left));
        for _ in 0..5 {
            engine.tick();
        }
        handle.end(Key::Enter);
        assert_eq!(backend.injected(), vec![SyntheticEvent::Click(Button::Left)]);
    }

    #[test]
    fn test_disabled_ignores_actions() {
        let backend = RecordingBackend::new();
        let engine = MotionEngine::new(golden_tuning(), backend.clone());
        let handle = engine.handle();

        handle.begin(Key::KeyL, MOVE_RIGHT);
        handle.begin(Key::Enter, NavigationAction::Click(Button::Left));
        assert_eq!(engine.tick(), None);
        assert!(backend.injected().is_empty());
        assert!(handle.is_idle());
    }

    #[test]
    fn test_disable_releases_drag() {
        let backend = RecordingBackend::new();
        let engine = MotionEngine::new(golden_tuning(), backend.clone());
        let handle = engine.handle();
        handle.enable();

        handle.begin(Key::KeyV, NavigationAction::ToggleDrag);
        handle.begin(Key::KeyG, NavigationAction::JumpToEdge(Edge::Top));
        handle.begin(Key::KeyL, MOVE_RIGHT);
        handle.disable();
        engine.tick();

        assert_eq!(
            backend.injected(),
            vec![
                SyntheticEvent::ButtonDown(Button::Left),
                SyntheticEvent::JumpToEdge(Edge::Top),
                SyntheticEvent::ButtonUp(Button::Left),
            ]
        );
    }

    #[test]
    fn test_shutdown_without_worker_flushes() {
        let backend = RecordingBackend::new();
        let engine = MotionEngine::new(golden_tuning(), backend.clone());
        let handle = engine.handle();
        handle.enable();
        handle.begin(Key::KeyV, NavigationAction::ToggleDrag);
        engine.tick();

        engine.shutdown().unwrap();
        assert_eq!(
            backend.injected(),
            vec![
                SyntheticEvent::ButtonDown(Button::Left),
                SyntheticEvent::ButtonUp(Button::Left),
            ]
        );
        // Enabling after shutdown has no effect.
        handle.enable();
        assert!(!handle.is_enabled());
    }

    #[test]
    fn test_poll_parks_and_coalesces() {
        let mut state = MotionState::new(golden_tuning());
        let start = Instant::now();
        assert_eq!(poll(&mut state, start), Step::Park);

        state.enabled = true;
        state.begin(Key::KeyL, MOVE_RIGHT);
        assert!(matches!(poll(&mut state, start), Step::Emit(ref e) if e.len() == 1));
        assert_eq!(poll(&mut state, start), Step::Sleep(Duration::from_secs(1)));

        // Three intervals late: one tick, no replay.
        let late = start + Duration::from_secs(4);
        assert!(matches!(poll(&mut state, late), Step::Emit(ref e) if e.len() == 1));
        assert_eq!(poll(&mut state, late), Step::Sleep(Duration::from_secs(1)));

        state.end(Key::KeyL);
        assert_eq!(poll(&mut state, late), Step::Park);

        state.shutdown = true;
        assert_eq!(poll(&mut state, late), Step::Exit);
    }

    #[test]
    fn test_worker_halts_when_keys_released() {
        let backend = RecordingBackend::new();
        let tuning = MotionTuning {
            tick_interval: Duration::from_millis(5),
            ..MotionTuning::default()
        };
        let engine = MotionEngine::new(tuning, backend.clone());
        let handle = engine.handle();
        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(Error::AlreadyRunning)));

        handle.enable();
        handle.begin(Key::KeyL, MOVE_RIGHT);
        std::thread::sleep(Duration::from_millis(60));
        handle.end(Key::KeyL);
        let released = Instant::now();
        std::thread::sleep(Duration::from_millis(60));

        let times = backend.injected_at();
        assert!(times.len() >= 2);
        let after = times
            .iter()
            .filter(|t| **t > released + Duration::from_millis(20))
            .count();
        assert_eq!(after, 0);

        engine.shutdown().unwrap();
    }

    #[test]
    fn test_inject_failures_are_dropped() {
        let backend = RecordingBackend::new();
        backend.fail_injects(true);
        let engine = MotionEngine::new(golden_tuning(), backend.clone());
        let handle = engine.handle();
        handle.enable();
        handle.begin(Key::KeyL, MOVE_RIGHT);

        for _ in 0..3 {
            engine.tick();
        }
        assert!(handle.last_injected().is_none());

        backend.fail_injects(false);
        engine.tick();
        assert!(handle.last_injected().is_some());
        // The failed ticks are not replayed.
        assert_eq!(backend.injected().len(), 1);
    }

    #[test]
    fn test_inject_warnings_rate_limited() {
        let mut warnings = InjectWarnings::default();
        let now = Instant::now();
        let err = Error::InjectFailed("x".into());
        warnings.record(&err, now);
        warnings.record(&err, now + Duration::from_millis(10));
        warnings.record(&err, now + Duration::from_millis(20));
        assert_eq!(warnings.suppressed, 2);
        warnings.record(&err, now + INJECT_WARN_INTERVAL);
        assert_eq!(warnings.suppressed, 0);
        assert_eq!(warnings.last, Some(now + INJECT_WARN_INTERVAL));
    }
}
