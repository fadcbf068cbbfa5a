//! The navigator runtime: wires backend, controller, motion engine and
//! capability monitor together and owns their threads.

use crate::backend::{Disposition, InputBackend};
use crate::binding::{BindingSnapshot, SnapshotCell};
use crate::capability::{CapabilityMonitor, poll_once};
use crate::config::Settings;
use crate::controller::{ModalController, ModeState};
use crate::error::{Error, Result};
use crate::event::KeyEvent;
use crate::motion::{MotionEngine, MotionTuning};
use crate::status::{NullSink, StatusSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const DEFAULT_CAPABILITY_POLL: Duration = Duration::from_millis(500);

/// System-wide vim-style pointer navigation.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use vimnav::{NativeBackend, Navigator, Settings};
///
/// let navigator = Navigator::new(Arc::new(NativeBackend::new()), Some(Settings::default()));
/// navigator.run().expect("failed to start navigation");
/// ```
pub struct Navigator {
    backend: Arc<dyn InputBackend>,
    snapshots: Arc<SnapshotCell>,
    controller: Arc<Mutex<ModalController>>,
    engine: MotionEngine,
    capability_poll: Duration,
    running: Arc<AtomicBool>,
    /// Set by `stop` while running; checked before the listener starts.
    stop_requested: Mutex<bool>,
    monitor: Mutex<Option<CapabilityMonitor>>,
}

impl Navigator {
    /// Create a navigator. `None` settings means no valid configuration is
    /// available: keys pass through and the toggle cannot activate until
    /// [`reload`](Self::reload) succeeds.
    pub fn new(backend: Arc<dyn InputBackend>, settings: Option<Settings>) -> Self {
        Self::with_status(backend, settings, Arc::new(NullSink))
    }

    /// Like [`new`](Self::new), reporting mode and capability changes to
    /// `status`.
    pub fn with_status(
        backend: Arc<dyn InputBackend>,
        settings: Option<Settings>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let (snapshot, capability_poll) = match settings {
            Some(settings) => (Some(settings.snapshot), settings.capability_poll),
            None => (None, DEFAULT_CAPABILITY_POLL),
        };
        let tuning = snapshot
            .as_ref()
            .map(|s| *s.tuning())
            .unwrap_or_else(MotionTuning::default);
        let snapshots = Arc::new(SnapshotCell::new(snapshot));
        let engine = MotionEngine::new(tuning, backend.clone());
        let controller = ModalController::new(snapshots.clone(), engine.handle(), status);

        Self {
            backend,
            snapshots,
            controller: Arc::new(Mutex::new(controller)),
            engine,
            capability_poll,
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Mutex::new(false),
            monitor: Mutex::new(None),
        }
    }

    fn controller(&self) -> MutexGuard<'_, ModalController> {
        self.controller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stop_requested(&self) -> MutexGuard<'_, bool> {
        self.stop_requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Capture keys and drive the pointer (blocking).
    ///
    /// Blocks the current thread until [`stop`](Self::stop) is called from
    /// another thread (or a signal handler).
    pub fn run(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }

        let result = self.run_inner();

        self.controller().shutdown();
        if let Err(e) = self.engine.shutdown() {
            log::warn!("{e}");
        }
        if let Some(mut monitor) = self
            .monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            && let Err(e) = monitor.stop()
        {
            log::warn!("{e}");
        }
        let mut requested = self.stop_requested();
        *requested = false;
        self.running.store(false, Ordering::SeqCst);
        drop(requested);
        result
    }

    fn run_inner(&self) -> Result<()> {
        let capability = poll_once(self.backend.as_ref(), &self.controller);
        log::info!("input capability: {capability}");

        self.engine.start()?;
        let monitor = CapabilityMonitor::spawn(
            self.backend.clone(),
            self.controller.clone(),
            self.capability_poll,
        )?;
        *self
            .monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(monitor);

        if *self.stop_requested() {
            log::debug!("stop requested during startup");
            return Ok(());
        }

        let controller = self.controller.clone();
        let handler = move |event: &KeyEvent| match controller.lock() {
            Ok(mut controller) => controller.handle(event),
            // A panic elsewhere must never eat the user's keystrokes.
            Err(_) => Disposition::PassThrough,
        };
        self.backend.subscribe(Box::new(handler))
    }

    /// Leave navigation mode and stop the key listener.
    ///
    /// A stop issued while [`run`](Self::run) is still starting up makes it
    /// return before the listener is installed.
    pub fn stop(&self) -> Result<()> {
        {
            let mut requested = self.stop_requested();
            if !self.running.load(Ordering::SeqCst) {
                return Err(Error::NotRunning);
            }
            *requested = true;
        }
        self.controller().shutdown();
        self.backend.stop()
    }

    /// Apply a reloaded configuration.
    ///
    /// A valid snapshot replaces the current one atomically. An invalid one
    /// is logged and dropped; the previous snapshot stays in effect and
    /// navigation mode is switched off.
    pub fn reload(&self, settings: Result<Settings>) {
        match settings {
            Ok(settings) => {
                let tuning = *settings.snapshot.tuning();
                self.snapshots.store(settings.snapshot);
                self.engine.handle().set_tuning(tuning);
                log::info!("configuration reloaded");
            }
            Err(e) => {
                log::error!("configuration rejected, keeping previous: {e}");
                self.controller().config_rejected();
            }
        }
    }

    pub fn mode(&self) -> ModeState {
        self.controller().mode()
    }

    /// The snapshot currently used for translation.
    pub fn snapshot(&self) -> Option<Arc<BindingSnapshot>> {
        self.snapshots.load()
    }

    /// Check if the navigator is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for Navigator {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}
