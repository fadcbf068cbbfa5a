//! Periodic polling of the backend's permission state.
//!
//! Permission can be revoked at any time (macOS lets the user untick the
//! accessibility checkbox while we run). A denied reading forces navigation
//! mode off within one polling interval.

use crate::backend::{Capability, InputBackend};
use crate::controller::ModalController;
use crate::error::{Error, Result};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Read the backend's capability once and hand it to the controller.
pub fn poll_once(backend: &dyn InputBackend, controller: &Mutex<ModalController>) -> Capability {
    let capability = backend.capability();
    let mut controller = controller
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    controller.set_capability(capability);
    capability
}

/// Background thread running [`poll_once`] at a fixed interval.
pub struct CapabilityMonitor {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CapabilityMonitor {
    pub fn spawn(
        backend: Arc<dyn InputBackend>,
        controller: Arc<Mutex<ModalController>>,
        interval: Duration,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = std::thread::Builder::new()
            .name("vimnav-capability".into())
            .spawn(move || {
                loop {
                    poll_once(backend.as_ref(), &controller);
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("capability monitor stopped");
            })
            .map_err(|e| Error::ThreadError(format!("failed to spawn capability monitor: {e}")))?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Stop polling and join the thread. Idempotent.
    pub fn stop(&mut self) -> Result<()> {
        // Dropping the sender wakes the thread.
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| Error::ThreadError("failed to join capability monitor".into()))?;
        }
        Ok(())
    }
}

impl Drop for CapabilityMonitor {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingBackend;
    use crate::binding::{BindingSnapshot, Chord, SnapshotCell};
    use crate::controller::ModeState;
    use crate::event::{KeyEvent, Modifiers};
    use crate::keycode::Key;
    use crate::motion::{MotionEngine, MotionTuning};
    use crate::status::NullSink;

    fn active_controller(backend: &Arc<RecordingBackend>) -> (MotionEngine, Arc<Mutex<ModalController>>) {
        let engine = MotionEngine::new(MotionTuning::default(), backend.clone());
        let snapshot = BindingSnapshot::new(Chord::bare(Key::Escape), vec![], MotionTuning::default());
        let mut controller = ModalController::new(
            Arc::new(SnapshotCell::new(Some(snapshot))),
            engine.handle(),
            Arc::new(NullSink),
        );
        controller.set_capability(Capability::Granted);
        controller.handle(&KeyEvent::press(Key::Escape, 0, Modifiers::NONE));
        assert_eq!(controller.mode(), ModeState::Active);
        (engine, Arc::new(Mutex::new(controller)))
    }

    #[test]
    fn test_poll_once_forwards_reading() {
        let backend = RecordingBackend::new();
        let (_engine, controller) = active_controller(&backend);

        assert_eq!(poll_once(backend.as_ref(), &controller), Capability::Granted);
        assert_eq!(controller.lock().unwrap().mode(), ModeState::Active);

        backend.set_capability(Capability::Denied);
        assert_eq!(poll_once(backend.as_ref(), &controller), Capability::Denied);
        assert_eq!(controller.lock().unwrap().mode(), ModeState::Inactive);
    }

    #[test]
    fn test_monitor_forces_inactive_within_interval() {
        let backend = RecordingBackend::new();
        let (_engine, controller) = active_controller(&backend);
        let interval = Duration::from_millis(10);
        let mut monitor =
            CapabilityMonitor::spawn(backend.clone(), controller.clone(), interval).unwrap();

        std::thread::sleep(interval * 3);
        assert_eq!(controller.lock().unwrap().mode(), ModeState::Active);

        backend.set_capability(Capability::Denied);
        std::thread::sleep(interval * 5);
        assert_eq!(controller.lock().unwrap().mode(), ModeState::Inactive);
        assert_eq!(controller.lock().unwrap().capability(), Capability::Denied);

        monitor.stop().unwrap();
        monitor.stop().unwrap();
    }
}
