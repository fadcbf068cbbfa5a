//! The platform input boundary: key capture, consumption and injection.

use crate::error::Result;
use crate::event::{KeyEvent, SyntheticEvent};
use crate::platform;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What the OS should do with a key event after the handler has seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Swallow the event; the focused application never sees it.
    Consume,
    /// Deliver the event normally.
    PassThrough,
}

/// OS permission state for tapping and injecting input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Granted,
    Denied,
    /// The backend cannot tell (yet).
    Unknown,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Granted => f.write_str("granted"),
            Capability::Denied => f.write_str("denied"),
            Capability::Unknown => f.write_str("unknown"),
        }
    }
}

/// Receives every raw key event, synchronously, inside the OS callback.
///
/// The returned [`Disposition`] is applied before the OS delivers the event,
/// so implementations must be fast and must not block on injection.
pub trait KeyHandler: Send + Sync {
    fn handle_key(&self, event: &KeyEvent) -> Disposition;
}

/// Implement KeyHandler for closures.
impl<F> KeyHandler for F
where
    F: Fn(&KeyEvent) -> Disposition + Send + Sync,
{
    fn handle_key(&self, event: &KeyEvent) -> Disposition {
        self(event)
    }
}

/// A platform input backend.
///
/// Injected events must never come back through `subscribe` as key events.
pub trait InputBackend: Send + Sync {
    /// Deliver every system-wide key event to `handler`, in order, until
    /// [`stop`](InputBackend::stop) is called. Blocks the calling thread.
    fn subscribe(&self, handler: Box<dyn KeyHandler>) -> Result<()>;

    /// End a running `subscribe`. Safe to call when not subscribed.
    fn stop(&self) -> Result<()>;

    /// Synthesize one pointer event. Failures are per-event and non-fatal.
    fn inject(&self, event: &SyntheticEvent) -> Result<()>;

    /// Current permission state, re-evaluated on every call.
    fn capability(&self) -> Capability;
}

/// The backend for the current OS, selected at compile time.
pub struct NativeBackend {
    running: Arc<AtomicBool>,
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBackend {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if the OS listener is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl InputBackend for NativeBackend {
    fn subscribe(&self, handler: Box<dyn KeyHandler>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(crate::Error::AlreadyRunning);
        }
        let result = platform::run_grab_hook(&self.running, handler);
        self.running.store(false, Ordering::SeqCst);
        result
    }

    fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        platform::stop_hook()
    }

    fn inject(&self, event: &SyntheticEvent) -> Result<()> {
        platform::inject(event)
    }

    fn capability(&self) -> Capability {
        platform::capability()
    }
}

impl Drop for NativeBackend {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory backend that records injections and lets tests feed keys.

    use super::*;
    use crate::error::Error;
    use crate::event::Modifiers;
    use crate::keycode::Key;
    use std::sync::{Condvar, Mutex};
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Inner {
        handler: Option<Box<dyn KeyHandler>>,
        stopped: bool,
    }

    pub struct RecordingBackend {
        inner: Mutex<Inner>,
        subscribed: Condvar,
        injected: Mutex<Vec<(Instant, SyntheticEvent)>>,
        capability: Mutex<Capability>,
        capability_delay: Mutex<Duration>,
        fail_injects: AtomicBool,
    }

    impl RecordingBackend {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: Mutex::new(Inner::default()),
                subscribed: Condvar::new(),
                injected: Mutex::new(Vec::new()),
                capability: Mutex::new(Capability::Granted),
                capability_delay: Mutex::new(Duration::ZERO),
                fail_injects: AtomicBool::new(false),
            })
        }

        pub fn set_capability(&self, capability: Capability) {
            *self.capability.lock().unwrap() = capability;
        }

        /// Make every `capability()` call block for `delay` first.
        pub fn set_capability_delay(&self, delay: Duration) {
            *self.capability_delay.lock().unwrap() = delay;
        }

        pub fn fail_injects(&self, fail: bool) {
            self.fail_injects.store(fail, Ordering::SeqCst);
        }

        pub fn injected(&self) -> Vec<SyntheticEvent> {
            self.injected.lock().unwrap().iter().map(|(_, e)| *e).collect()
        }

        pub fn injected_at(&self) -> Vec<Instant> {
            self.injected.lock().unwrap().iter().map(|(t, _)| *t).collect()
        }

        pub fn clear(&self) {
            self.injected.lock().unwrap().clear();
        }

        /// Wait until a handler is subscribed.
        pub fn wait_subscribed(&self, timeout: Duration) -> bool {
            let guard = self.inner.lock().unwrap();
            let (guard, _) = self
                .subscribed
                .wait_timeout_while(guard, timeout, |inner| inner.handler.is_none())
                .unwrap();
            guard.handler.is_some()
        }

        /// Deliver a key event as the OS would. `None` if nobody subscribed.
        pub fn feed(&self, event: &KeyEvent) -> Option<Disposition> {
            let inner = self.inner.lock().unwrap();
            inner.handler.as_ref().map(|h| h.handle_key(event))
        }

        pub fn press(&self, key: Key, mods: Modifiers) -> Option<Disposition> {
            self.feed(&KeyEvent::press(key, 0, mods))
        }

        pub fn release(&self, key: Key, mods: Modifiers) -> Option<Disposition> {
            self.feed(&KeyEvent::release(key, 0, mods))
        }
    }

    impl InputBackend for RecordingBackend {
        fn subscribe(&self, handler: Box<dyn KeyHandler>) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            inner.stopped = false;
            inner.handler = Some(handler);
            self.subscribed.notify_all();
            let mut inner = self
                .subscribed
                .wait_while(inner, |inner| !inner.stopped)
                .unwrap();
            inner.handler = None;
            Ok(())
        }

        fn stop(&self) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            inner.stopped = true;
            self.subscribed.notify_all();
            Ok(())
        }

        fn inject(&self, event: &SyntheticEvent) -> Result<()> {
            if self.fail_injects.load(Ordering::SeqCst) {
                return Err(Error::InjectFailed("recording backend set to fail".into()));
            }
            self.injected
                .lock()
                .unwrap()
                .push((Instant::now(), *event));
            Ok(())
        }

        fn capability(&self) -> Capability {
            let delay = *self.capability_delay.lock().unwrap();
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            *self.capability.lock().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Modifiers;
    use crate::keycode::Key;
    use testing::RecordingBackend;

    #[test]
    fn test_closure_handler() {
        let handler = |event: &KeyEvent| {
            if event.key == Key::KeyH {
                Disposition::Consume
            } else {
                Disposition::PassThrough
            }
        };
        let h = KeyEvent::press(Key::KeyH, 0, Modifiers::NONE);
        let a = KeyEvent::press(Key::KeyA, 0, Modifiers::NONE);
        assert_eq!(handler.handle_key(&h), Disposition::Consume);
        assert_eq!(handler.handle_key(&a), Disposition::PassThrough);
    }

    #[test]
    fn test_recording_backend_subscribe_and_stop() {
        let backend = RecordingBackend::new();
        let runner = backend.clone();
        let thread = std::thread::spawn(move || {
            runner.subscribe(Box::new(|_: &KeyEvent| Disposition::Consume))
        });

        assert!(backend.wait_subscribed(std::time::Duration::from_secs(2)));
        assert_eq!(
            backend.press(Key::KeyJ, Modifiers::NONE),
            Some(Disposition::Consume)
        );

        backend.stop().unwrap();
        thread.join().unwrap().unwrap();
        assert_eq!(backend.press(Key::KeyJ, Modifiers::NONE), None);
    }
}
