//! Fire-and-forget status notifications for an external indicator.
//!
//! Sinks are invoked from the key callback and the capability monitor, so
//! they must never block. The channel sinks use `try_send` and drop events
//! when the consumer falls behind.
//!
//! # Example
//!
//! ```no_run
//! use vimnav::status::status_channel;
//! use std::time::Duration;
//!
//! let (sink, rx) = status_channel(16);
//! // hand `sink` to Navigator::with_status(...)
//! # drop(sink);
//! while let Ok(event) = rx.recv_timeout(Duration::from_millis(100)) {
//!     println!("{event}");
//! }
//! ```

use crate::backend::Capability;
use crate::controller::{ModeState, TransitionReason};
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};

/// Something an indicator might want to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    ModeChanged {
        from: ModeState,
        to: ModeState,
        reason: TransitionReason,
    },
    CapabilityChanged {
        from: Capability,
        to: Capability,
    },
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::ModeChanged { from, to, reason } => {
                write!(f, "navigation mode {from} -> {to} ({reason})")
            }
            StatusEvent::CapabilityChanged { from, to } => {
                write!(f, "input capability {from} -> {to}")
            }
        }
    }
}

/// Receives status events. Must not block.
pub trait StatusSink: Send + Sync {
    fn notify(&self, event: StatusEvent);
}

/// Implement StatusSink for closures.
impl<F> StatusSink for F
where
    F: Fn(StatusEvent) + Send + Sync,
{
    fn notify(&self, event: StatusEvent) {
        self(event);
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn notify(&self, _event: StatusEvent) {}
}

/// Sink that sends events to a bounded sync channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: SyncSender<StatusEvent>,
}

impl StatusSink for ChannelSink {
    fn notify(&self, event: StatusEvent) {
        // Drop rather than block the key callback when the consumer is slow.
        let _ = self.sender.try_send(event);
    }
}

/// Sink that sends events to an unbounded sync channel.
#[derive(Debug, Clone)]
pub struct UnboundedChannelSink {
    sender: Sender<StatusEvent>,
}

impl StatusSink for UnboundedChannelSink {
    fn notify(&self, event: StatusEvent) {
        let _ = self.sender.send(event);
    }
}

/// Create a bounded status channel.
///
/// At most `capacity` events are buffered; further events are dropped until
/// the receiver catches up.
pub fn status_channel(capacity: usize) -> (ChannelSink, Receiver<StatusEvent>) {
    let (sender, receiver) = mpsc::sync_channel(capacity);
    (ChannelSink { sender }, receiver)
}

/// Create an unbounded status channel.
///
/// Status events are rare, so memory growth is only a concern if nothing
/// ever reads the receiver.
pub fn status_unbounded_channel() -> (UnboundedChannelSink, Receiver<StatusEvent>) {
    let (sender, receiver) = mpsc::channel();
    (UnboundedChannelSink { sender }, receiver)
}

// ============================================================================
// Tokio async support (behind feature flag)
// ============================================================================

#[cfg(feature = "tokio")]
pub use tokio_channel::*;

#[cfg(feature = "tokio")]
mod tokio_channel {
    use super::*;
    use tokio::sync::mpsc as tokio_mpsc;

    /// Sink that sends events to a tokio async channel.
    #[derive(Debug, Clone)]
    pub struct AsyncChannelSink {
        sender: tokio_mpsc::Sender<StatusEvent>,
    }

    impl StatusSink for AsyncChannelSink {
        fn notify(&self, event: StatusEvent) {
            // Use try_send to avoid blocking the hook thread
            let _ = self.sender.try_send(event);
        }
    }

    /// Create a bounded tokio status channel.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use vimnav::status::status_async_channel;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let (sink, mut rx) = status_async_channel(16);
    ///     // hand `sink` to the navigator, then:
    ///     while let Some(event) = rx.recv().await {
    ///         println!("{event}");
    ///     }
    /// }
    /// ```
    pub fn status_async_channel(
        capacity: usize,
    ) -> (AsyncChannelSink, tokio_mpsc::Receiver<StatusEvent>) {
        let (sender, receiver) = tokio_mpsc::channel(capacity);
        (AsyncChannelSink { sender }, receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggled_on() -> StatusEvent {
        StatusEvent::ModeChanged {
            from: ModeState::Inactive,
            to: ModeState::Active,
            reason: TransitionReason::Toggle,
        }
    }

    #[test]
    fn test_bounded_channel_drops_when_full() {
        let (sink, rx) = status_channel(2);
        for _ in 0..5 {
            sink.notify(toggled_on());
        }
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn test_unbounded_channel_keeps_everything() {
        let (sink, rx) = status_unbounded_channel();
        for _ in 0..5 {
            sink.notify(toggled_on());
        }
        assert_eq!(rx.try_iter().count(), 5);
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (sink, rx) = status_channel(1);
        drop(rx);
        sink.notify(toggled_on());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            toggled_on().to_string(),
            "navigation mode inactive -> active (toggle)"
        );
        let cap = StatusEvent::CapabilityChanged {
            from: Capability::Unknown,
            to: Capability::Denied,
        };
        assert_eq!(cap.to_string(), "input capability unknown -> denied");
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_async_channel() {
        let (sink, mut rx) = status_async_channel(4);
        sink.notify(toggled_on());
        drop(sink);
        assert_eq!(rx.recv().await, Some(toggled_on()));
        assert_eq!(rx.recv().await, None);
    }
}
