//! # vimnav
//!
//! System-wide, vim-style pointer navigation: press a toggle key and the
//! home row drives the mouse.
//!
//! ## Features
//!
//! - Cross-platform support (macOS, Windows, Linux evdev or X11)
//! - Modal toggle with consumed navigation keys while active
//! - Continuous, accelerating cursor motion and scrolling with diagonals
//! - Clicks, drag toggle, screen-edge jumps and a precision hold
//! - TOML configuration with live reload
//! - Status notifications for an external mode indicator
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vimnav::{NativeBackend, Navigator, TomlConfigProvider};
//!
//! let settings = TomlConfigProvider::new(None)
//!     .load_settings()
//!     .expect("invalid configuration");
//! let navigator = Navigator::new(Arc::new(NativeBackend::new()), Some(settings));
//!
//! // Blocks until `navigator.stop()` is called from another thread.
//! navigator.run().expect("failed to start navigation");
//! ```
//!
//! ## Architecture
//!
//! Every key event from the [`InputBackend`] goes synchronously through the
//! [`ModalController`], which decides whether the OS should swallow it. Key
//! presses and releases are turned into [`NavigationAction`]s against an
//! immutable [`BindingSnapshot`]; continuous actions are held in the
//! [`MotionEngine`], whose worker thread injects accumulated pointer motion
//! once per tick.

pub mod action;
pub mod backend;
pub mod binding;
pub mod capability;
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod event;
pub mod keycode;
pub mod motion;
pub mod navigator;
pub mod state;
pub mod status;
pub mod translate;

mod platform;

// Re-exports
pub use action::{Direction, Edge, HoldKind, Magnitude, NavigationAction};
pub use backend::{Capability, Disposition, InputBackend, KeyHandler, NativeBackend};
pub use binding::{Binding, BindingSnapshot, Chord, ModifierMatch, SnapshotCell};
pub use config::{ConfigProvider, ConfigWatcher, Settings, TomlConfigProvider, parse_config};
pub use controller::{ModalController, ModeState, TransitionReason};
pub use display::{DisplayInfo, Rect, displays};
pub use error::{Error, Result};
pub use event::{Button, KeyEdge, KeyEvent, Modifiers, MotionVector, SyntheticEvent};
pub use keycode::Key;
pub use motion::{Curve, MotionEngine, MotionHandle, MotionTuning};
pub use navigator::Navigator;
pub use state::ModifierTracker;
pub use status::{NullSink, StatusEvent, StatusSink, status_channel, status_unbounded_channel};
pub use translate::translate;
