//! macOS key capture using a CGEventTap.
//!
//! The tap is created in the active (non listen-only) mode so the callback
//! can swallow a key by returning null. Only keyboard event types are
//! requested, and events carrying the injection tag are ignored.

#![allow(improper_ctypes_definitions)]
#![allow(unsafe_op_in_unsafe_fn)]

use crate::backend::{Disposition, KeyHandler};
use crate::error::{Error, Result};
use crate::event::{KeyEdge, KeyEvent, Modifiers};
use crate::keycode::Key;
use core::ptr::NonNull;
use objc2_core_foundation::{CFMachPort, CFRetained, CFRunLoop, kCFRunLoopCommonModes};
use objc2_core_graphics::{
    CGEvent, CGEventField, CGEventFlags, CGEventMask, CGEventTapCallBack, CGEventTapLocation,
    CGEventTapOptions, CGEventTapPlacement, CGEventTapProxy, CGEventType,
};
use objc2_foundation::NSAutoreleasePool;
use std::ffi::c_void;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::keycodes::keycode_to_key;
use super::simulate::INJECTED_TAG;

/// Stored handler for the callback
static HANDLER: Mutex<Option<Box<dyn KeyHandler>>> = Mutex::new(None);

/// Flag to signal the run loop to stop
static STOP_FLAG: Mutex<Option<Arc<AtomicBool>>> = Mutex::new(None);

/// Wrapper for raw pointer to CFMachPort that implements Send + Sync
/// Safety: The pointer is only accessed from the callback which runs on the same thread
struct TapPointer(*const CFMachPort);
unsafe impl Send for TapPointer {}
unsafe impl Sync for TapPointer {}

/// Stored event tap for timeout recovery
static EVENT_TAP: Mutex<Option<TapPointer>> = Mutex::new(None);

/// The run loop the tap is attached to. `CFRunLoopStop` may be called from
/// any thread.
struct LoopHandle(CFRetained<CFRunLoop>);
unsafe impl Send for LoopHandle {}

static RUN_LOOP: Mutex<Option<LoopHandle>> = Mutex::new(None);

#[link(name = "Cocoa", kind = "framework")]
unsafe extern "C" {}

fn key_event_mask() -> CGEventMask {
    (1 << CGEventType::KeyDown.0) | (1 << CGEventType::KeyUp.0) | (1 << CGEventType::FlagsChanged.0)
}

/// Convert CGEventFlags to our modifier set
fn flags_to_modifiers(flags: CGEventFlags) -> Modifiers {
    let mut mods = Modifiers::NONE;
    if flags.contains(CGEventFlags::MaskShift) {
        mods.insert(Modifiers::SHIFT);
    }
    if flags.contains(CGEventFlags::MaskControl) {
        mods.insert(Modifiers::CTRL);
    }
    if flags.contains(CGEventFlags::MaskAlternate) {
        mods.insert(Modifiers::ALT);
    }
    if flags.contains(CGEventFlags::MaskCommand) {
        mods.insert(Modifiers::META);
    }
    mods
}

// Device-dependent flag bits from IOLLEvent.h, one per physical key.
const NX_DEVICELCTLKEYMASK: u64 = 0x0000_0001;
const NX_DEVICELSHIFTKEYMASK: u64 = 0x0000_0002;
const NX_DEVICERSHIFTKEYMASK: u64 = 0x0000_0004;
const NX_DEVICELCMDKEYMASK: u64 = 0x0000_0008;
const NX_DEVICERCMDKEYMASK: u64 = 0x0000_0010;
const NX_DEVICELALTKEYMASK: u64 = 0x0000_0020;
const NX_DEVICERALTKEYMASK: u64 = 0x0000_0040;
const NX_DEVICERCTLKEYMASK: u64 = 0x0000_2000;

/// The device bit of `key` and of its left/right twin.
fn device_bits(key: Key) -> Option<(u64, u64)> {
    Some(match key {
        Key::ShiftLeft => (NX_DEVICELSHIFTKEYMASK, NX_DEVICERSHIFTKEYMASK),
        Key::ShiftRight => (NX_DEVICERSHIFTKEYMASK, NX_DEVICELSHIFTKEYMASK),
        Key::ControlLeft => (NX_DEVICELCTLKEYMASK, NX_DEVICERCTLKEYMASK),
        Key::ControlRight => (NX_DEVICERCTLKEYMASK, NX_DEVICELCTLKEYMASK),
        Key::AltLeft => (NX_DEVICELALTKEYMASK, NX_DEVICERALTKEYMASK),
        Key::AltRight => (NX_DEVICERALTKEYMASK, NX_DEVICELALTKEYMASK),
        Key::MetaLeft => (NX_DEVICELCMDKEYMASK, NX_DEVICERCMDKEYMASK),
        Key::MetaRight => (NX_DEVICERCMDKEYMASK, NX_DEVICELCMDKEYMASK),
        _ => return None,
    })
}

/// FlagsChanged carries the new flag state; a modifier key went down if its
/// flag is now set. The device bits tell left and right apart, so releasing
/// one shift while the other is held is still a release. Events without
/// device bits fall back to the collapsed modifier flag.
fn flags_changed_edge(key: Key, flags: CGEventFlags) -> Option<KeyEdge> {
    let down = if key == Key::CapsLock {
        flags.contains(CGEventFlags::MaskAlphaShift)
    } else {
        let modifier = key.modifier()?;
        match device_bits(key) {
            Some((own, twin)) if flags.0 & (own | twin) != 0 => flags.0 & own != 0,
            _ => flags_to_modifiers(flags).contains(modifier),
        }
    };
    Some(if down { KeyEdge::Press } else { KeyEdge::Release })
}

/// Convert a CGEvent to our KeyEvent type
unsafe fn convert_event(event_type: CGEventType, cg_event: NonNull<CGEvent>) -> Option<KeyEvent> {
    let tag = CGEvent::integer_value_field(
        Some(cg_event.as_ref()),
        CGEventField::EventSourceUserData,
    );
    if tag == INJECTED_TAG {
        return None;
    }
    let code = CGEvent::integer_value_field(
        Some(cg_event.as_ref()),
        CGEventField::KeyboardEventKeycode,
    ) as u16;
    let key = keycode_to_key(code);
    let flags = CGEvent::flags(Some(cg_event.as_ref()));

    let edge = match event_type {
        CGEventType::KeyDown => KeyEdge::Press,
        CGEventType::KeyUp => KeyEdge::Release,
        CGEventType::FlagsChanged => flags_changed_edge(key, flags)?,
        _ => return None,
    };

    Some(KeyEvent {
        key,
        raw_code: code as u32,
        edge,
        modifiers: flags_to_modifiers(flags),
        time: Instant::now(),
    })
}

/// The CGEventTap callback
unsafe extern "C-unwind" fn event_callback(
    _proxy: CGEventTapProxy,
    event_type: CGEventType,
    cg_event: NonNull<CGEvent>,
    _user_info: *mut c_void,
) -> *mut CGEvent {
    // Check if we should stop
    if let Ok(guard) = STOP_FLAG.lock()
        && let Some(ref flag) = *guard
        && !flag.load(Ordering::SeqCst)
    {
        if let Some(run_loop) = CFRunLoop::current() {
            run_loop.stop();
        }
        return cg_event.as_ptr();
    }

    // macOS disables the tap if the callback takes too long
    if event_type == CGEventType::TapDisabledByTimeout
        || event_type == CGEventType::TapDisabledByUserInput
    {
        if let Ok(guard) = EVENT_TAP.lock()
            && let Some(ref tap_ptr) = *guard
        {
            log::warn!("Event tap was disabled (timeout or user input), re-enabling...");
            if !tap_ptr.0.is_null() {
                CGEvent::tap_enable(&*tap_ptr.0, true);
            }
        }
        return cg_event.as_ptr();
    }

    if let Some(event) = convert_event(event_type, cg_event)
        && let Ok(guard) = HANDLER.lock()
        && let Some(ref handler) = *guard
        && handler.handle_key(&event) == Disposition::Consume
    {
        return null_mut();
    }

    cg_event.as_ptr()
}

fn clear_statics() {
    *HANDLER.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    *STOP_FLAG.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    *EVENT_TAP.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    *RUN_LOOP.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
}

/// Run the key tap (blocking) until [`stop_hook`] is called.
pub fn run_grab_hook(running: &Arc<AtomicBool>, handler: Box<dyn KeyHandler>) -> Result<()> {
    {
        let mut h = HANDLER
            .lock()
            .map_err(|_| Error::ThreadError("mutex poisoned".into()))?;
        *h = Some(handler);
    }
    {
        let mut s = STOP_FLAG
            .lock()
            .map_err(|_| Error::ThreadError("mutex poisoned".into()))?;
        *s = Some(running.clone());
    }

    let result = unsafe { run_tap() };
    clear_statics();
    result
}

unsafe fn run_tap() -> Result<()> {
    let _pool = NSAutoreleasePool::new();

    let callback: CGEventTapCallBack = Some(event_callback);
    let tap = CGEvent::tap_create(
        CGEventTapLocation::HIDEventTap,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default, // Allows consumption
        key_event_mask(),
        callback,
        null_mut(),
    )
    .ok_or_else(|| {
        Error::CapabilityDenied(
            "Failed to create event tap. Make sure Accessibility permissions are granted.".into(),
        )
    })?;

    // Store the tap reference for timeout recovery
    {
        let mut tap_guard = EVENT_TAP
            .lock()
            .map_err(|_| Error::ThreadError("mutex poisoned".into()))?;
        *tap_guard = Some(TapPointer(&*tap as *const CFMachPort));
    }

    let source = CFMachPort::new_run_loop_source(None, Some(&tap), 0)
        .ok_or_else(|| Error::SubscribeFailed("Failed to create run loop source".into()))?;

    let current_loop = CFRunLoop::current()
        .ok_or_else(|| Error::SubscribeFailed("Failed to get current run loop".into()))?;

    current_loop.add_source(Some(&source), kCFRunLoopCommonModes);
    {
        let mut run_loop = RUN_LOOP
            .lock()
            .map_err(|_| Error::ThreadError("mutex poisoned".into()))?;
        *run_loop = Some(LoopHandle(current_loop.clone()));
    }

    CGEvent::tap_enable(&tap, true);
    log::debug!("event tap enabled");

    CFRunLoop::run();

    CGEvent::tap_enable(&tap, false);
    log::debug!("event tap disabled");
    Ok(())
}

/// Stop the key tap.
pub fn stop_hook() -> Result<()> {
    let guard = RUN_LOOP
        .lock()
        .map_err(|_| Error::ThreadError("mutex poisoned".into()))?;
    if let Some(LoopHandle(run_loop)) = guard.as_ref() {
        run_loop.stop();
    }
    Ok(())
}
