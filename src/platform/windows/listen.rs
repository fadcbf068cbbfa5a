//! Windows key capture using a low-level keyboard hook.

use crate::backend::{Disposition, KeyHandler};
use crate::error::{Error, Result};
use crate::event::{KeyEdge, KeyEvent};
use crate::state::ModifierTracker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

// Wrapper for HHOOK to make it Send + Sync
#[derive(Clone, Copy)]
struct SendableHHOOK(HHOOK);

// SAFETY: HHOOK is just a handle/pointer that the Windows API owns.
// It's safe to send between threads because Windows handles are thread-safe.
unsafe impl Send for SendableHHOOK {}
unsafe impl Sync for SendableHHOOK {}
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, LLKHF_INJECTED, MSG,
    PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx, WH_KEYBOARD_LL, WM_KEYDOWN,
    WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use super::keycodes::keycode_to_key;

/// Stored handler for the callback
static HANDLER: Mutex<Option<Box<dyn KeyHandler>>> = Mutex::new(None);

/// Flag to signal stopping
static STOP_FLAG: Mutex<Option<Arc<AtomicBool>>> = Mutex::new(None);

/// Hook handle
static KEYBOARD_HOOK: Mutex<Option<SendableHHOOK>> = Mutex::new(None);

/// Thread ID for message posting
static THREAD_ID: Mutex<u32> = Mutex::new(0);

/// The hook struct carries no modifier state.
static MODIFIERS: ModifierTracker = ModifierTracker::new();

/// Convert a hook message to our KeyEvent type. Events we injected
/// ourselves are ignored.
unsafe fn convert_event(wparam: WPARAM, lparam: LPARAM) -> Option<KeyEvent> {
    let kb = unsafe { *(lparam.0 as *const KBDLLHOOKSTRUCT) };
    if kb.flags.0 & LLKHF_INJECTED.0 != 0 {
        return None;
    }

    let edge = match wparam.0 as u32 {
        WM_KEYDOWN | WM_SYSKEYDOWN => KeyEdge::Press,
        WM_KEYUP | WM_SYSKEYUP => KeyEdge::Release,
        _ => return None,
    };
    let key = keycode_to_key(kb.vkCode as u16);
    let modifiers = MODIFIERS.observe(key, edge);

    Some(KeyEvent {
        key,
        raw_code: kb.vkCode,
        edge,
        modifiers,
        time: Instant::now(),
    })
}

fn post_quit() {
    if let Ok(thread_id) = THREAD_ID.lock()
        && *thread_id != 0
    {
        let _ = unsafe { PostThreadMessageW(*thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
    }
}

/// Keyboard hook callback
unsafe extern "system" fn keyboard_callback(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32 {
        if let Ok(guard) = STOP_FLAG.lock()
            && let Some(ref flag) = *guard
            && !flag.load(Ordering::SeqCst)
        {
            post_quit();
        }

        if let Some(event) = unsafe { convert_event(wparam, lparam) }
            && let Ok(guard) = HANDLER.lock()
            && let Some(ref handler) = *guard
            && handler.handle_key(&event) == Disposition::Consume
        {
            return LRESULT(1);
        }
    }

    let hook = KEYBOARD_HOOK.lock().ok().and_then(|g| g.map(|h| h.0));
    unsafe { CallNextHookEx(hook, code, wparam, lparam) }
}

/// Run the keyboard hook (blocking) until [`stop_hook`] is called.
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
    MODIFIERS.reset();

    // Store current thread ID for stopping
    {
        let mut tid = THREAD_ID
            .lock()
            .map_err(|_| Error::ThreadError("mutex poisoned".into()))?;
        *tid = unsafe { GetCurrentThreadId() };
    }

    let keyboard_hook = unsafe {
        SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_callback), None, 0)
            .map_err(|e| Error::SubscribeFailed(format!("Failed to set keyboard hook: {}", e)))?
    };
    {
        let mut kh = KEYBOARD_HOOK
            .lock()
            .map_err(|_| Error::ThreadError("mutex poisoned".into()))?;
        *kh = Some(SendableHHOOK(keyboard_hook));
    }
    log::debug!("keyboard hook installed");

    // Message loop
    let mut msg = MSG::default();
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            if let Ok(guard) = STOP_FLAG.lock()
                && let Some(ref flag) = *guard
                && !flag.load(Ordering::SeqCst)
            {
                break;
            }
        }
    }

    unsafe {
        if let Ok(mut kh) = KEYBOARD_HOOK.lock()
            && let Some(hook) = kh.take()
        {
            let _ = UnhookWindowsHookEx(hook.0);
        }
    }
    log::debug!("keyboard hook removed");

    *HANDLER.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    *STOP_FLAG.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    *THREAD_ID.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = 0;

    Ok(())
}

/// Stop the keyboard hook.
pub fn stop_hook() -> Result<()> {
    post_quit();
    Ok(())
}
