//! X11 key capture using XRecord.
//!
//! XRecord observes a copy of the event stream and cannot consume events,
//! so on this backend navigation keys also reach the focused window. Use
//! the evdev backend for exclusive capture.

use crate::backend::KeyHandler;
use crate::error::{Error, Result};
use crate::event::{KeyEdge, KeyEvent};
use crate::state::ModifierTracker;
use std::os::raw::{c_char, c_int, c_uchar, c_ulong};
use std::ptr::null;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use x11::xlib;
use x11::xrecord;

use crate::platform::linux::keycodes::keycode_to_key;

/// Stored handler for the callback
static HANDLER: Mutex<Option<Box<dyn KeyHandler>>> = Mutex::new(None);

/// Flag to signal stopping
static STOP_FLAG: Mutex<Option<Arc<AtomicBool>>> = Mutex::new(None);

/// XRecord context for stopping the hook
static CONTEXT: Mutex<Option<xrecord::XRecordContext>> = Mutex::new(None);

static MODIFIERS: ModifierTracker = ModifierTracker::new();

const FALSE: c_int = 0;

/// Leading fields of an intercepted core event
#[repr(C)]
struct XRecordDatum {
    type_: u8,
    code: u8,
}

/// Convert an X11 key event to our KeyEvent type
fn convert_event(type_: c_int, code: u8) -> Option<KeyEvent> {
    let edge = match type_ {
        t if t == xlib::KeyPress => KeyEdge::Press,
        t if t == xlib::KeyRelease => KeyEdge::Release,
        _ => return None,
    };
    let key = keycode_to_key(code as u32);
    let modifiers = MODIFIERS.observe(key, edge);

    Some(KeyEvent {
        key,
        raw_code: code as u32,
        edge,
        modifiers,
        time: Instant::now(),
    })
}

/// XRecord callback
unsafe extern "C" fn record_callback(
    _null: *mut c_char,
    raw_data: *mut xrecord::XRecordInterceptData,
) {
    unsafe {
        let data = match raw_data.as_ref() {
            Some(d) => d,
            None => return,
        };

        if data.category != xrecord::XRecordFromServer {
            xrecord::XRecordFreeData(raw_data);
            return;
        }

        if let Ok(guard) = STOP_FLAG.lock()
            && let Some(ref flag) = *guard
            && !flag.load(Ordering::SeqCst)
        {
            xrecord::XRecordFreeData(raw_data);
            return;
        }

        #[allow(clippy::cast_ptr_alignment)]
        let xdatum = match (data.data as *const XRecordDatum).as_ref() {
            Some(d) => d,
            None => {
                xrecord::XRecordFreeData(raw_data);
                return;
            }
        };

        if let Some(event) = convert_event(xdatum.type_ as c_int, xdatum.code)
            && let Ok(guard) = HANDLER.lock()
            && let Some(ref handler) = *guard
        {
            // The disposition cannot be honored here.
            let _ = handler.handle_key(&event);
        }

        xrecord::XRecordFreeData(raw_data);
    }
}

/// Run the record loop (blocking) until [`stop_hook`] is called.
pub fn run_grab_hook(running: &Arc<AtomicBool>, handler: Box<dyn KeyHandler>) -> Result<()> {
    log::warn!(
        "X11 XRecord cannot consume events; navigation keys will also reach \
         the focused window. Build with the 'evdev' feature for exclusive capture."
    );

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

    let result = unsafe { record() };

    *HANDLER.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    *STOP_FLAG.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    *CONTEXT.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;

    result
}

unsafe fn record() -> Result<()> {
    unsafe {
        let dpy_data = xlib::XOpenDisplay(null());
        if dpy_data.is_null() {
            return Err(Error::SubscribeFailed("Failed to open X display".into()));
        }

        let extension_name = c"RECORD";
        let extension = xlib::XInitExtension(dpy_data, extension_name.as_ptr());
        if extension.is_null() {
            xlib::XCloseDisplay(dpy_data);
            return Err(Error::SubscribeFailed(
                "XRecord extension not available".into(),
            ));
        }

        // Keys only; our own XTest pointer events stay out of the stream.
        let range = xrecord::XRecordAllocRange();
        if range.is_null() {
            xlib::XCloseDisplay(dpy_data);
            return Err(Error::SubscribeFailed("XRecordAllocRange failed".into()));
        }
        (*range).device_events.first = xlib::KeyPress as c_uchar;
        (*range).device_events.last = xlib::KeyRelease as c_uchar;

        let mut record_all_clients: c_ulong = xrecord::XRecordAllClients;
        let mut ranges = [range];
        let context = xrecord::XRecordCreateContext(
            dpy_data,
            0,
            &mut record_all_clients,
            1,
            ranges.as_mut_ptr(),
            1,
        );
        xlib::XFree(range.cast());

        if context == 0 {
            xlib::XCloseDisplay(dpy_data);
            return Err(Error::SubscribeFailed(
                "Failed to create XRecord context".into(),
            ));
        }

        xlib::XSync(dpy_data, FALSE);

        {
            let mut c = CONTEXT
                .lock()
                .map_err(|_| Error::ThreadError("context mutex poisoned".into()))?;
            *c = Some(context);
        }
        log::debug!("XRecord context enabled");

        let result =
            xrecord::XRecordEnableContext(dpy_data, context, Some(record_callback), &mut 0);

        xrecord::XRecordFreeContext(dpy_data, context);
        xlib::XCloseDisplay(dpy_data);

        if result == 0 {
            return Err(Error::SubscribeFailed(
                "Failed to enable XRecord context".into(),
            ));
        }
    }
    Ok(())
}

/// Stop the record loop.
pub fn stop_hook() -> Result<()> {
    if let Ok(guard) = STOP_FLAG.lock()
        && let Some(ref flag) = *guard
    {
        flag.store(false, Ordering::SeqCst);
    }

    // XRecordDisableContext must come from a separate control connection
    // to unblock XRecordEnableContext on the data connection.
    unsafe {
        if let Ok(ctx_guard) = CONTEXT.lock()
            && let Some(ctx) = *ctx_guard
        {
            let dpy_control = xlib::XOpenDisplay(null());
            if !dpy_control.is_null() {
                xrecord::XRecordDisableContext(dpy_control, ctx);
                xlib::XFlush(dpy_control);
                xlib::XCloseDisplay(dpy_control);
            }
        }
    }

    Ok(())
}
