//! Linux evdev key capture.
//!
//! Keyboards are grabbed exclusively so that consumed keys never reach the
//! session. Every key event the handler passes through is re-emitted on a
//! uinput keyboard, which the compositor or X server picks up like any
//! other device. Works on both X11 and Wayland.

use crate::backend::{Disposition, KeyHandler};
use crate::error::{Error, Result};
use crate::event::{KeyEdge, KeyEvent};
use crate::platform::linux::keycodes::evdev_keycode_to_key;
use crate::state::ModifierTracker;
use evdev::{
    AttributeSet, Device, EventType as EvdevEventType, InputEvent, InputEventKind,
    Key as EvdevKey, RelativeAxisType,
    uinput::{VirtualDevice, VirtualDeviceBuilder},
};
use std::fs;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::DEVICE_NAME_PREFIX;

/// How long `poll` may block before the stop flag is re-checked.
const POLL_TIMEOUT_MS: i32 = 100;

const PASSTHROUGH_NAME: &str = "vimnav passthrough keyboard";

/// How long to wait for held keys to come up before grabbing anyway.
const RELEASE_WAIT: Duration = Duration::from_secs(2);
const RELEASE_POLL: Duration = Duration::from_millis(10);

/// Key state tracked across all grabbed keyboards.
static MODIFIERS: ModifierTracker = ModifierTracker::new();

/// A device that produces letters and Escape is treated as a keyboard.
/// Devices that also move the pointer are left alone so grabbing them
/// cannot freeze the mouse.
fn is_keyboard(device: &Device) -> bool {
    if device
        .name()
        .is_some_and(|name| name.starts_with(DEVICE_NAME_PREFIX))
    {
        return false;
    }
    let has_keys = device.supported_keys().is_some_and(|keys| {
        keys.contains(EvdevKey::KEY_A) && keys.contains(EvdevKey::KEY_ESC)
    });
    let moves_pointer = device
        .supported_relative_axes()
        .is_some_and(|axes| axes.contains(RelativeAxisType::REL_X));
    has_keys && !moves_pointer
}

fn event_device_paths() -> Result<Vec<PathBuf>> {
    let dir = fs::read_dir("/dev/input").map_err(|e| {
        Error::CapabilityDenied(format!(
            "Cannot access /dev/input: {}. Make sure you're in the 'input' group.",
            e
        ))
    })?;
    let mut paths: Vec<PathBuf> = dir
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("event"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Poll `keys_down` until it reports nothing held. Returns false if keys
/// are still down when `timeout` runs out.
fn wait_for_release<F>(mut keys_down: F, timeout: Duration, interval: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while keys_down() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(interval);
    }
    true
}

/// Open and grab every keyboard.
///
/// A key that is down when the grab starts would have its release swallowed
/// by the grab and stay pressed in the session, so each device is grabbed
/// only once all of its keys are up.
fn grab_keyboards() -> Result<Vec<Device>> {
    let mut grabbed = Vec::new();

    for path in event_device_paths()? {
        let mut device = match Device::open(&path) {
            Ok(device) => device,
            Err(e) => {
                log::debug!("Failed to open {}: {}", path.display(), e);
                continue;
            }
        };
        if !is_keyboard(&device) {
            continue;
        }
        let idle = wait_for_release(
            || {
                device
                    .get_key_state()
                    .is_ok_and(|keys| keys.iter().next().is_some())
            },
            RELEASE_WAIT,
            RELEASE_POLL,
        );
        if !idle {
            log::warn!(
                "{}: keys still held after {:?}, grabbing anyway",
                device.name().unwrap_or("unknown"),
                RELEASE_WAIT
            );
        }
        match device.grab() {
            Ok(()) => {
                log::info!(
                    "grabbed {} ({})",
                    device.name().unwrap_or("unknown"),
                    path.display()
                );
                grabbed.push(device);
            }
            Err(e) => log::warn!(
                "Failed to grab device {}: {}",
                device.name().unwrap_or("unknown"),
                e
            ),
        }
    }

    if grabbed.is_empty() {
        return Err(Error::CapabilityDenied(
            "Could not grab any keyboard. Make sure you're in the 'input' group: \
             sudo usermod -aG input $USER"
                .into(),
        ));
    }
    Ok(grabbed)
}

fn passthrough_keyboard() -> Result<VirtualDevice> {
    let mut keys = AttributeSet::<EvdevKey>::new();
    for code in 1..256 {
        keys.insert(EvdevKey::new(code));
    }

    VirtualDeviceBuilder::new()
        .map_err(|e| {
            Error::CapabilityDenied(format!(
                "Failed to open /dev/uinput: {}. Make sure it is accessible \
                 (you may need to be in the 'input' group or have appropriate udev rules).",
                e
            ))
        })?
        .name(PASSTHROUGH_NAME)
        .with_keys(&keys)
        .map_err(|e| Error::SubscribeFailed(format!("Failed to add keys: {}", e)))?
        .build()
        .map_err(|e| Error::SubscribeFailed(format!("Failed to create virtual keyboard: {}", e)))
}

/// Convert an evdev key event. Autorepeat (value 2) is reported as another
/// press.
fn convert_event(ev: &InputEvent) -> Option<KeyEvent> {
    let InputEventKind::Key(key) = ev.kind() else {
        return None;
    };
    let edge = match ev.value() {
        0 => KeyEdge::Release,
        1 | 2 => KeyEdge::Press,
        _ => return None,
    };
    let code = key.code();
    let key = evdev_keycode_to_key(code);
    let modifiers = MODIFIERS.observe(key, edge);

    Some(KeyEvent {
        key,
        raw_code: code as u32,
        edge,
        modifiers,
        time: Instant::now(),
    })
}

fn forward(passthrough: &mut VirtualDevice, ev: &InputEvent) {
    let event = InputEvent::new(EvdevEventType::KEY, ev.code(), ev.value());
    if let Err(e) = passthrough.emit(&[event]) {
        log::warn!("Failed to forward key event: {}", e);
    }
}

/// Run the grab loop (blocking) until `running` is cleared.
pub fn run_grab_hook(running: &Arc<AtomicBool>, handler: Box<dyn KeyHandler>) -> Result<()> {
    MODIFIERS.reset();
    let mut passthrough = passthrough_keyboard()?;
    let mut devices = grab_keyboards()?;

    let result = event_loop(running, &mut devices, &mut passthrough, handler.as_ref());

    for device in &mut devices {
        let _ = device.ungrab();
    }
    log::debug!("released {} keyboard(s)", devices.len());
    result
}

fn event_loop(
    running: &Arc<AtomicBool>,
    devices: &mut [Device],
    passthrough: &mut VirtualDevice,
    handler: &dyn KeyHandler,
) -> Result<()> {
    let mut poll_fds: Vec<libc::pollfd> = devices
        .iter()
        .map(|d| libc::pollfd {
            fd: d.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    while running.load(Ordering::SeqCst) {
        let ret =
            unsafe { libc::poll(poll_fds.as_mut_ptr(), poll_fds.len() as _, POLL_TIMEOUT_MS) };

        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::Platform(format!("poll error: {}", err)));
        }

        if ret == 0 {
            continue;
        }

        for (pfd, device) in poll_fds.iter_mut().zip(devices.iter_mut()) {
            if pfd.revents & (libc::POLLERR | libc::POLLHUP) != 0 {
                // Unplugged; stop polling it.
                log::warn!("lost device {}", device.name().unwrap_or("unknown"));
                pfd.fd = -1;
                continue;
            }
            if pfd.revents & libc::POLLIN == 0 {
                continue;
            }
            let events: Vec<InputEvent> = match device.fetch_events() {
                Ok(events) => events.collect(),
                Err(e) => {
                    log::debug!("fetch_events failed: {}", e);
                    continue;
                }
            };
            for ev in &events {
                if let Some(key_event) = convert_event(ev)
                    && handler.handle_key(&key_event) == Disposition::PassThrough
                {
                    forward(passthrough, ev);
                }
            }
        }
    }

    Ok(())
}

/// Stop the grab loop. The stop is signaled via the running atomic.
pub fn stop_hook() -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Modifiers;
    use crate::keycode::Key;

    #[test]
    fn test_convert_event_edges() {
        let press = InputEvent::new(EvdevEventType::KEY, EvdevKey::KEY_J.code(), 1);
        let repeat = InputEvent::new(EvdevEventType::KEY, EvdevKey::KEY_J.code(), 2);
        let release = InputEvent::new(EvdevEventType::KEY, EvdevKey::KEY_J.code(), 0);
        let sync = InputEvent::new(EvdevEventType::SYNCHRONIZATION, 0, 0);

        let event = convert_event(&press).unwrap();
        assert_eq!(event.key, Key::KeyJ);
        assert_eq!(event.edge, KeyEdge::Press);
        assert_eq!(convert_event(&repeat).unwrap().edge, KeyEdge::Press);
        assert_eq!(convert_event(&release).unwrap().edge, KeyEdge::Release);
        assert!(convert_event(&sync).is_none());
    }

    #[test]
    fn test_wait_for_release() {
        let mut polls = 0;
        let idle = wait_for_release(
            || {
                polls += 1;
                polls < 3
            },
            Duration::from_secs(1),
            Duration::from_millis(1),
        );
        assert!(idle);
        assert_eq!(polls, 3);

        let stuck = wait_for_release(|| true, Duration::from_millis(20), Duration::from_millis(1));
        assert!(!stuck);
    }

    #[test]
    fn test_convert_event_tracks_modifiers() {
        let ctrl = EvdevKey::KEY_LEFTCTRL.code();
        convert_event(&InputEvent::new(EvdevEventType::KEY, ctrl, 1));
        let j = convert_event(&InputEvent::new(EvdevEventType::KEY, EvdevKey::KEY_J.code(), 1));
        assert_eq!(j.unwrap().modifiers, Modifiers::CTRL);
        convert_event(&InputEvent::new(EvdevEventType::KEY, ctrl, 0));
        assert_eq!(MODIFIERS.current(), Modifiers::NONE);
    }
}
