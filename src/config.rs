//! TOML configuration provider.
//!
//! ```toml
//! toggle = "escape"
//!
//! [motion]
//! tick_interval_ms = 16
//! initial_step = 1.0
//! max_step = 40.0
//!
//! [[bindings]]
//! key = "ctrl+j"
//! action = "scroll-down"
//! ```
//!
//! User bindings are layered over the built-in keymap: a user binding with
//! the same chord replaces the default one. Set
//! `replace_default_bindings = true` to start from an empty keymap.

use crate::action::NavigationAction;
use crate::binding::{Binding, BindingSnapshot, Chord};
use crate::error::{Error, Result};
use crate::motion::{Curve, MotionTuning};
use directories::ProjectDirs;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB
const MAX_BINDINGS: usize = 512;
const MAX_TICK_INTERVAL_MS: u64 = 1_000;
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// Built-in keymap, in configuration syntax.
pub const DEFAULT_BINDINGS: &[(&str, &str)] = &[
    ("h", "move-left"),
    ("j", "move-down"),
    ("k", "move-up"),
    ("l", "move-right"),
    ("shift+h", "scroll-left"),
    ("shift+j", "scroll-down"),
    ("shift+k", "scroll-up"),
    ("shift+l", "scroll-right"),
    ("return", "click-left"),
    ("i", "click-right"),
    ("v", "toggle-drag"),
    ("g", "jump-top"),
    ("shift+g", "jump-bottom"),
    ("any+space", "precision"),
];

pub const DEFAULT_TOGGLE: &str = "escape";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MotionSection {
    pub tick_interval_ms: u64,
    pub initial_step: f64,
    pub max_step: f64,
    pub acceleration_base: f64,
    pub acceleration_multiplier: f64,
    pub precision_divisor: f64,
}

impl Default for MotionSection {
    fn default() -> Self {
        let tuning = MotionTuning::default();
        Self {
            tick_interval_ms: tuning.tick_interval.as_millis() as u64,
            initial_step: tuning.cursor.initial_step,
            max_step: tuning.cursor.max_step,
            acceleration_base: tuning.cursor.base,
            acceleration_multiplier: tuning.cursor.multiplier,
            precision_divisor: tuning.precision_divisor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScrollSection {
    pub initial_step: f64,
    pub max_step: f64,
    pub acceleration_base: f64,
    pub acceleration_multiplier: f64,
}

impl Default for ScrollSection {
    fn default() -> Self {
        let curve = MotionTuning::default().scroll;
        Self {
            initial_step: curve.initial_step,
            max_step: curve.max_step,
            acceleration_base: curve.base,
            acceleration_multiplier: curve.multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RuntimeSection {
    pub capability_poll_ms: u64,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            capability_poll_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingEntry {
    pub key: String,
    pub action: String,
}

/// On-disk configuration, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConfigFile {
    pub toggle: String,
    pub replace_default_bindings: bool,
    pub motion: MotionSection,
    pub scroll: ScrollSection,
    pub runtime: RuntimeSection,
    pub bindings: Vec<BindingEntry>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            toggle: DEFAULT_TOGGLE.to_string(),
            replace_default_bindings: false,
            motion: MotionSection::default(),
            scroll: ScrollSection::default(),
            runtime: RuntimeSection::default(),
            bindings: Vec::new(),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub snapshot: BindingSnapshot,
    pub capability_poll: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        // The built-in configuration always validates.
        match ConfigFile::default().resolve() {
            Ok(settings) => settings,
            Err(err) => unreachable!("built-in configuration is invalid: {err}"),
        }
    }
}

impl Settings {
    /// Render the effective configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        let tuning = self.snapshot.tuning();
        let file = ConfigFile {
            toggle: self.snapshot.toggle().to_string(),
            replace_default_bindings: true,
            motion: MotionSection {
                tick_interval_ms: tuning.tick_interval.as_millis() as u64,
                initial_step: tuning.cursor.initial_step,
                max_step: tuning.cursor.max_step,
                acceleration_base: tuning.cursor.base,
                acceleration_multiplier: tuning.cursor.multiplier,
                precision_divisor: tuning.precision_divisor,
            },
            scroll: ScrollSection {
                initial_step: tuning.scroll.initial_step,
                max_step: tuning.scroll.max_step,
                acceleration_base: tuning.scroll.base,
                acceleration_multiplier: tuning.scroll.multiplier,
            },
            runtime: RuntimeSection {
                capability_poll_ms: self.capability_poll.as_millis() as u64,
            },
            bindings: self
                .snapshot
                .bindings()
                .iter()
                .map(|b| BindingEntry {
                    key: b.chord.to_string(),
                    action: b.action.to_string(),
                })
                .collect(),
        };
        toml::to_string_pretty(&file)
            .map_err(|e| Error::ConfigInvalid(format!("failed to render config: {e}")))
    }
}

fn check_curve(name: &str, curve: &Curve, errors: &mut Vec<String>) {
    if !(curve.initial_step.is_finite() && curve.initial_step > 0.0) {
        errors.push(format!("{name}.initial_step must be a positive number"));
    }
    if !curve.max_step.is_finite() || curve.max_step < curve.initial_step {
        errors.push(format!("{name}.max_step must be at least initial_step"));
    }
    if !(curve.base.is_finite() && curve.base >= 1.0) {
        errors.push(format!("{name}.acceleration_base must be >= 1.0"));
    }
    if !(curve.multiplier.is_finite() && curve.multiplier >= 0.0) {
        errors.push(format!("{name}.acceleration_multiplier must be >= 0.0"));
    }
}

fn parse_binding(key: &str, action: &str) -> std::result::Result<Binding, String> {
    let chord: Chord = key.parse()?;
    let action: NavigationAction = action.parse()?;
    if action == NavigationAction::ToggleMode {
        return Err(format!(
            "'{key}': the toggle is set with the top-level 'toggle' key"
        ));
    }
    Ok(Binding::new(chord, action))
}

impl ConfigFile {
    /// Validate and build the runtime settings.
    pub fn resolve(&self) -> Result<Settings> {
        let mut errors = Vec::new();

        let toggle = match self.toggle.parse::<Chord>() {
            Ok(chord) => Some(chord),
            Err(e) => {
                errors.push(format!("toggle: {e}"));
                None
            }
        };

        let tuning = MotionTuning {
            tick_interval: Duration::from_millis(self.motion.tick_interval_ms),
            cursor: Curve {
                initial_step: self.motion.initial_step,
                max_step: self.motion.max_step,
                base: self.motion.acceleration_base,
                multiplier: self.motion.acceleration_multiplier,
            },
            scroll: Curve {
                initial_step: self.scroll.initial_step,
                max_step: self.scroll.max_step,
                base: self.scroll.acceleration_base,
                multiplier: self.scroll.acceleration_multiplier,
            },
            precision_divisor: self.motion.precision_divisor,
        };
        if self.motion.tick_interval_ms == 0 || self.motion.tick_interval_ms > MAX_TICK_INTERVAL_MS {
            errors.push(format!(
                "motion.tick_interval_ms must be between 1 and {MAX_TICK_INTERVAL_MS}"
            ));
        }
        check_curve("motion", &tuning.cursor, &mut errors);
        check_curve("scroll", &tuning.scroll, &mut errors);
        if !(tuning.precision_divisor.is_finite() && tuning.precision_divisor >= 1.0) {
            errors.push("motion.precision_divisor must be >= 1.0".to_string());
        }
        if self.runtime.capability_poll_ms == 0 {
            errors.push("runtime.capability_poll_ms must be positive".to_string());
        }

        if self.bindings.len() > MAX_BINDINGS {
            errors.push(format!(
                "too many bindings ({}, max {MAX_BINDINGS})",
                self.bindings.len()
            ));
        }
        let mut user = Vec::with_capacity(self.bindings.len());
        let mut seen = HashSet::new();
        for entry in &self.bindings {
            match parse_binding(&entry.key, &entry.action) {
                Ok(binding) if !seen.insert(binding.chord) => {
                    errors.push(format!("duplicate binding for '{}'", binding.chord));
                }
                Ok(binding) => user.push(binding),
                Err(e) => errors.push(format!("binding '{}': {e}", entry.key)),
            }
        }

        let mut bindings = Vec::new();
        if !self.replace_default_bindings {
            for (key, action) in DEFAULT_BINDINGS {
                let binding = parse_binding(key, action).map_err(Error::ConfigInvalid)?;
                if !seen.contains(&binding.chord) {
                    bindings.push(binding);
                }
            }
        }
        bindings.extend(user);

        let Some(toggle) = toggle.filter(|_| errors.is_empty()) else {
            return Err(Error::ConfigInvalid(errors.join("; ")));
        };

        for binding in bindings.iter().filter(|b| b.chord == toggle) {
            log::warn!(
                "binding '{}' -> {} is shadowed by the toggle",
                binding.chord,
                binding.action
            );
        }

        Ok(Settings {
            snapshot: BindingSnapshot::new(toggle, bindings, tuning),
            capability_poll: Duration::from_millis(self.runtime.capability_poll_ms),
        })
    }
}

/// Parse and validate configuration text.
pub fn parse_config(text: &str) -> Result<Settings> {
    let file: ConfigFile =
        toml::from_str(text).map_err(|e| Error::ConfigInvalid(e.to_string()))?;
    file.resolve()
}

/// Supplies validated binding snapshots.
pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<BindingSnapshot>;
}

/// Default config location: `<config dir>/vimnav/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "vimnav")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

/// Reads configuration from a TOML file.
#[derive(Debug, Clone)]
pub struct TomlConfigProvider {
    explicit: Option<PathBuf>,
}

impl TomlConfigProvider {
    /// Use `path` if given, otherwise the platform default location.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { explicit: path }
    }

    /// The file this provider reads, if any location is known.
    pub fn path(&self) -> Option<PathBuf> {
        self.explicit.clone().or_else(default_config_path)
    }

    /// Load and validate the full settings.
    ///
    /// A missing default file yields the built-in configuration; a missing
    /// explicitly requested file is an error.
    pub fn load_settings(&self) -> Result<Settings> {
        let Some(path) = self.path() else {
            log::debug!("no config directory available; using built-in configuration");
            return Ok(Settings::default());
        };
        if self.explicit.is_none() && !path.exists() {
            log::debug!("{} not found; using built-in configuration", path.display());
            return Ok(Settings::default());
        }
        let text = read_config_file(&path)?;
        parse_config(&text).map_err(|e| match e {
            Error::ConfigInvalid(msg) => Error::ConfigInvalid(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Watch the config file and call `on_change` with every reload result.
    pub fn watch<F>(&self, on_change: F) -> Result<ConfigWatcher>
    where
        F: Fn(Result<Settings>) + Send + 'static,
    {
        let path = self
            .path()
            .ok_or_else(|| Error::NotSupported("no config location to watch".into()))?;
        ConfigWatcher::new(path, self.clone(), on_change)
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn load(&self) -> Result<BindingSnapshot> {
        self.load_settings().map(|settings| settings.snapshot)
    }
}

fn read_config_file(path: &Path) -> Result<String> {
    let io_err = |source| Error::ConfigIo {
        path: path.to_path_buf(),
        source,
    };
    let meta = std::fs::metadata(path).map_err(io_err)?;
    if meta.len() > MAX_CONFIG_FILE_BYTES {
        return Err(Error::ConfigInvalid(format!(
            "refusing to read {}: file too large ({} bytes, max {MAX_CONFIG_FILE_BYTES})",
            path.display(),
            meta.len()
        )));
    }
    std::fs::read_to_string(path).map_err(io_err)
}

fn is_relevant(event: &Event, file_name: &std::ffi::OsStr) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name))
}

/// Live reload of the config file.
///
/// The parent directory is watched rather than the file itself, because
/// editors commonly save by writing a new file and renaming it over the old
/// one.
pub struct ConfigWatcher {
    watcher: Option<RecommendedWatcher>,
    thread: Option<JoinHandle<()>>,
}

impl ConfigWatcher {
    fn new<F>(path: PathBuf, provider: TomlConfigProvider, on_change: F) -> Result<Self>
    where
        F: Fn(Result<Settings>) + Send + 'static,
    {
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| Error::ConfigInvalid(format!("{} is not a file", path.display())))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| Error::Platform(format!("failed to create file watcher: {e}")))?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Platform(format!("failed to watch {}: {e}", dir.display())))?;

        let thread = std::thread::Builder::new()
            .name("vimnav-config".into())
            .spawn(move || reload_loop(rx, &file_name, &provider, on_change))
            .map_err(|e| Error::ThreadError(format!("failed to spawn config watcher: {e}")))?;

        log::info!("watching {} for changes", path.display());
        Ok(Self {
            watcher: Some(watcher),
            thread: Some(thread),
        })
    }

    /// Stop watching and join the reload thread.
    pub fn stop(&mut self) -> Result<()> {
        // Dropping the watcher drops its sender, which ends the loop.
        self.watcher.take();
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| Error::ThreadError("failed to join config watcher".into()))?;
        }
        Ok(())
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn reload_loop<F>(
    rx: Receiver<notify::Result<Event>>,
    file_name: &std::ffi::OsStr,
    provider: &TomlConfigProvider,
    on_change: F,
) where
    F: Fn(Result<Settings>),
{
    while let Ok(res) = rx.recv() {
        match res {
            Ok(event) if is_relevant(&event, file_name) => {}
            Ok(_) => continue,
            Err(e) => {
                log::warn!("file watcher error: {e}");
                continue;
            }
        }
        // Editors emit bursts of events per save; settle first.
        loop {
            match rx.recv_timeout(RELOAD_DEBOUNCE) {
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
        log::debug!("config file changed; reloading");
        on_change(provider.load_settings());
    }
}
