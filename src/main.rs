//! vimnav: drive the mouse pointer with vim keys.
//!
//! Usage:
//!   vimnav [--config PATH] [--watch]
//!   vimnav --print-config
//!   vimnav --check
//!
//! Press the toggle key (Escape by default) to enter navigation mode and
//! again to leave it. Press Ctrl+C to exit.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use vimnav::{
    BindingSnapshot, Error, NativeBackend, Navigator, Settings, StatusEvent, TomlConfigProvider,
};

#[derive(Debug, Parser)]
#[command(name = "vimnav", version, about = "Drive the mouse pointer with vim keys")]
struct Args {
    /// Configuration file (default: the platform config directory)
    #[arg(short, long, env = "VIMNAV_CONFIG")]
    config: Option<PathBuf>,

    /// Reload the configuration when the file changes
    #[arg(short, long)]
    watch: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long, conflicts_with = "check")]
    print_config: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

fn permission_hint() -> &'static str {
    if cfg!(target_os = "macos") {
        "grant Accessibility access in System Settings > Privacy & Security > Accessibility, \
         then restart vimnav"
    } else if cfg!(target_os = "linux") {
        "add your user to the 'input' group (sudo usermod -aG input $USER), make /dev/uinput \
         writable for it, then log in again"
    } else {
        "input hooks are blocked for this session; try running from a normal desktop session"
    }
}

fn print_controls(snapshot: &BindingSnapshot) {
    println!("vimnav");
    println!("======\n");
    println!("  {:<14} toggle navigation mode", snapshot.toggle().to_string());
    for binding in snapshot.bindings() {
        println!("  {:<14} {}", binding.chord.to_string(), binding.action);
    }
    println!("\nPress Ctrl+C to exit.\n");
}

/// Load the startup configuration.
///
/// When watching, an invalid file is reported and navigation stays off
/// until the watcher delivers a valid one.
fn initial_settings(provider: &TomlConfigProvider, watch: bool) -> vimnav::Result<Option<Settings>> {
    match provider.load_settings() {
        Ok(settings) => Ok(Some(settings)),
        Err(e @ Error::ConfigInvalid(_)) if watch => {
            log::error!("{e}");
            log::warn!("navigation mode is unavailable until the configuration is fixed");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn run(args: Args) -> vimnav::Result<()> {
    let provider = TomlConfigProvider::new(args.config);
    if let Some(path) = provider.path() {
        log::debug!("configuration file: {}", path.display());
    }

    if args.check {
        provider.load_settings()?;
        println!("configuration ok");
        return Ok(());
    }
    if args.print_config {
        print!("{}", provider.load_settings()?.to_toml()?);
        return Ok(());
    }

    let settings = initial_settings(&provider, args.watch)?;
    if let Some(settings) = &settings {
        print_controls(&settings.snapshot);
    }
    match vimnav::displays() {
        Ok(displays) => {
            for d in displays {
                log::debug!(
                    "display {}: {}x{} at ({}, {}){}",
                    d.id,
                    d.bounds.width,
                    d.bounds.height,
                    d.bounds.x,
                    d.bounds.y,
                    if d.is_primary { " primary" } else { "" }
                );
            }
        }
        Err(e) => log::debug!("display layout unavailable: {e}"),
    }

    let status = |event: StatusEvent| log::info!("{event}");
    let navigator = Arc::new(Navigator::with_status(
        Arc::new(NativeBackend::new()),
        settings,
        Arc::new(status),
    ));

    let n = navigator.clone();
    ctrlc::set_handler(move || {
        log::info!("stopping");
        if let Err(e) = n.stop() {
            log::debug!("stop: {e}");
        }
    })
    .map_err(|e| Error::Platform(format!("failed to set Ctrl-C handler: {e}")))?;

    let _watcher = if args.watch {
        let n = navigator.clone();
        let watcher = provider.watch(move |settings: vimnav::Result<Settings>| n.reload(settings))?;
        log::info!("watching configuration for changes");
        Some(watcher)
    } else {
        None
    };

    navigator.run()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if e.is_capability() {
                eprintln!("hint: {}", permission_hint());
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_for(text: &str) -> (tempfile::TempDir, TomlConfigProvider) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, text).unwrap();
        (dir, TomlConfigProvider::new(Some(path)))
    }

    #[test]
    fn test_invalid_config_keeps_running_when_watching() {
        let (_dir, provider) = provider_for("toggle = \"bogus\"\n");
        assert!(matches!(initial_settings(&provider, true), Ok(None)));
        assert!(matches!(
            initial_settings(&provider, false),
            Err(Error::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_initial_settings_valid_and_missing() {
        let (_dir, provider) = provider_for("toggle = \"f12\"\n");
        let settings = initial_settings(&provider, true).unwrap().unwrap();
        assert_eq!(settings.snapshot.toggle().key, vimnav::Key::F12);

        let missing = TomlConfigProvider::new(Some("/nonexistent/vimnav.toml".into()));
        assert!(matches!(
            initial_settings(&missing, true),
            Err(Error::ConfigIo { .. })
        ));
    }
}
