// keyflux CLI: config loading, device wiring, and the main event loop.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use keyflux_core::window::NullProvider;
use keyflux_core::{
    select_provider, Config, ConfigError, DesktopEnv, DeviceError, DeviceSource, Engine, Flow,
    SessionType, VirtualKeyboard,
};

/// Idle poll ceiling; keeps the loop responsive to signals and hotplug.
const MAX_POLL_MS: i32 = 100;

#[derive(Parser, Debug)]
#[command(name = "keyflux")]
#[command(version)]
#[command(about = "Low-level keyboard remapper for Linux", long_about = None)]
struct Args {
    /// Configuration file (default: ~/.config/keyflux/config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Device paths or names to remap (repeatable; overrides config)
    #[arg(short, long, value_name = "DEVICE")]
    devices: Vec<String>,

    /// Watch for hotplugged devices
    #[arg(short, long)]
    watch: bool,

    /// List detected keyboard devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

enum AppError {
    /// Configuration problems: exit code 2.
    Config(ConfigError),
    /// Unrecoverable I/O: exit code 1.
    Fatal(anyhow::Error),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::Config(e)) => {
            eprintln!("configuration error: {e}");
            ExitCode::from(2)
        }
        Err(AppError::Fatal(e)) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<(), AppError> {
    if args.list_devices {
        return list_devices();
    }

    let config_path = args
        .config
        .clone()
        .or_else(Config::default_path)
        .ok_or_else(|| AppError::Fatal(anyhow::anyhow!("cannot determine config path")))?;
    let config = Config::from_path(&config_path)?;
    log::info!("loaded config from {}", config_path.display());

    if args.check {
        println!(
            "configuration OK: {} modmap(s), {} multipurpose map(s), {} keymap(s)",
            config.rules.modmaps.len(),
            config.rules.multipurpose.len(),
            config.rules.keymaps.len()
        );
        return Ok(());
    }

    let provider = build_provider(&config);
    let filter = if args.devices.is_empty() {
        config.rules.device_filter.clone()
    } else {
        args.devices.clone()
    };

    let mut source = DeviceSource::open(&filter, args.watch)
        .map_err(|e| AppError::Fatal(anyhow::Error::new(e).context("opening input devices")))?;
    log::info!(
        "grabbed {} device(s): {}",
        source.device_count(),
        source.device_names().join(", ")
    );

    let mut sink = VirtualKeyboard::new()
        .map_err(|e| AppError::Fatal(anyhow::Error::new(e).context("creating uinput device")))?;
    let mut engine = Engine::new(config.rules).with_provider(provider);

    let stop = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, stop.clone())
            .map(|_| ())
            .map_err(|e| AppError::Fatal(anyhow::Error::new(e).context("installing signal handler")))?;
    }

    let result = event_loop(&stop, &mut source, &mut engine, &mut sink);

    // Orderly teardown on every path: no key stays pressed, no device
    // stays grabbed.
    if let Err(e) = engine.shutdown(&mut sink) {
        log::error!("releasing output keys failed: {e}");
    }
    source.ungrab_all();

    result
}

fn event_loop(
    stop: &AtomicBool,
    source: &mut DeviceSource,
    engine: &mut Engine,
    sink: &mut VirtualKeyboard,
) -> Result<(), AppError> {
    log::info!("keyflux running");

    while !stop.load(Ordering::SeqCst) {
        let timeout = poll_timeout(engine.next_deadline());
        let events = match source.poll(timeout) {
            Ok(events) => events,
            Err(DeviceError::NoDevices) => {
                return Err(AppError::Fatal(anyhow::anyhow!(
                    "all input devices are gone"
                )));
            }
            Err(e) => {
                return Err(AppError::Fatal(
                    anyhow::Error::new(e).context("reading input events"),
                ));
            }
        };

        if events.is_empty() {
            engine
                .tick(Instant::now(), sink)
                .map_err(|e| AppError::Fatal(anyhow::Error::new(e).context("emitting output")))?;
            continue;
        }

        for ev in events {
            log::debug!("in: {} {} ({})", ev.key, ev.action, ev.device);
            let flow = engine
                .handle(&ev, sink)
                .map_err(|e| AppError::Fatal(anyhow::Error::new(e).context("emitting output")))?;
            if flow == Flow::Eject {
                log::warn!("emergency eject, exiting");
                return Ok(());
            }
        }
    }

    log::info!("signal received, shutting down");
    Ok(())
}

fn poll_timeout(deadline: Option<Instant>) -> i32 {
    let Some(deadline) = deadline else {
        return MAX_POLL_MS;
    };
    let until = deadline
        .saturating_duration_since(Instant::now())
        .as_millis()
        .min(MAX_POLL_MS as u128) as i32;
    until.max(1)
}

fn build_provider(config: &Config) -> Box<dyn keyflux_core::ContextProvider> {
    let session = config.session_type.or_else(SessionType::detect);
    let Some(session) = session else {
        log::warn!("cannot determine session type; window-scoped rules will not match");
        return Box::new(NullProvider::new());
    };
    let desktop = config.desktop.unwrap_or_else(DesktopEnv::detect);
    let provider = select_provider(session, desktop);
    log::info!("window context provider: {} ({session})", provider.name());
    provider
}

fn list_devices() -> Result<(), AppError> {
    let devices = DeviceSource::list_devices();
    if devices.is_empty() {
        return Err(AppError::Fatal(anyhow::anyhow!(
            "no keyboard devices found"
        )));
    }
    println!("Found {} keyboard device(s):", devices.len());
    for (index, device) in devices.iter().enumerate() {
        println!("  {}: {} ({})", index, device.name, device.path);
    }
    Ok(())
}
