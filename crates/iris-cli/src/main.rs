//! `iris-gate` – gate arm server with an operator console.
//!
//! 1. Loads `~/.iris/gate.toml`, writing the defaults on first run.
//! 2. Opens the SQLite store and rebuilds every arm and array.
//! 3. Starts the dependency sweep, a simulated controller field fed by the
//!    hardware command channel, and the inbound hardware-event loop.
//! 4. Drops the operator into the console.
//! 5. Ctrl-C disables the gate arm system before exiting.
//!
//! The system always starts disabled; use `/enable` after checking the arms.

mod config;
mod repl;

use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use iris_hal::{ChannelPoller, HardwareEvent, SimField};
use iris_kernel::{GateArmSystem, OriginGuard};
use iris_middleware::{BusNotifier, EventBus, Topic};
use iris_runtime::driver::{run_hardware_events, run_sweep};
use iris_runtime::{GateArmRegistry, Services, StaticPlans};
use iris_store::SqliteStore;
use iris_types::EventPayload;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::config::Config;

fn main() {
    let _otel = iris_runtime::init_tracing("iris-gate");
    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  Default config written to {}",
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => warn!(error = %e, "default config not saved"),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            Config::default()
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "tokio runtime failed to start");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(serve(cfg)) {
        println!("{}: {}", "Fatal".red().bold(), e);
        std::process::exit(1);
    }
}

async fn serve(cfg: Config) -> Result<(), String> {
    let store = Arc::new(open_store(&cfg.db_path)?);
    let arms = store.load_arms().map_err(|e| e.to_string())?;
    let arrays = store.load_arrays().map_err(|e| e.to_string())?;

    let bus = EventBus::new(256);
    let notifier = Arc::new(BusNotifier::new(bus.clone()));
    let system = Arc::new(GateArmSystem::new(cfg.enable_file.clone(), notifier.clone()));
    let (poller, mut commands) = ChannelPoller::new();
    let origins = OriginGuard::from_blocks(&cfg.allowed_origins).map_err(|e| e.to_string())?;

    let svc = Services {
        store: store.clone(),
        poller: Arc::new(poller),
        publisher: notifier,
        plans: Arc::new(StaticPlans::new()),
        system,
    };
    // The simulated field starts where the arms were left.
    let mut field = SimField::new();
    for arm in &arms {
        field.add_arm(arm.name.clone(), arm.arm_state);
    }

    let registry = Arc::new(GateArmRegistry::new(svc, origins, cfg.comm_fail_timeout()));
    registry.load(arms, arrays);
    println!(
        "  {} arm(s), {} array(s) loaded from {}",
        registry.arms().len(),
        registry.arrays().len(),
        cfg.db_path.display().to_string().bold()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    // Simulated controllers report once at startup, then answer commands.
    let (events_tx, events_rx) = mpsc::unbounded_channel::<HardwareEvent>();
    for arm in registry.arms() {
        if let Some(state) = field.state(&arm.name) {
            let _ = events_tx.send(HardwareEvent::ArmState {
                arm: arm.name,
                state,
                fault: None,
            });
        }
    }
    let field_task = tokio::spawn(async move {
        while let Some(cmd) = commands.recv().await {
            if cmd.is_movement() {
                info!(arm = cmd.arm_name(), "simulated arm moving");
            }
            for ev in field.apply(&cmd) {
                if events_tx.send(ev).is_err() {
                    return;
                }
            }
        }
    });

    let events_task = tokio::spawn(run_hardware_events(
        registry.clone(),
        events_rx,
        shutdown_rx.clone(),
    ));
    let sweep_task = tokio::spawn(run_sweep(
        registry.clone(),
        cfg.sweep_period(),
        shutdown_rx.clone(),
    ));

    let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
    let mut alert_stop = shutdown_rx.clone();
    let alert_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                ev = alerts.recv() => match ev {
                    Ok(ev) => {
                        if let EventPayload::Alert { message } = ev.payload {
                            println!("\n  {} {}", "ALERT".red().bold(), message.red());
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "alerts dropped");
                    }
                    Err(_) => break,
                },
                _ = alert_stop.changed() => break,
            }
        }
    });

    {
        let registry = registry.clone();
        let shutdown_tx = shutdown_tx.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!();
            println!("{}", "⚠  Ctrl-C received – disabling gate arm system …".yellow().bold());
            registry.disable_system("console", "operator Ctrl-C");
            let _ = shutdown_tx.send(true);
            std::process::exit(130);
        }) {
            warn!(error = %e, "Ctrl-C handler not installed");
        }
    }

    println!(
        "  Gate arm system is {}. Type {} for a list of commands.\n",
        "DISABLED".red().bold(),
        "/help".bold().cyan()
    );

    let console_registry = registry.clone();
    let console_store = store.clone();
    let console_stop = shutdown_rx.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || {
        repl::run(console_registry, console_store, console_stop)
    })
    .await
    {
        error!(error = %e, "console task failed");
    }

    registry.disable_system("console", "shutdown");
    let _ = shutdown_tx.send(true);
    let _ = sweep_task.await;
    let _ = alert_task.await;
    if let Ok(handled) = events_task.await {
        info!(handled, "hardware events processed");
    }
    field_task.abort();
    println!("{}", "  ✓ Gate arm system disabled. Exiting.".green());
    Ok(())
}

fn open_store(path: &Path) -> Result<SqliteStore, String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    let path = path
        .to_str()
        .ok_or_else(|| format!("database path is not UTF-8: {}", path.display()))?;
    SqliteStore::open(path).map_err(|e| e.to_string())
}

fn print_banner() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║         IRIS Gate Arm Server         ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!(
        "  {}",
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!();
}
