//! switch-hwsync agent entry point.
//!
//! Drives the synchronization engine against the simulated backend: bring-up
//! (cold or warm from a saved blob), a demo forwarding configuration,
//! verification read-back, and a graceful warm-restart exit.

use clap::Parser;
use hwsync_agent::{verify, HwSyncEngine, LearningUpdateObserver, SimPlatform, SimSwitch, SyncConfig};
use hwsync_hal::HwBackend;
use hwsync_state::{Route, SwitchState, Vlan};
use hwsync_types::{L2Entry, L2EntryUpdateType, PortId, RouterId, VlanId};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Switch hardware-state synchronization agent
#[derive(Parser, Debug)]
#[command(name = "hwagent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// ASIC generation to simulate: gen2 has the weight-aware ECMP read API
    #[arg(long, default_value = "gen2")]
    asic: String,

    /// Path of the warm-restart blob; read on start if present, written on
    /// graceful exit
    #[arg(long)]
    warm_boot_file: Option<PathBuf>,

    /// Tolerate partial state application by the backend
    #[arg(long)]
    allow_partial: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    info!("====================================================================");
    info!("Starting switch-hwsync agent");
    info!("====================================================================");

    let platform = match args.asic.as_str() {
        "gen1" => SimPlatform::legacy(),
        "gen2" => SimPlatform::extended(),
        other => {
            error!("unknown asic generation: {}", other);
            return ExitCode::FAILURE;
        }
    };

    let sim = match load_backend(platform, args.warm_boot_file.as_deref()) {
        Ok(sim) => Arc::new(sim),
        Err(e) => {
            error!("failed to construct backend: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = SyncConfig {
        allow_partial_application: args.allow_partial,
    };
    let engine = match HwSyncEngine::bring_up(Arc::clone(&sim) as Arc<dyn HwBackend>, config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("hardware bring-up failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("bring-up complete; {} routes programmed", sim.route_count());

    if let Err(e) = engine.apply_new_state(demo_state(&engine)) {
        error!("failed to apply demo configuration: {}", e);
        engine.tear_down();
        return ExitCode::FAILURE;
    }
    info!("demo configuration applied; {} routes programmed", sim.route_count());

    report_ecmp(sim.as_ref());
    demo_learning(&sim, &engine);

    match engine.graceful_exit() {
        Ok(blob) => {
            if let Some(path) = &args.warm_boot_file {
                if let Err(e) = std::fs::write(path, &blob) {
                    error!("failed to write warm-restart blob to {}: {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
                info!("warm-restart blob written to {}", path.display());
            }
        }
        Err(e) => {
            error!("graceful exit failed: {}", e);
            return ExitCode::FAILURE;
        }
    }

    info!("====================================================================");
    info!("switch-hwsync agent shutdown complete");
    info!("====================================================================");
    ExitCode::SUCCESS
}

fn load_backend(
    platform: SimPlatform,
    warm_boot_file: Option<&std::path::Path>,
) -> Result<SimSwitch, hwsync_hal::HwError> {
    if let Some(path) = warm_boot_file {
        if path.exists() {
            info!("warm boot: restoring from {}", path.display());
            let blob = std::fs::read(path)
                .map_err(|e| hwsync_hal::HwError::warm_restart(e.to_string()))?;
            return SimSwitch::from_warm_restart(platform, &blob);
        }
    }
    info!("cold boot: starting from empty hardware state");
    Ok(SimSwitch::new(platform))
}

/// A small but representative configuration: one VLAN, one single-path
/// route and one weighted ECMP route.
fn demo_state(engine: &HwSyncEngine) -> Arc<SwitchState> {
    let mut state = engine.programmed_state();
    SwitchState::modify_vlans(&mut state).add_vlan(Vlan::new(VlanId::new(100).unwrap()));
    let table = SwitchState::modify_route_tables(&mut state).table_mut_or_insert(RouterId::DEFAULT);
    table.add_route(Route::new(
        "10.1.0.0/16".parse().unwrap(),
        vec!["10.0.0.1".parse().unwrap()],
    ));
    table.add_route(Route::new(
        "10.2.0.0/16".parse().unwrap(),
        vec![
            "10.0.0.1".parse().unwrap(),
            "10.0.0.1".parse().unwrap(), // weight 2
            "10.0.0.2".parse().unwrap(),
        ],
    ));
    state
}

fn report_ecmp(hw: &dyn HwBackend) {
    let groups = verify::ecmp_groups_in_hw(hw);
    info!("{} ecmp group(s) programmed", groups.len());
    for group in groups {
        match verify::ecmp_group_in_hw(hw, group, 16) {
            Ok(members) => {
                let paths: usize = members.values().sum();
                info!("  {}: {} member(s), {} path(s)", group, members.len(), paths);
            }
            Err(e) => warn!("  {}: read-back failed: {}", group, e),
        }
    }
    match verify::egress_id_for_route(hw, "10.2.0.0".parse().unwrap(), 16, RouterId::DEFAULT) {
        Ok(egress) => info!("route 10.2.0.0/16 resolves to {}", egress),
        Err(e) => warn!("route lookup failed: {}", e),
    }
    // show the typed miss as well
    if let Err(e) =
        verify::egress_id_for_route(hw, "172.31.0.0".parse().unwrap(), 16, RouterId::DEFAULT)
    {
        info!("expected miss: {}", e);
    }
}

/// Demonstrates the event path: a learning event injected on a separate
/// thread flows through the bus into the observer and back into the
/// programmed state.
fn demo_learning(sim: &Arc<SimSwitch>, engine: &Arc<HwSyncEngine>) {
    let observer = LearningUpdateObserver::new(Arc::clone(engine));
    if let Err(e) = observer.start_observing() {
        warn!("could not register learning observer: {}", e);
        return;
    }

    let entry = L2Entry::new(
        "02:00:00:00:00:2a".parse().unwrap(),
        VlanId::new(100).unwrap(),
        PortId::new(2),
    );
    let sim_for_thread = Arc::clone(sim);
    let learner = std::thread::spawn(move || {
        sim_for_thread.inject_learning_event(entry, L2EntryUpdateType::Learned);
    });

    match observer.wait_for_learning_update_timeout(Duration::from_secs(1)) {
        Some((seen, _)) => info!("learned {}", seen),
        None => warn!("no learning event observed within budget"),
    }
    let _ = learner.join();
    if let Err(e) = observer.stop_observing() {
        warn!("could not unregister learning observer: {}", e);
    }
}
