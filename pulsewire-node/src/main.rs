use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info};

use pulsewire_node::config::NodeConfig;
use pulsewire_node::error::NodeError;
use pulsewire_node::grid::SampleGrid;
use pulsewire_node::net::{AdminListener, Egress};
use pulsewire_node::source::{SampleSource, StdinReplay, SyntheticPulse};
use pulsewire_node::watchdog::Watchdog;
use pulsewire_wire::PpgBundle;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--version") {
        println!("pulsewire-node {VERSION}");
        return;
    }
    if args.iter().any(|a| a == "--help") {
        print_help();
        return;
    }

    let config = match NodeConfig::load(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config.log_level);

    match run(config) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!("fatal: {e}");
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        "pulsewire-node {VERSION}\n\n\
         USAGE:\n    pulsewire-node [OPTIONS]\n\n\
         OPTIONS:\n\
         \x20   --config <path>          Path to pulsewire-node.toml (default ./pulsewire-node.toml)\n\
         \x20   --sensor-id <id>         Sensor id, 0..N_MAX\n\
         \x20   --server <host:port>     Processor's ingress address\n\
         \x20   --sample-source <name>   synthetic|stdin\n\
         \x20   --log-level <level>      error|warn|info|debug|trace\n\
         \x20   --version                Print version and exit\n\
         \x20   --help                   Print this message and exit"
    );
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(config: NodeConfig) -> Result<(), NodeError> {
    let egress = Egress::connect(&config.server_addr())?;
    info!("egress connected to {}", config.server_addr());

    let admin = AdminListener::bind(config.admin_port)?;
    info!("admin listening on port {}", config.admin_port);

    let mut source: Box<dyn SampleSource> = match config.sample_source.as_str() {
        "stdin" => Box::new(StdinReplay::new()),
        _ => Box::new(SyntheticPulse::new(config.sample_rate_hz, 75.0, 800.0)),
    };

    let running = Arc::new(AtomicBool::new(true));
    let shutdown_running = running.clone();
    ctrlc_handler(move || {
        info!("shutdown requested");
        shutdown_running.store(false, Ordering::SeqCst);
    });

    let watchdog = Watchdog::new();
    let watchdog_running = running.clone();
    let watchdog_handle = watchdog.spawn(config.watchdog_timeout_ms, watchdog_running, || {
        // The node has no external supervisor to restart it, so a stall
        // is treated as fatal: exit non-zero and let the platform
        // (systemd, a container runtime, the demo harness) restart us.
        std::process::exit(1);
    });

    let sample_interval_ms = 1000 / config.sample_rate_hz as i64;
    let mut grid = SampleGrid::new(sample_interval_ms);
    let mut pending = Vec::with_capacity(config.bundle_size);

    while let Some((n, timestamp_ms)) = grid.next_tick(&running) {
        watchdog.pet();

        if admin.poll_restart() {
            // Same posture as the watchdog-stall handler above: this node
            // has no internal supervisor to reboot into, so "reboot" means
            // exit and let the platform (systemd, a container runtime, the
            // demo harness) start a fresh process.
            info!("restart command received, exiting for platform restart");
            std::process::exit(0);
        }

        let raw = source.read();
        pending.push((n, timestamp_ms, raw));

        if pending.len() == config.bundle_size {
            let first_timestamp_ms = pending[0].1;
            let samples: Vec<u16> = pending.iter().map(|&(_, _, raw)| raw).collect();
            let bundle = PpgBundle::new(config.sensor_id, first_timestamp_ms, samples);
            egress.send(&bundle);
            pending.clear();
        }
    }

    running.store(false, Ordering::SeqCst);
    let _ = watchdog_handle.join();
    info!("node shut down cleanly");
    Ok(())
}

#[cfg(unix)]
fn ctrlc_handler(on_signal: impl Fn() + Send + Sync + 'static) {
    use std::sync::OnceLock;
    static HANDLER: OnceLock<Box<dyn Fn() + Send + Sync>> = OnceLock::new();
    let _ = HANDLER.set(Box::new(on_signal));

    extern "C" fn handle(_: libc::c_int) {
        if let Some(handler) = HANDLER.get() {
            handler();
        }
    }

    unsafe {
        libc::signal(libc::SIGINT, handle as usize);
    }
}

#[cfg(not(unix))]
fn ctrlc_handler(on_signal: impl Fn() + Send + 'static) {
    let _ = on_signal;
}
