use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use log::{error, info};

use pulsewire_processor::config::ProcessorConfig;
use pulsewire_processor::detector::DetectorParams;
use pulsewire_processor::error::ProcessorError;
use pulsewire_processor::fanout::FanoutSocket;
use pulsewire_processor::ingress::Ingress;
use pulsewire_processor::predictor::{spawn_emitter, BeatPredictor};
use pulsewire_processor::supervision;
use pulsewire_processor::stats::Stats;
use pulsewire_wire::N_MAX;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--version") {
        println!("pulsewire-processor {VERSION}");
        return;
    }
    if args.iter().any(|a| a == "--help") {
        print_help();
        return;
    }

    let config = match ProcessorConfig::load(&args) {
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
        "pulsewire-processor {VERSION}\n\n\
         USAGE:\n    pulsewire-processor [OPTIONS]\n\n\
         OPTIONS:\n\
         \x20   --config <path>           Path to pulsewire.toml (default ./pulsewire.toml)\n\
         \x20   --input-port <port>       UDP port for incoming PPG bundles\n\
         \x20   --beats-port <port>       UDP port for outgoing beat events\n\
         \x20   --stale-timeout-ms <ms>   Stale-sensor timeout\n\
         \x20   --no-predictor            Disable the phase-locked beat emitter\n\
         \x20   --log-level <level>       error|warn|info|debug|trace\n\
         \x20   --version                 Print version and exit\n\
         \x20   --help                    Print this message and exit"
    );
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(config: ProcessorConfig) -> Result<(), ProcessorError> {
    let input_addr = format!("0.0.0.0:{}", config.input_port);
    let ingress_socket = UdpSocket::bind(&input_addr).map_err(|source| ProcessorError::IngressBind {
        addr: input_addr.clone(),
        source,
    })?;
    ingress_socket
        .set_read_timeout(Some(Duration::from_millis(100)))
        .expect("setting a read timeout never fails on a freshly bound socket");
    info!("ingress bound on {input_addr}");

    let fanout = FanoutSocket::bind(config.beats_port).map_err(|source| ProcessorError::FanoutBind {
        addr: format!("0.0.0.0:{}", config.beats_port),
        source,
    })?;
    info!("fan-out publishing on port {}", config.beats_port);

    let stats = Arc::new(Stats::new());
    let running = Arc::new(AtomicBool::new(true));

    let predictors: [Option<Arc<BeatPredictor>>; N_MAX as usize] = if config.predictor_enabled {
        std::array::from_fn(|_| Some(Arc::new(BeatPredictor::new(config.predictor_confidence_threshold))))
    } else {
        std::array::from_fn(|_| None)
    };

    let mut emitter_handles = Vec::new();
    if config.predictor_enabled {
        for (id, predictor) in predictors.iter().enumerate() {
            let predictor = predictor.clone().expect("predictor present when enabled");
            let sensor_fanout = fanout.try_clone().map_err(|source| ProcessorError::FanoutBind {
                addr: format!("0.0.0.0:{}", config.beats_port),
                source,
            })?;
            emitter_handles.push(spawn_emitter(id as u8, predictor, sensor_fanout, running.clone()));
        }
    }

    let (stale_tx, stale_rx) = mpsc::channel();
    let supervision_handle = supervision::spawn(stats.clone(), config.stale_timeout_ms, stale_tx, running.clone());

    let detector_params = DetectorParams::from(&config);
    let sample_interval_ms = 1000 / config.sample_rate_hz as i64;
    let ingress = Ingress::new(
        ingress_socket,
        config.bundle_size,
        sample_interval_ms,
        detector_params,
        predictors,
        config.predictor_enabled,
        fanout,
        stats.clone(),
        stale_rx,
    );

    let shutdown_running = running.clone();
    ctrlc_handler(move || {
        info!("shutdown requested");
        shutdown_running.store(false, Ordering::SeqCst);
    });

    ingress.run(running.clone());

    for handle in emitter_handles {
        let _ = handle.join();
    }
    let _ = supervision_handle.join();
    info!("processor shut down cleanly");
    Ok(())
}

/// Installs a `SIGINT`/console `Ctrl+C` handler. Hand-rolled to match this
/// workspace's posture of reaching for manual signal handling rather than
/// a dedicated crate (see `NodeError`'s sibling watchdog for the same
/// approach on the sensor-node side).
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
    // Best-effort only off Unix; process exit still works via Ctrl+C's
    // default console handling, it just won't drain the in-flight state.
    let _ = on_signal;
}
