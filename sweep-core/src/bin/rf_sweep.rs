//! Command-line sweep runner
//! 
//! Runs a session against the simulated receiver, logs progress and prints
//! the final status as JSON.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::{info, warn};
use rf_sweep::aggregate::EngineSettings;
use rf_sweep::session::{EventChannel, SessionEvent, SessionSettings};
use rf_sweep::storage::{export_history, ExportSettings};
use rf_sweep::{
    AggregationEngine, JsonStore, RecordFilter, RetryPolicy, RetryingReceiver, ScanConfig,
    SimulatedDevice, SweepSession,
};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

/// Sweeps shown in the offline average export
const HISTORY_AVERAGE: usize = 10;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Scanner configuration (TOML, created with defaults if missing)
    #[clap(short, long, default_value = "scan.toml")]
    config: PathBuf,
    /// Override the number of passes
    #[clap(short, long)]
    passes: Option<usize>,
    /// Aggregate in memory only, do not write scan records
    #[clap(long)]
    dry_run: bool,
    /// Simulated carrier frequency in Hz (repeatable)
    #[clap(long = "carrier")]
    carriers: Vec<f64>,
    /// Rebuild CSV exports from saved scans and exit
    #[clap(long)]
    export_history: bool,
    #[clap(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Progress(p) => info!(
            "Pass {}/{}: {:.3} MHz ({:.0}%)",
            p.pass,
            p.passes,
            p.freq_hz / 1e6,
            p.percent
        ),
        SessionEvent::PassComplete { pass, passes, views } => info!(
            "Pass {}/{} complete, {} sweeps averaged",
            pass, passes, views.sweeps_averaged
        ),
        SessionEvent::Fault(report) => warn!(
            "{:?} fault in pass {}: {}",
            report.kind, report.pass, report.message
        ),
        SessionEvent::Finished { state } => info!("Session finished: {:?}", state),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .parse_default_env()
        .init();
    
    let mut scan = ScanConfig::load(&args.config)?;
    if args.dry_run {
        scan.dry_run = true;
    }
    if let Some(passes) = args.passes {
        scan.num_passes = passes;
    }
    
    let bands = scan.load_bands()?;
    let config = scan.resolve(&bands)?;
    let store = JsonStore::new(&scan.log_directory)?;
    
    if args.export_history {
        let settings = if scan.dry_run {
            ExportSettings::dry_run(&scan.data_directory)
        } else {
            ExportSettings::new(&scan.data_directory)
        };
        let written = export_history(
            &store,
            &RecordFilter::all(),
            &settings,
            &scan.dbm_scale(),
            HISTORY_AVERAGE,
        )?;
        println!("{}", serde_json::to_string_pretty(&written)?);
        return Ok(());
    }
    
    let mut engine = AggregationEngine::new(
        Box::new(store),
        EngineSettings {
            averaging_window: config.averaging_window(),
            scale: scan.dbm_scale(),
            dry_run: scan.dry_run,
        },
    );
    engine.restore(&RecordFilter::all())?;
    
    let settings = SessionSettings::from_scan_config(&scan)?;
    let mut session =
        SweepSession::new(config.clone(), settings, engine).with_bands(scan.selected_band.clone(), &bands);
    
    let device = args
        .carriers
        .iter()
        .fold(SimulatedDevice::new(config.params().sample_rate), |device, &freq| {
            device.with_carrier(freq, 0.5)
        })
        .with_noise(0.01);
    let receiver = RetryingReceiver::new(device, RetryPolicy::default());
    
    let (producer, mut consumer) = EventChannel::default().split();
    session.start(receiver, Box::new(producer))?;
    
    while session.is_running() {
        consumer.drain().iter().for_each(log_event);
        std::thread::sleep(Duration::from_millis(100));
    }
    let summary = session.wait()?;
    consumer.drain().iter().for_each(log_event);
    
    if let Some(summary) = summary {
        info!(
            "{} passes completed, {} records saved, {} faults",
            summary.passes_completed,
            summary.records_persisted,
            summary.faults.len()
        );
    }
    println!("{}", serde_json::to_string_pretty(&session.status())?);
    Ok(())
}
