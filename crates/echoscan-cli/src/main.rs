//! `echoscan` – EchoScan command line entry point.
//!
//! 1. Installs logging and prints the banner.
//! 2. Loads `~/.echoscan/config.toml`, writing the defaults on first run.
//! 3. Starts the live viewer and the acquisition driver.
//! 4. Stops cleanly on Ctrl-C (a second Ctrl-C exits immediately) and prints
//!    a run summary.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use colored::Colorize;
use echoscan_cockpit::{CockpitServer, SnapshotChannel};
use echoscan_memory::{CsvRecorder, NullRecorder, Recorder, SqliteRecorder};
use echoscan_middleware::{SimulatedSource, TcpLineSource, TelemetrySource, WebSocketSource};
use echoscan_runtime::{DriverLoop, RunReport, StopReason};
use echoscan_types::ScanError;
use tokio::sync::watch;
use tracing::{error, info, warn};

use config::{Config, RecorderKind, Transport};

/// SQLite database name inside the recorder output directory.
const SQLITE_FILE: &str = "sensor_readings.db";

fn main() -> ExitCode {
    let _tracing = echoscan_runtime::init_tracing("echoscan");

    print_banner();

    let cfg = load_config();
    if let Err(e) = cfg.validate() {
        eprintln!("{}: {}", "Config error".red().bold(), e);
        return ExitCode::from(2);
    }

    // ── Shutdown signal ───────────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    let stopping = Arc::new(AtomicBool::new(false));
    let stopping_handler = stopping.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        if stopping_handler.swap(true, Ordering::SeqCst) {
            eprintln!("{}", "  Second Ctrl-C – exiting now.".red());
            std::process::exit(130);
        }
        println!();
        println!("{}", "⚠  Ctrl-C received – finishing up …".yellow().bold());
        let _ = stop_tx.send(true);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; stop the process with a signal instead");
    }

    // ── Runtime ───────────────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let report = match runtime.block_on(run(&cfg, stop_rx)) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}: {}", "Startup failed".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    print_report(&report);
    match report.ingest.stop {
        StopReason::Failed(_) => ExitCode::FAILURE,
        StopReason::Shutdown | StopReason::Exhausted(_) => ExitCode::SUCCESS,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline wiring
// ─────────────────────────────────────────────────────────────────────────────

async fn run(cfg: &Config, shutdown: watch::Receiver<bool>) -> Result<RunReport, ScanError> {
    let recorder = open_recorder(cfg)?;
    let source = build_source(cfg);

    let snapshots = SnapshotChannel::new();
    let server = CockpitServer::new(snapshots.subscribe())
        .with_port(cfg.cockpit_port)
        .with_refresh_interval(cfg.render_interval())
        .with_plot_bound(cfg.plot_bound_cm);
    let cockpit = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!(error = %e, "live viewer stopped");
        }
    });

    println!(
        "  Live view at {}",
        format!("http://localhost:{}", cfg.cockpit_port).bold().underline()
    );
    println!(
        "  Reading from {} ({})\n",
        source.describe().bold(),
        cfg.transport.to_string().dimmed()
    );
    info!(transport = %cfg.transport, source = %source.describe(), "starting acquisition");

    let driver = DriverLoop::new(cfg.driver_config(), recorder, snapshots);
    let report = driver.run(source, shutdown).await;

    cockpit.abort();
    Ok(report)
}

fn build_source(cfg: &Config) -> Box<dyn TelemetrySource> {
    match cfg.transport {
        Transport::WebSocket => Box::new(WebSocketSource::new(cfg.source_url.clone())),
        Transport::Tcp => Box::new(TcpLineSource::new(cfg.source_url.clone())),
        Transport::Simulated => Box::new(SimulatedSource::new()),
    }
}

fn open_recorder(cfg: &Config) -> Result<Box<dyn Recorder>, ScanError> {
    let dir = &cfg.recorder.output_dir;
    let recorder: Box<dyn Recorder> = match cfg.recorder.kind {
        RecorderKind::Csv => {
            let csv = CsvRecorder::create_in(dir, Local::now())?;
            println!("  Recording to {}", csv.path().display().to_string().bold());
            Box::new(csv)
        }
        RecorderKind::Sqlite => {
            std::fs::create_dir_all(dir)
                .map_err(|e| ScanError::Recorder(format!("cannot create {}: {e}", dir.display())))?;
            let path = dir.join(SQLITE_FILE);
            let db = SqliteRecorder::open(&path.to_string_lossy())?;
            println!(
                "  Recording to {} (session {})",
                path.display().to_string().bold(),
                db.session().to_string().dimmed()
            );
            Box::new(db)
        }
        RecorderKind::Disabled => {
            println!("  {}", "Recording disabled.".dimmed());
            Box::new(NullRecorder)
        }
    };
    Ok(recorder)
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

fn load_config() -> Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____     __         ____              "#.bold().cyan());
    println!("{}", r#"  / __/____/ /  ___   / __/______ ____   "#.bold().cyan());
    println!("{}", r#" / _// __/ _ \/ _ \ _\ \/ __/ _ `/ _ \  "#.bold().cyan());
    println!("{}", r#"/___/\__/_//_/\___//___/\__/\_,_/_//_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "EchoScan".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Live 3-D point clouds from a four-sensor ranging rig");
    println!();
}

fn print_report(report: &RunReport) {
    let ingest = &report.ingest;
    let driver = &report.driver;

    println!();
    println!("{}", "  Run summary".bold());
    println!("    readings received   {}", ingest.received.to_string().bold());
    println!("    readings processed  {}", driver.processed.to_string().bold());
    println!("    points generated    {}", driver.points_emitted);
    println!("    malformed dropped   {}", highlight(ingest.malformed));
    println!("    reconnects          {}", ingest.reconnects);
    println!("    recorder failures   {}", highlight(driver.recorder_failures));
    println!("    render failures     {}", highlight(driver.render_failures));

    let reason = match &ingest.stop {
        StopReason::Shutdown => "stopped by operator".green().to_string(),
        StopReason::Exhausted(details) => format!("source finished: {details}").green().to_string(),
        StopReason::Failed(e) => format!("source failed: {e}").red().to_string(),
    };
    println!("    ended               {reason}");
    println!();
}

fn highlight(count: u64) -> String {
    if count == 0 {
        count.to_string()
    } else {
        count.to_string().yellow().to_string()
    }
}
