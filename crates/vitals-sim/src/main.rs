//! vitals-sim - BioHarness Vitals Simulator
//!
//! Usage:
//!   vitals-sim serve --port 8000 --autostart
//!   vitals-sim serve --config simulator.json --demo
//!   vitals-sim generate --count 10 --mode emergency
//!   vitals-sim ranges

use clap::{Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use vitals_core::payload::generic_payload;
use vitals_core::{
    ConditionMode, EngineOptions, HttpTransport, Reading, SimulationEngine, SimulatorConfig,
    VitalType, range_table,
};
use vitals_sim::api::{SERVICE_VERSION, SharedState, get_api_routes};
use vitals_sim::{create_shared_state, logging, metrics, server};

#[derive(Parser)]
#[command(name = "vitals-sim")]
#[command(about = "Wearable vital-signs simulator with HTTP delivery to a rule engine and UI")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (overrides the configured level; RUST_LOG wins over both)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP control API (default)
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Initial simulation mode
        #[arg(short, long)]
        mode: Option<Mode>,

        /// Generation interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,

        /// Rule engine base URL
        #[arg(long)]
        rule_engine_url: Option<String>,

        /// UI update endpoint
        #[arg(long)]
        ui_url: Option<String>,

        /// Start continuous generation immediately
        #[arg(long)]
        autostart: bool,

        /// Generate three readings per mode before serving
        #[arg(long)]
        demo: bool,
    },

    /// Print readings to stdout without delivering them
    Generate {
        /// Number of readings
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,

        /// Simulation mode
        #[arg(short, long, default_value = "normal")]
        mode: Mode,

        /// Output format
        #[arg(short, long, default_value = "json-lines")]
        format: OutputFormat,
    },

    /// Print the static range tables
    Ranges,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Mode {
    Normal,
    Abnormal,
    Emergency,
}

impl From<Mode> for ConditionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Normal => ConditionMode::Normal,
            Mode::Abnormal => ConditionMode::Abnormal,
            Mode::Emergency => ConditionMode::Emergency,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    JsonLines,
    Pretty,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimulatorConfig::load(path)?,
        None => SimulatorConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
        mode: None,
        interval: None,
        rule_engine_url: None,
        ui_url: None,
        autostart: false,
        demo: false,
    }) {
        Commands::Serve {
            host,
            port,
            mode,
            interval,
            rule_engine_url,
            ui_url,
            autostart,
            demo,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(mode) = mode {
                config.simulation.mode = mode.into();
            }
            if let Some(interval) = interval {
                config.simulation.interval_secs = interval;
            }
            if let Some(url) = rule_engine_url {
                config.rule_engine.base_url = url;
            }
            if let Some(url) = ui_url {
                config.user_interface.url = url;
            }
            config.validate()?;
            run_serve(config, autostart, demo)
        }
        Commands::Generate {
            count,
            mode,
            format,
        } => run_generate(&config, count, mode.into(), format),
        Commands::Ranges => {
            run_ranges();
            Ok(())
        }
    }
}

fn run_serve(config: SimulatorConfig, autostart: bool, demo: bool) -> Result<(), Box<dyn Error>> {
    logging::init(&config.logging)?;
    metrics::init();

    // The blocking client must exist before the async runtime starts.
    let transport = Arc::new(HttpTransport::new()?);
    let state = create_shared_state(config, transport)?;

    print_banner(&state);
    log_startup(&state);

    if demo {
        run_demo(&state);
    }
    if autostart && state.engine.start() {
        metrics::set_running(true);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("vitals-http")
        .build()?;
    let served = runtime.block_on(server::serve(state.clone()));
    drop(runtime);

    info!("════════════════════════════════════════════════════════════");
    info!("BioHarness Vitals Simulator Shutting Down");
    info!(shutdown_time = %chrono::Local::now().to_rfc3339(), "Stopping generation loop");
    state.engine.shutdown();
    metrics::set_running(false);
    info!("════════════════════════════════════════════════════════════");

    served?;
    Ok(())
}

fn print_banner(state: &SharedState) {
    let url = state.config.server.url();
    eprintln!("╔══════════════════════════════════════════════════════════════╗");
    eprintln!("║              BioHarness Vitals Simulator v{:<19}║", SERVICE_VERSION);
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    eprintln!("║ Simulates patient vital signs with configurable modes        ║");
    eprintln!("║ Broadcasts data to rule engines and UI systems               ║");
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    eprintln!("║ Base URL: {:50} ║", url);
    for destination in state.broadcaster.destinations() {
        let label = format!(
            "{} ({})",
            destination.name,
            if destination.enabled { "on" } else { "off" }
        );
        eprintln!("║ {:20} {:39} ║", label, destination.url);
    }
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    eprintln!("║ ENDPOINTS                                                    ║");
    eprintln!("╠──────────────────────────────────────────────────────────────╣");
    for (method, path, _) in get_api_routes() {
        eprintln!("║ {:6} {:53} ║", method, path);
    }
    eprintln!("╚══════════════════════════════════════════════════════════════╝");
}

fn log_startup(state: &SharedState) {
    let snapshot = state.engine.snapshot();
    info!("════════════════════════════════════════════════════════════");
    info!("BioHarness Vitals Simulator Starting Up");
    info!("════════════════════════════════════════════════════════════");
    info!(
        server_url = %state.config.server.url(),
        start_time = %chrono::Local::now().to_rfc3339(),
        mode = %snapshot.mode,
        interval_secs = snapshot.interval_secs,
        patient_id = %snapshot.patient_id,
        "Ready to simulate patient vital signs"
    );
}

/// Three readings per mode, then back to normal.
fn run_demo(state: &SharedState) {
    info!("Starting simulator capabilities demonstration...");

    for mode in ConditionMode::ALL {
        info!(mode = mode.profile_name(), "Demonstrating mode");
        state.engine.set_mode(mode);

        for sample in 1..=3 {
            let reading = state.engine.generate_once();
            info!(sample, "{}", summarize(&reading));
            std::thread::sleep(Duration::from_secs(1));
        }
    }

    state.engine.set_mode(ConditionMode::Normal);
    info!("Demonstration completed. Reset to normal mode.");
}

fn run_generate(
    config: &SimulatorConfig,
    count: usize,
    mode: ConditionMode,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let engine = SimulationEngine::new(EngineOptions {
        mode,
        ..config.engine_options()
    })?;

    for _ in 0..count {
        let reading = engine.generate_once();
        match format {
            OutputFormat::JsonLines => {
                println!("{}", serde_json::to_string(&generic_payload(&reading))?);
            }
            OutputFormat::Pretty => println!("{}", summarize(&reading)),
        }
    }

    if count == 0 {
        eprintln!("Warning: no readings requested");
    }
    Ok(())
}

fn summarize(reading: &Reading) -> String {
    let v = reading.vitals();
    format!(
        "#{} [{}] HR={} bpm | BP={}/{} mmHg | SpO2={}% | Temp={}°C | RR={}/min | Patient: {}",
        reading.sequence(),
        reading.mode(),
        v.heart_rate,
        v.bp_systolic,
        v.bp_diastolic,
        v.spo2,
        v.temperature,
        v.respiratory_rate,
        reading.patient_id()
    )
}

fn run_ranges() {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Vital Sign Reference Ranges                 ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║ {:27} {:>10} {:>10} {:>10} ║",
        "vital", "normal", "abnormal", "emergency"
    );
    println!("╠──────────────────────────────────────────────────────────────╣");

    for vital in VitalType::ALL {
        let cells: Vec<String> = ConditionMode::ALL
            .iter()
            .map(|mode| {
                let range = range_table(*mode)[vital.index()].1;
                format!("{}-{}", range.min(), range.max())
            })
            .collect();
        println!(
            "║ {:27} {:>10} {:>10} {:>10} ║",
            vital.label(),
            cells[0],
            cells[1],
            cells[2]
        );
    }

    println!("╚══════════════════════════════════════════════════════════════╝");
}
