//! catchsim CLI - landscape evolution runs from JSON inputs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use catchsim::export::{DirectorySink, RawFormat};
use catchsim::grid::Bootstrap;
use catchsim::inputs::{PointSource, ReachConfig, StepTable};
use catchsim::model::{Model, ModelConfig};

/// Catchment and reach scale landscape evolution model.
#[derive(Parser)]
#[command(name = "catchsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a model from a configuration and a bootstrap document.
    Run {
        /// Model configuration (JSON). Missing sections use defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bootstrap grid (JSON).
        #[arg(short, long)]
        bootstrap: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Run a synthetic valley fed by one reach inflow.
    Synthetic {
        /// Model configuration (JSON). Missing sections use defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "60")]
        cols: usize,

        #[arg(long, default_value = "20")]
        rows: usize,

        /// Cell size in metres.
        #[arg(long, default_value = "5.0")]
        cell_size: f64,

        /// Down-valley gradient (m/m).
        #[arg(long, default_value = "0.01")]
        gradient: f64,

        /// Valley side slope (m/m).
        #[arg(long, default_value = "0.05")]
        side_slope: f64,

        /// Inflow discharge at the head of the valley (m^3/s).
        #[arg(long, default_value = "5.0")]
        discharge: f64,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Validate a configuration and print it with defaults filled in.
    Info {
        /// Model configuration (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bootstrap grid to check against the configuration.
        #[arg(short, long)]
        bootstrap: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Output directory for snapshots and the summary file.
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,

    /// Base name for output files.
    #[arg(short, long, default_value = "run")]
    name: String,

    /// Snapshot sample format.
    #[arg(short, long, default_value = "float32")]
    format: ExportFormat,

    /// Stop the run after this many wall-clock seconds.
    #[arg(long)]
    max_wall_seconds: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    /// 32-bit float RAW.
    Float32,
    /// 64-bit float RAW (full precision).
    Float64,
}

impl From<ExportFormat> for RawFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Float32 => RawFormat::R32Float,
            ExportFormat::Float64 => RawFormat::R64Float,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("installing log subscriber")?;

    match cli.command {
        Commands::Run {
            config,
            bootstrap,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            let bootstrap = Bootstrap::from_json_file(&bootstrap, config.sediment.fractions.len())
                .with_context(|| format!("loading bootstrap {}", bootstrap.display()))?;
            run_model(config, &bootstrap, &output)
        }
        Commands::Synthetic {
            config,
            cols,
            rows,
            cell_size,
            gradient,
            side_slope,
            discharge,
            output,
        } => {
            let mut config = load_config(config.as_deref())?;
            let bootstrap = Bootstrap::valley(cols, rows, cell_size, gradient, side_slope);
            if config.inputs.reach.is_none() && config.inputs.catchment.is_none() {
                config.inputs.reach = Some(ReachConfig {
                    points: vec![PointSource {
                        col: cols.saturating_sub(2),
                        row: rows / 2,
                        table: StepTable::new(3600.0, vec![vec![0.0, discharge]]),
                    }],
                    recirculate: None,
                });
            }
            run_model(config, &bootstrap, &output)
        }
        Commands::Info { config, bootstrap } => run_info(config.as_deref(), bootstrap.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ModelConfig> {
    match path {
        Some(p) => ModelConfig::from_json_file(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(ModelConfig::default()),
    }
}

fn run_model(config: ModelConfig, bootstrap: &Bootstrap, output: &OutputArgs) -> anyhow::Result<()> {
    let fractions = config.sediment.fractions.len();
    let mut model = Model::new(config, bootstrap)?;
    let mut sink = DirectorySink::create(&output.output, &output.name, fractions, output.format.into())
        .with_context(|| format!("creating output directory {}", output.output.display()))?;

    let halt = Arc::new(AtomicBool::new(false));
    if let Some(seconds) = output.max_wall_seconds {
        let flag = Arc::clone(&halt);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(seconds));
            flag.store(true, Ordering::Relaxed);
        });
    }

    let start = Instant::now();
    let telemetry = model.run(&halt, &mut sink)?;
    let telemetry_path = sink.finish(&telemetry)?;
    info!(
        elapsed = ?start.elapsed(),
        iterations = telemetry.iteration,
        simulated_hours = telemetry.time / 3600.0,
        water_in = telemetry.water_in,
        water_out = telemetry.water_out,
        sediment_out = telemetry.sediment_out,
        telemetry = %telemetry_path.display(),
        "done"
    );
    Ok(())
}

fn run_info(config: Option<&Path>, bootstrap: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    println!("{}", config.to_json_pretty()?);

    if let Some(path) = bootstrap {
        let fractions = config.sediment.fractions.len();
        let b = Bootstrap::from_json_file(path, fractions)
            .with_context(|| format!("loading bootstrap {}", path.display()))?;
        let g = b.geometry;
        println!();
        println!("Grid: {} x {} cells of {} m", g.cols, g.rows, g.cell_size);
        println!("Area: {:.3} km^2", g.len() as f64 * g.cell_area() / 1e6);
        println!("Grain fractions: {fractions}");
        println!("Grain records: {}", b.grain.len());
        println!("Transport law: {}", config.sediment.law.name());
    }
    Ok(())
}
