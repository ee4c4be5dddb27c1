use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use rgb_dispenser::{
    ActuatorController, ActuatorDriver, CameraSource, ColorExtractor, FileSource, ImageSource,
    LoggingDriver, Pipeline, PipelineConfig, SysfsGpioDriver, SystemTimeSource,
};
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "rgb-dispenser")]
#[command(version, about = "Dose colored fluid in proportion to the dominant color of a photo", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use an existing image instead of capturing one
    #[arg(short, long, value_name = "FILE", conflicts_with = "capture")]
    image: Option<PathBuf>,

    /// Where the camera writes the captured still
    #[arg(long, value_name = "FILE")]
    capture: Option<PathBuf>,

    /// Number of color clusters
    #[arg(short, value_name = "N")]
    k: Option<usize>,

    /// Seed for reproducible clustering
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Valve open time for a fully saturated channel, in seconds
    #[arg(long, value_name = "SECONDS")]
    base_duration: Option<f64>,

    /// Downsize images larger than this before clustering
    #[arg(long, value_name = "PIXELS")]
    max_dimension: Option<u32>,

    /// Output driver
    #[arg(long, value_enum, default_value = "sysfs")]
    driver: DriverKind,

    /// Compute and print the plan without actuating
    #[arg(long)]
    dry_run: bool,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DriverKind {
    /// GPIO pins through /sys/class/gpio
    Sysfs,
    /// Log transitions only
    Log,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    apply_overrides(cli, &mut config);
    config.validate()?;

    if cli.dry_run {
        return execute(cli, &config, LoggingDriver::new(), true);
    }

    match cli.driver {
        DriverKind::Sysfs => execute(cli, &config, SysfsGpioDriver::new(config.gpio)?, false),
        DriverKind::Log => execute(cli, &config, LoggingDriver::new(), false),
    }
}

fn apply_overrides(cli: &Cli, config: &mut PipelineConfig) {
    if let Some(k) = cli.k {
        config.clustering.k = k;
    }
    if cli.seed.is_some() {
        config.clustering.seed = cli.seed;
    }
    if let Some(base) = cli.base_duration {
        config.actuation.base_duration_s = base;
    }
    if cli.max_dimension.is_some() {
        config.acquisition.max_dimension = cli.max_dimension;
    }
    if let Some(path) = &cli.capture {
        config.acquisition.image_path = path.clone();
    }
}

fn execute<D: ActuatorDriver>(
    cli: &Cli,
    config: &PipelineConfig,
    driver: D,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let acquisition = &config.acquisition;
    let source: Box<dyn ImageSource> = match &cli.image {
        Some(path) => Box::new(FileSource::new(path).with_max_dimension(acquisition.max_dimension)),
        None => Box::new(
            CameraSource::new(&acquisition.capture_command, &acquisition.image_path)
                .with_max_dimension(acquisition.max_dimension),
        ),
    };

    let controller = ActuatorController::new(
        driver,
        SystemTimeSource::new(),
        config.actuation.settings()?,
    )?;
    let mut pipeline = Pipeline::new(
        source,
        ColorExtractor::new(config.clustering),
        config.actuation.mapper()?,
        controller,
    );

    let report = if dry_run {
        pipeline.plan()?
    } else {
        pipeline.run()?
    };
    info!(
        dominant = %report.dominant,
        plan = %report.plan,
        dry_run,
        "run complete"
    );

    pipeline.into_controller().shutdown()?;
    Ok(())
}
