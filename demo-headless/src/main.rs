use blast_sim_core::{
    DriverError, ExplosionConfig, ExportError, JsonLinesExporter, QualityPreset,
    RawExplosionConfig, SimulationDriver, SimulationSnapshot, SnapshotExporter,
};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Headless explosion simulation: writes one JSON snapshot per frame
#[derive(Parser, Debug)]
#[command(name = "blast-sim-headless")]
#[command(about = "Deterministic explosion simulation", long_about = None)]
#[command(allow_negative_numbers = true)]
struct Args {
    /// Explosion config JSON file; when given, the explosion flags below are ignored
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Explosion name
    #[arg(short, long, default_value = "explosion")]
    name: String,

    /// Explosion origin (x y z) in meters
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], default_values_t = [0.0, 0.0, 0.0])]
    location: Vec<f32>,

    /// Quality tier
    #[arg(short = 'q', long, value_enum, default_value_t = Preset::Medium)]
    preset: Preset,

    /// Fire particle count (tier default when omitted)
    #[arg(long)]
    fire: Option<i64>,

    /// Debris particle count (tier default when omitted)
    #[arg(long)]
    debris: Option<i64>,

    /// First emitted frame
    #[arg(long, default_value_t = 1)]
    start_frame: i64,

    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 60)]
    duration: i64,

    /// Blast intensity multiplier
    #[arg(short, long, default_value_t = 1.0)]
    intensity: f32,

    /// RNG seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Smoke grid resolution override (nx ny nz)
    #[arg(long, num_args = 3, value_names = ["NX", "NY", "NZ"])]
    smoke_resolution: Option<Vec<usize>>,

    /// Write snapshots here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a progress row to stderr every N frames (0 = never)
    #[arg(short, long, default_value_t = 10)]
    report_interval: u32,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    Quick,
    Medium,
    High,
}

impl From<Preset> for QualityPreset {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::Quick => QualityPreset::Quick,
            Preset::Medium => QualityPreset::Medium,
            Preset::High => QualityPreset::High,
        }
    }
}

/// Forwards snapshots to an inner exporter and prints a progress table
struct ReportingExporter<E> {
    inner: E,
    interval: u32,
    emitted: u32,
    diagnostics: usize,
}

impl<E: SnapshotExporter> SnapshotExporter for ReportingExporter<E> {
    fn export(&mut self, snapshot: &SimulationSnapshot) -> Result<(), ExportError> {
        self.inner.export(snapshot)?;
        self.diagnostics += snapshot.diagnostics.len();

        if self.interval > 0 && self.emitted % self.interval == 0 {
            let settled = snapshot.debris.iter().filter(|d| d.settled).count();
            let smoke_mass: f32 = snapshot
                .smoke
                .as_ref()
                .map_or(0.0, |s| s.density.iter().sum());
            eprintln!(
                "{:5} | {:9} | {:14} | {:10.3} | {:11}",
                snapshot.frame,
                snapshot.live_fire_count(),
                settled,
                smoke_mass,
                self.diagnostics
            );
        }
        self.emitted += 1;
        Ok(())
    }
}

fn build_config(args: &Args) -> Result<ExplosionConfig, DriverError> {
    if let Some(path) = &args.config {
        return Ok(ExplosionConfig::from_json_file(path)?);
    }

    let location = match args.location.as_slice() {
        &[x, y, z] => [x, y, z],
        _ => [0.0; 3],
    };
    let smoke_resolution = match args.smoke_resolution.as_deref() {
        Some(&[nx, ny, nz]) => Some([nx, ny, nz]),
        _ => None,
    };

    let raw = RawExplosionConfig {
        name: args.name.clone(),
        location,
        quality_preset: args.preset.into(),
        fire_particle_count: args.fire,
        debris_particle_count: args.debris,
        start_frame: args.start_frame,
        duration: args.duration,
        intensity: args.intensity,
        seed: args.seed,
        smoke_resolution,
        ..RawExplosionConfig::default()
    };
    Ok(ExplosionConfig::try_from(raw)?)
}

fn run<W: Write>(config: ExplosionConfig, writer: W, interval: u32) -> Result<usize, DriverError> {
    let end_frame = config.end_frame();
    let mut exporter = ReportingExporter {
        inner: JsonLinesExporter::new(writer),
        interval,
        emitted: 0,
        diagnostics: 0,
    };

    let mut driver = SimulationDriver::new();
    driver.initialize(config)?;

    if interval > 0 {
        eprintln!("Frame | Live fire | Settled debris | Smoke mass | Diagnostics");
        eprintln!("------|-----------|----------------|------------|------------");
    }
    let emitted = driver.advance_to(end_frame, &mut exporter)?;
    exporter.inner.into_inner()?;

    info!(
        "Wrote {} snapshots with {} numerical recoveries",
        emitted, exporter.diagnostics
    );
    Ok(emitted)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let result = build_config(&args).and_then(|config| {
        info!(
            "Running '{}' ({} preset, frames {}..{})",
            config.name(),
            config.quality_preset().as_str(),
            config.start_frame(),
            config.end_frame()
        );
        match &args.output {
            Some(path) => {
                let file = File::create(path).map_err(ExportError::from)?;
                run(config, BufWriter::new(file), args.report_interval)
            }
            None => run(config, io::stdout().lock(), args.report_interval),
        }
    });

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blast_sim_core::ConfigError;

    #[test]
    fn test_unreadable_config_is_config_error() {
        let args = Args::parse_from(["blast-sim-headless", "--config", "/nonexistent/blast.json"]);
        match build_config(&args) {
            Err(DriverError::Config(err @ ConfigError::Read { .. })) => {
                assert!(err.to_string().contains("/nonexistent/blast.json"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_flags_build_config() {
        let args = Args::parse_from(["blast-sim-headless", "-q", "quick", "--fire", "4", "-d", "12"]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.fire_particle_count(), 4);
        assert_eq!(config.end_frame(), 13);
    }
}
