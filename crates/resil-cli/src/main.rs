use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use log::warn;
use resil_lib::io::csv::{
    read_temperature_csv, TemperatureUnit, DEFAULT_MEASURED_COLUMN, DEFAULT_SETPOINT_COLUMN,
};
use resil_lib::metrics::resilience::{assess, ResilienceParams};
use resil_lib::signal::GridSeries;
use resil_run::{read_batch_spec, run_batch, write_metric_table};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "resil",
    version,
    about = "Resilience index tools for district-heating simulation output"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum UnitArg {
    Celsius,
    Kelvin,
}

impl From<UnitArg> for TemperatureUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Celsius => TemperatureUnit::Celsius,
            UnitArg::Kelvin => TemperatureUnit::Kelvin,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Assess one simulation export and print MD/RT/PL/RI as JSON
    Assess {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = DEFAULT_MEASURED_COLUMN)]
        measured_column: String,
        #[arg(long, default_value = DEFAULT_SETPOINT_COLUMN)]
        setpoint_column: String,
        /// Unit of the measured column as stored in the file
        #[arg(long, default_value = "kelvin")]
        measured_unit: UnitArg,
        #[arg(long, default_value_t = 900.0)]
        sample_interval_s: f64,
        #[arg(long, default_value_t = 5.0)]
        t_band: f64,
        #[arg(long, default_value_t = 5.0)]
        temp_norm: f64,
    },
    /// Run every scenario in a batch spec and write the metric table as CSV
    Batch {
        #[arg(long)]
        spec: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Append a column with the mean of each metric across scenarios
        #[arg(long)]
        average: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Assess {
            input,
            measured_column,
            setpoint_column,
            measured_unit,
            sample_interval_s,
            t_band,
            temp_norm,
        } => cmd_assess(
            &input,
            &measured_column,
            &setpoint_column,
            measured_unit.into(),
            sample_interval_s,
            t_band,
            temp_norm,
        )?,
        Commands::Batch { spec, out, average } => cmd_batch(&spec, &out, average)?,
    }
    Ok(())
}

fn cmd_assess(
    input: &Path,
    measured_column: &str,
    setpoint_column: &str,
    unit: TemperatureUnit,
    sample_interval_s: f64,
    t_band: f64,
    temp_norm: f64,
) -> Result<()> {
    let (mut measured, setpoint) = read_temperature_csv(input, measured_column, setpoint_column)?;
    unit.to_celsius(&mut measured);
    let series = GridSeries {
        dt_s: sample_interval_s,
        measured,
        setpoint,
    };
    let summary = assess(&series, &ResilienceParams { t_band, temp_norm })?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_batch(spec_path: &Path, out: &Path, average: bool) -> Result<()> {
    let spec = read_batch_spec(spec_path)?;
    let report = run_batch(&spec);
    write_metric_table(out, &report, average)?;
    if !report.failures.is_empty() {
        warn!(
            "{} of {} scenarios failed",
            report.failures.len(),
            spec.scenarios.len()
        );
    }
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}
