use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Column names of the district-heating simulation exports this tool was
/// written against. Batch specs and CLI flags can override both.
pub const DEFAULT_MEASURED_COLUMN: &str = "fMU_PhyModel.temperature_HeatGrid_FF.T";
pub const DEFAULT_SETPOINT_COLUMN: &str = "controller.u_T_HeatGrid_FF_set";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Kelvin,
}

impl TemperatureUnit {
    /// Rewrite a series into Celsius in place.
    pub fn to_celsius(&self, values: &mut [f64]) {
        if let TemperatureUnit::Kelvin = self {
            for v in values.iter_mut() {
                *v -= 273.15;
            }
        }
    }
}

/// Extract the measured and setpoint columns from a simulation export.
/// Columns are located by header name (case-insensitive); anything else in
/// the file, including a time column, is ignored.
pub fn read_temperature_csv(
    path: &Path,
    measured_col: &str,
    setpoint_col: &str,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers = reader.headers().context("reading header")?.clone();

    let measured_idx = locate_column(&headers, measured_col, "measured temperature")?;
    let setpoint_idx = locate_column(&headers, setpoint_col, "setpoint temperature")?;

    let mut measured = Vec::new();
    let mut setpoint = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("reading row {}", row + 1))?;
        measured.push(parse_cell(&record, measured_idx, row, measured_col)?);
        setpoint.push(parse_cell(&record, setpoint_idx, row, setpoint_col)?);
    }
    Ok((measured, setpoint))
}

fn parse_cell(record: &csv::StringRecord, idx: usize, row: usize, col: &str) -> Result<f64> {
    record
        .get(idx)
        .ok_or_else(|| anyhow::anyhow!("row {} is missing column {}", row + 1, col))?
        .parse::<f64>()
        .with_context(|| format!("row {} of column {} is not a number", row + 1, col))
}

fn locate_column(headers: &csv::StringRecord, requested: &str, hint: &str) -> Result<usize> {
    headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(requested))
        .ok_or_else(|| anyhow::anyhow!("missing {} column ({})", hint, requested))
}
