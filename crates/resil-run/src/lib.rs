use anyhow::{Context, Result};
use csv::WriterBuilder;
use log::{info, warn};
use resil_lib::io::csv::{
    read_temperature_csv, TemperatureUnit, DEFAULT_MEASURED_COLUMN, DEFAULT_SETPOINT_COLUMN,
};
use resil_lib::metrics::resilience::{assess, ResilienceParams, ResilienceSummary};
use resil_lib::signal::GridSeries;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct BatchSpec {
    #[serde(default)]
    pub t_band: Option<f64>,
    #[serde(default)]
    pub temp_norm: Option<f64>,
    #[serde(default)]
    pub sample_interval_s: Option<f64>,
    pub scenarios: Vec<ScenarioSpec>,
}

/// One scenario: where its export lives and how to read it. Everything but
/// name and path falls back to the batch-level value, then to the stock
/// export defaults.
#[derive(Debug, Deserialize, Clone)]
pub struct ScenarioSpec {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub measured_column: Option<String>,
    #[serde(default)]
    pub setpoint_column: Option<String>,
    #[serde(default)]
    pub measured_unit: Option<TemperatureUnit>,
    #[serde(default)]
    pub t_band: Option<f64>,
    #[serde(default)]
    pub temp_norm: Option<f64>,
    #[serde(default)]
    pub sample_interval_s: Option<f64>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ScenarioResult {
    pub name: String,
    pub metrics: ResilienceSummary,
}

#[derive(Debug, Serialize, Clone)]
pub struct ScenarioFailure {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct BatchReport {
    pub results: Vec<ScenarioResult>,
    pub failures: Vec<ScenarioFailure>,
}

pub fn read_batch_spec(path: &Path) -> Result<BatchSpec> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read batch spec {}", path.display()))?;
    let spec: BatchSpec =
        toml::from_str(&contents).with_context(|| format!("parsing batch spec {}", path.display()))?;
    Ok(spec)
}

pub fn load_scenario(spec: &BatchSpec, scenario: &ScenarioSpec) -> Result<GridSeries> {
    let measured_column = scenario
        .measured_column
        .as_deref()
        .unwrap_or(DEFAULT_MEASURED_COLUMN);
    let setpoint_column = scenario
        .setpoint_column
        .as_deref()
        .unwrap_or(DEFAULT_SETPOINT_COLUMN);
    let (mut measured, setpoint) =
        read_temperature_csv(&scenario.path, measured_column, setpoint_column)?;
    let unit = scenario.measured_unit.unwrap_or(TemperatureUnit::Kelvin);
    unit.to_celsius(&mut measured);
    let dt_s = scenario
        .sample_interval_s
        .or(spec.sample_interval_s)
        .unwrap_or(900.0);
    Ok(GridSeries {
        dt_s,
        measured,
        setpoint,
    })
}

fn scenario_params(spec: &BatchSpec, scenario: &ScenarioSpec) -> ResilienceParams {
    ResilienceParams {
        t_band: scenario.t_band.or(spec.t_band).unwrap_or(5.0),
        temp_norm: scenario.temp_norm.or(spec.temp_norm).unwrap_or(5.0),
    }
}

/// Assess every scenario in order. A scenario that cannot be loaded or
/// assessed lands in `failures` and the batch keeps going.
pub fn run_batch(spec: &BatchSpec) -> BatchReport {
    let mut report = BatchReport::default();
    for scenario in &spec.scenarios {
        info!("assessing scenario {}", scenario.name);
        let outcome = load_scenario(spec, scenario)
            .and_then(|series| assess(&series, &scenario_params(spec, scenario)).map_err(Into::into));
        match outcome {
            Ok(metrics) => report.results.push(ScenarioResult {
                name: scenario.name.clone(),
                metrics,
            }),
            Err(err) => {
                warn!("scenario {} failed: {:#}", scenario.name, err);
                report.failures.push(ScenarioFailure {
                    name: scenario.name.clone(),
                    reason: format!("{:#}", err),
                });
            }
        }
    }
    report
}

/// Write the metric table: one column per successful scenario, rows
/// MD/RT/PL/RI, first header cell left empty for the row labels.
pub fn write_metric_table(path: &Path, report: &BatchReport, include_average: bool) -> Result<()> {
    let file =
        fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    let with_average = include_average && !report.results.is_empty();

    let mut header = vec![String::new()];
    header.extend(report.results.iter().map(|r| r.name.clone()));
    if with_average {
        header.push("Average".into());
    }
    writer.write_record(&header)?;

    let rows: [(&str, fn(&ResilienceSummary) -> f64); 4] = [
        ("MD", |m| m.md),
        ("RT", |m| m.rt),
        ("PL", |m| m.pl),
        ("RI", |m| m.ri),
    ];
    for (label, get) in rows {
        let values: Vec<f64> = report.results.iter().map(|r| get(&r.metrics)).collect();
        let mut record = vec![label.to_string()];
        record.extend(values.iter().map(|v| v.to_string()));
        if with_average {
            record.push((values.iter().sum::<f64>() / values.len() as f64).to_string());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    fn scenario(name: &str, path: PathBuf) -> ScenarioSpec {
        ScenarioSpec {
            name: name.into(),
            path,
            measured_column: None,
            setpoint_column: None,
            measured_unit: None,
            t_band: None,
            temp_norm: None,
            sample_interval_s: None,
        }
    }

    fn write_export(dir: &Path, name: &str, rows: &[(f64, f64)]) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "{},{}",
            DEFAULT_MEASURED_COLUMN, DEFAULT_SETPOINT_COLUMN
        )
        .unwrap();
        for (measured, setpoint) in rows {
            writeln!(file, "{},{}", measured, setpoint).unwrap();
        }
        path
    }

    #[test]
    fn parses_committed_batch_spec() {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let path = manifest_dir
            .parent()
            .and_then(|p| p.parent())
            .expect("workspace root")
            .join("test_data/batch_spec.toml");
        let spec = read_batch_spec(&path).unwrap();
        assert_eq!(spec.scenarios.len(), 2);
        assert_eq!(spec.t_band, Some(5.0));
        assert_eq!(spec.scenarios[0].name, "boiler outage");
        assert_eq!(
            spec.scenarios[1].measured_unit,
            Some(TemperatureUnit::Kelvin)
        );
    }

    #[test]
    fn batch_isolates_failing_scenarios() {
        let dir = tempdir().unwrap();
        // Kelvin inputs, setpoint 80 C: the first export swings 12 K above
        // the setpoint, the second stays inside the band, the third is gone.
        let disturbed = write_export(
            dir.path(),
            "disturbed.csv",
            &[
                (353.15, 80.0),
                (353.15, 80.0),
                (360.15, 80.0),
                (365.15, 80.0),
                (360.15, 80.0),
                (353.15, 80.0),
            ],
        );
        let flat = write_export(
            dir.path(),
            "flat.csv",
            &[(353.15, 80.0), (354.15, 80.0), (352.15, 80.0)],
        );
        let spec = BatchSpec {
            t_band: None,
            temp_norm: None,
            sample_interval_s: Some(900.0),
            scenarios: vec![
                scenario("disturbed", disturbed),
                scenario("flat", flat),
                scenario("missing", dir.path().join("nope.csv")),
            ],
        };
        let report = run_batch(&spec);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].name, "disturbed");
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].name, "flat");
        assert!(report.failures[0].reason.contains("zero everywhere"));
        assert_eq!(report.failures[1].name, "missing");
    }

    #[test]
    fn scenario_overrides_beat_batch_defaults() {
        let spec = BatchSpec {
            t_band: Some(2.0),
            temp_norm: None,
            sample_interval_s: None,
            scenarios: vec![ScenarioSpec {
                t_band: Some(1.0),
                temp_norm: Some(3.0),
                ..scenario("s", PathBuf::from("unused.csv"))
            }],
        };
        let params = scenario_params(&spec, &spec.scenarios[0]);
        assert_eq!(params.t_band, 1.0);
        assert_eq!(params.temp_norm, 3.0);
    }

    #[test]
    fn metric_table_has_one_column_per_success() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("resilience.csv");
        let report = BatchReport {
            results: vec![
                ScenarioResult {
                    name: "a".into(),
                    metrics: ResilienceSummary {
                        md: 1.0,
                        rt: 2.0,
                        pl: 3.0,
                        ri: 0.5,
                    },
                },
                ScenarioResult {
                    name: "b".into(),
                    metrics: ResilienceSummary {
                        md: 3.0,
                        rt: 4.0,
                        pl: 5.0,
                        ri: 0.25,
                    },
                },
            ],
            failures: vec![],
        };
        write_metric_table(&out, &report, false).unwrap();
        let table = fs::read_to_string(&out).unwrap();
        let mut lines = table.lines();
        assert_eq!(lines.next().unwrap(), ",a,b");
        assert_eq!(lines.next().unwrap(), "MD,1,3");
        assert_eq!(lines.next().unwrap(), "RT,2,4");
        assert_eq!(lines.next().unwrap(), "PL,3,5");
        assert_eq!(lines.next().unwrap(), "RI,0.5,0.25");
    }

    #[test]
    fn metric_table_can_append_an_average_column() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("resilience.csv");
        let report = BatchReport {
            results: vec![
                ScenarioResult {
                    name: "a".into(),
                    metrics: ResilienceSummary {
                        md: 1.0,
                        rt: 1.0,
                        pl: 1.0,
                        ri: 0.5,
                    },
                },
                ScenarioResult {
                    name: "b".into(),
                    metrics: ResilienceSummary {
                        md: 3.0,
                        rt: 1.0,
                        pl: 1.0,
                        ri: 0.25,
                    },
                },
            ],
            failures: vec![],
        };
        write_metric_table(&out, &report, true).unwrap();
        let table = fs::read_to_string(&out).unwrap();
        let mut lines = table.lines();
        assert_eq!(lines.next().unwrap(), ",a,b,Average");
        assert_eq!(lines.next().unwrap(), "MD,1,3,2");
        let _ = lines.next();
        let _ = lines.next();
        assert_eq!(lines.next().unwrap(), "RI,0.5,0.25,0.375");
    }

    #[test]
    fn empty_report_still_writes_the_row_labels() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("resilience.csv");
        write_metric_table(&out, &BatchReport::default(), true).unwrap();
        let table = fs::read_to_string(&out).unwrap();
        let mut lines = table.lines();
        // the csv writer quotes a lone empty field
        let header = lines.next().unwrap();
        assert!(header.trim_matches('"').is_empty());
        assert_eq!(lines.collect::<Vec<_>>(), vec!["MD", "RT", "PL", "RI"]);
    }
}
