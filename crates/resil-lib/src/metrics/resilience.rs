use crate::signal::GridSeries;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MetricError {
    #[error("deviation signal is zero everywhere, nothing to assess")]
    NoDisturbance,
    #[error("measured series has {measured} samples, setpoint has {setpoint}")]
    ShapeMismatch { measured: usize, setpoint: usize },
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Tolerance band and temperature normalizer for one assessment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResilienceParams {
    /// Symmetric dead-band around the setpoint [K]
    pub t_band: f64,
    /// Reference temperature scale for MD and PL [K]
    pub temp_norm: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResilienceSummary {
    pub md: f64,
    pub rt: f64,
    pub pl: f64,
    pub ri: f64,
}

/// Index window of a disturbance: first and last nonzero deviation sample,
/// plus the first sample attaining the peak deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisturbanceWindow {
    pub first: usize,
    pub peak: usize,
    pub last: usize,
}

/// Distance of each measured sample outside the tolerance band around its
/// setpoint. Zero on and inside the band boundary, never negative.
pub fn deviation_signal(
    measured: &[f64],
    setpoint: &[f64],
    t_band: f64,
) -> Result<Vec<f64>, MetricError> {
    if t_band < 0.0 {
        return Err(MetricError::InvalidParameter {
            name: "t_band",
            value: t_band,
        });
    }
    if measured.len() != setpoint.len() {
        return Err(MetricError::ShapeMismatch {
            measured: measured.len(),
            setpoint: setpoint.len(),
        });
    }
    Ok(measured
        .iter()
        .zip(setpoint)
        .map(|(m, s)| (m - (s + t_band)).max(0.0) + ((s - t_band) - m).max(0.0))
        .collect())
}

/// Locate the disturbance in a deviation signal. Ties at the peak resolve to
/// the earliest sample.
pub fn disturbance_window(dx: &[f64]) -> Result<DisturbanceWindow, MetricError> {
    let first = dx
        .iter()
        .position(|&v| v != 0.0)
        .ok_or(MetricError::NoDisturbance)?;
    let last = dx.iter().rposition(|&v| v != 0.0).unwrap_or(first);
    let mut peak = first;
    for (idx, &v) in dx.iter().enumerate() {
        if v > dx[peak] {
            peak = idx;
        }
    }
    Ok(DisturbanceWindow { first, peak, last })
}

pub fn maximum_deviation(dx: &[f64], temp_norm: f64) -> Result<f64, MetricError> {
    if temp_norm <= 0.0 {
        return Err(MetricError::InvalidParameter {
            name: "temp_norm",
            value: temp_norm,
        });
    }
    let peak = dx.iter().cloned().fold(0.0_f64, f64::max);
    Ok(peak / temp_norm)
}

pub fn recovery_time(
    window: &DisturbanceWindow,
    dt_s: f64,
    time_norm: f64,
) -> Result<f64, MetricError> {
    if time_norm <= 0.0 {
        return Err(MetricError::InvalidParameter {
            name: "time_norm",
            value: time_norm,
        });
    }
    Ok((window.last - window.first) as f64 * dt_s / time_norm)
}

pub fn performance_loss(dx: &[f64], temp_norm: f64, time_norm: f64) -> Result<f64, MetricError> {
    if temp_norm <= 0.0 {
        return Err(MetricError::InvalidParameter {
            name: "temp_norm",
            value: temp_norm,
        });
    }
    if time_norm <= 0.0 {
        return Err(MetricError::InvalidParameter {
            name: "time_norm",
            value: time_norm,
        });
    }
    Ok(dx.iter().sum::<f64>() / (temp_norm * time_norm))
}

/// Combine the three sub-metrics into the bounded index in (0, 1].
pub fn resilience_index(md: f64, rt: f64, pl: f64) -> f64 {
    1.0 / (1.0 + md * rt * pl)
}

/// Run the full assessment for one scenario.
///
/// The time normalizer fed into recovery time and performance loss is the
/// span from disturbance onset to the peak sample, not the sampling
/// interval. A disturbance peaking on its first nonzero sample therefore
/// has no usable duration and is rejected.
pub fn assess(
    series: &GridSeries,
    params: &ResilienceParams,
) -> Result<ResilienceSummary, MetricError> {
    if series.dt_s <= 0.0 {
        return Err(MetricError::InvalidParameter {
            name: "dt_s",
            value: series.dt_s,
        });
    }
    let dx = deviation_signal(&series.measured, &series.setpoint, params.t_band)?;
    let window = disturbance_window(&dx)?;
    let time_norm = (window.peak - window.first) as f64 * series.dt_s;
    if time_norm <= 0.0 {
        return Err(MetricError::InvalidParameter {
            name: "time_norm",
            value: time_norm,
        });
    }
    let md = maximum_deviation(&dx, params.temp_norm)?;
    let rt = recovery_time(&window, series.dt_s, time_norm)?;
    let pl = performance_loss(&dx, params.temp_norm, time_norm)?;
    Ok(ResilienceSummary {
        md,
        rt,
        pl,
        ri: resilience_index(md, rt, pl),
    })
}
