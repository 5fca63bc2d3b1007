use serde::{Deserialize, Serialize};

/// Measured/setpoint temperature pair on a shared uniform time base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSeries {
    /// Uniform sampling interval in seconds
    pub dt_s: f64,
    /// Supply temperature as simulated [C]
    pub measured: Vec<f64>,
    /// Supply temperature the controller asked for [C]
    pub setpoint: Vec<f64>,
}

impl GridSeries {
    pub fn len(&self) -> usize {
        self.measured.len()
    }
    pub fn is_empty(&self) -> bool {
        self.measured.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.measured.len() as f64 * self.dt_s
    }
}
