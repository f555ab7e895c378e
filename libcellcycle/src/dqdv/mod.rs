//! Differential capacity (dQ/dV) for a single half cycle.
//!
//! The curve is built in stages: deduplicate by voltage, resample capacity linearly onto a
//! uniform voltage grid, smooth with a Savitzky-Golay filter, fit a smoothing spline,
//! differentiate the spline, and optionally smooth the derivative again.
pub mod savgol;
pub mod spline;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::error::DqdvError;
use savgol::SavitzkyGolay;
use spline::{fit_smoothing_spline, linear_interpolate};

pub const DEFAULT_GRID_POINTS: usize = 10_000;

/// Tuning of the dQ/dV pipeline. Defaults follow common practice for cycler data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DqdvParams {
    /// Order of the smoothing spline. Odd orders give the best results.
    pub spline_order: usize,
    /// Upper bound on the spline's sum of squared residuals
    pub spline_smoothing: f64,
    pub window_size_1: usize,
    pub polyorder_1: usize,
    pub window_size_2: usize,
    pub polyorder_2: usize,
    /// Apply the second Savitzky-Golay pass to the derivative
    pub final_smooth: bool,
    pub grid_points: usize,
}

impl Default for DqdvParams {
    fn default() -> Self {
        Self {
            spline_order: 3,
            spline_smoothing: 1e-5,
            window_size_1: 101,
            polyorder_1: 5,
            window_size_2: 1001,
            polyorder_2: 5,
            final_smooth: true,
            grid_points: DEFAULT_GRID_POINTS,
        }
    }
}

impl DqdvParams {
    /// Check every parameter before any computation happens. No value is clamped.
    pub fn validate(&self) -> Result<(), DqdvError> {
        if !(1..=5).contains(&self.spline_order) {
            return Err(DqdvError::BadSplineOrder(self.spline_order));
        }
        if !self.spline_smoothing.is_finite() || self.spline_smoothing < 0.0 {
            return Err(DqdvError::BadSmoothing(self.spline_smoothing));
        }
        if self.grid_points < 2 || self.grid_points <= self.spline_order {
            return Err(DqdvError::BadGridSize {
                grid: self.grid_points,
                order: self.spline_order,
            });
        }
        SavitzkyGolay::validate(
            "first smoothing",
            self.window_size_1,
            self.polyorder_1,
            self.grid_points,
        )?;
        // Checked even when final_smooth is off
        SavitzkyGolay::validate(
            "second smoothing",
            self.window_size_2,
            self.polyorder_2,
            self.grid_points,
        )?;
        Ok(())
    }
}

/// A dQ/dV curve on a uniform voltage grid. All arrays have the grid length.
#[derive(Debug, Clone, PartialEq)]
pub struct DifferentialCurve {
    pub voltage: Array1<f64>,
    pub dqdv: Array1<f64>,
    pub capacity: Array1<f64>,
}

impl DifferentialCurve {
    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }
}

/// A curve tagged with the half cycle it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct HalfCycleCurve {
    pub half_cycle: u32,
    pub curve: DifferentialCurve,
}

/// Compute the dQ/dV curve of one half cycle from its (capacity, voltage) samples
pub fn dqdv_single_cycle(
    capacity: &[f64],
    voltage: &[f64],
    params: &DqdvParams,
) -> Result<DifferentialCurve, DqdvError> {
    params.validate()?;
    if capacity.len() != voltage.len() {
        return Err(DqdvError::LengthMismatch {
            capacity: capacity.len(),
            voltage: voltage.len(),
        });
    }

    let (unique_v, unique_cap) = dedup_by_voltage(capacity, voltage);
    if unique_v.len() < 2 {
        return Err(DqdvError::TooFewVoltages(unique_v.len()));
    }

    let grid = voltage_grid(unique_v[0], unique_v[unique_v.len() - 1], params.grid_points);
    let grid_values = grid.to_vec();
    let resampled = linear_interpolate(&unique_v, &unique_cap, &grid_values);

    let first = SavitzkyGolay::new("first smoothing", params.window_size_1, params.polyorder_1)?;
    let smooth_cap = first.apply(&resampled);

    let spline = fit_smoothing_spline(
        &grid_values,
        &smooth_cap,
        params.spline_order,
        params.spline_smoothing,
    )?;
    let derivative = spline.derivative();
    let mut dqdv: Vec<f64> = grid_values.iter().map(|v| derivative.evaluate(*v)).collect();

    if params.final_smooth {
        let second =
            SavitzkyGolay::new("second smoothing", params.window_size_2, params.polyorder_2)?;
        dqdv = second.apply(&dqdv);
    }

    Ok(DifferentialCurve {
        voltage: grid,
        dqdv: Array1::from_vec(dqdv),
        capacity: Array1::from_vec(smooth_cap),
    })
}

/// Group samples with identical voltage, averaging their capacity.
///
/// Returns (voltage, capacity) sorted by voltage. Non-finite pairs are dropped.
pub fn dedup_by_voltage(capacity: &[f64], voltage: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut pairs: Vec<(f64, f64)> = voltage
        .iter()
        .zip(capacity)
        .filter(|(v, c)| v.is_finite() && c.is_finite())
        .map(|(v, c)| (*v, *c))
        .collect();
    let dropped = voltage.len().min(capacity.len()) - pairs.len();
    if dropped > 0 {
        log::warn!("Dropped {dropped} non-finite (capacity, voltage) pairs before dQ/dV");
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut unique_v: Vec<f64> = Vec::new();
    let mut unique_cap: Vec<f64> = Vec::new();
    for group in pairs.chunk_by(|a, b| a.0 == b.0) {
        let mean = group.iter().map(|(_, c)| c).sum::<f64>() / group.len() as f64;
        unique_v.push(group[0].0);
        unique_cap.push(mean);
    }
    (unique_v, unique_cap)
}

/// Uniform grid of `n` points spanning exactly [start, end]
pub fn voltage_grid(start: f64, end: f64, n: usize) -> Array1<f64> {
    let mut grid = Array1::linspace(start, end, n);
    if n > 0 {
        grid[n - 1] = end;
    }
    grid
}
