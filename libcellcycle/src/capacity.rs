use super::error::CapacityError;
use super::sample::{ChargeReading, Sample};

/// Which charge signal the capacity was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityMode {
    /// Sum of dual cumulative counters, rebased at each half cycle
    DualCounter,
    /// Integrated instantaneous current
    CurrentIntegral,
    /// Summed per-sample charge increments
    Increment,
    /// Single cumulative signal, rebased at each half cycle
    Cumulative,
    /// Instrument already resets at each half cycle
    HalfCycle,
}

/// How each half cycle is brought to start from zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    /// Subtract the value at the first non-rest sample of the half cycle
    FirstActive,
    /// Running sum of absolute values, restarted at the first sample of the half cycle.
    ///
    /// The first sample's own increment is dropped: it covers the interval ending at that
    /// sample, which belongs to the previous half cycle. A half cycle therefore never counts
    /// the charge passed between the last sample of the previous half cycle and its own first
    /// sample.
    RestartSum,
    /// Absolute value, no rebasing
    Absolute,
}

/// CapacityNormalizer computes the half-cycle-zeroed capacity of every sample.
///
/// Requires the samples to have been segmented first.
#[derive(Debug, Clone, Default)]
pub struct CapacityNormalizer;

impl CapacityNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Fill `capacity` on every sample. Returns the mode that was used.
    pub fn normalize(&self, samples: &mut [Sample]) -> Result<CapacityMode, CapacityError> {
        let first = samples.first().ok_or(CapacityError::NoSamples)?;
        let (reference, first_index) = (first.charge, first.index);
        for sample in samples.iter() {
            if !sample.charge.same_shape(&reference) {
                return Err(CapacityError::MixedSignal {
                    index: sample.index,
                    expected: reference.shape(),
                    found: sample.charge.shape(),
                });
            }
        }

        let (mode, values, baseline) = match reference {
            ChargeReading::Counters { .. } => (
                CapacityMode::DualCounter,
                collect_values(samples, |c| match c {
                    ChargeReading::Counters { discharge, charge } => discharge + charge,
                    _ => f64::NAN,
                }),
                Baseline::FirstActive,
            ),
            ChargeReading::Current => (
                CapacityMode::CurrentIntegral,
                current_increments(samples)?,
                Baseline::RestartSum,
            ),
            ChargeReading::Increment(_) => (
                CapacityMode::Increment,
                collect_values(samples, |c| match c {
                    ChargeReading::Increment(dq) => dq,
                    _ => f64::NAN,
                }),
                Baseline::RestartSum,
            ),
            ChargeReading::Cumulative(_) => (
                CapacityMode::Cumulative,
                collect_values(samples, |c| match c {
                    ChargeReading::Cumulative(q) => q,
                    _ => f64::NAN,
                }),
                Baseline::FirstActive,
            ),
            ChargeReading::HalfCycle(_) => (
                CapacityMode::HalfCycle,
                collect_values(samples, |c| match c {
                    ChargeReading::HalfCycle(q) => q,
                    _ => f64::NAN,
                }),
                Baseline::Absolute,
            ),
            ChargeReading::Missing => {
                return Err(CapacityError::NoChargeSignal { index: first_index })
            }
        };

        rebase_half_cycles(samples, &values, baseline);
        log::info!("Normalized capacity of {} samples using {:?} mode.", samples.len(), mode);
        Ok(mode)
    }
}

fn collect_values(samples: &[Sample], value: impl Fn(ChargeReading) -> f64) -> Vec<f64> {
    samples.iter().map(|s| value(s.charge)).collect()
}

/// dq[i] = current[i] * (time[i] - time[i-1]) / 3600, with dq[0] = 0
fn current_increments(samples: &[Sample]) -> Result<Vec<f64>, CapacityError> {
    let mut increments = Vec::with_capacity(samples.len());
    let mut previous_time: Option<f64> = None;
    for sample in samples {
        let current = sample.current.ok_or(CapacityError::MissingField {
            index: sample.index,
            field: "current",
        })?;
        let time = sample.time.ok_or(CapacityError::MissingField {
            index: sample.index,
            field: "time",
        })?;
        let dt = previous_time.map(|t| time - t).unwrap_or(0.0);
        increments.push(current * dt / 3600.0);
        previous_time = Some(time);
    }
    Ok(increments)
}

/// Write the capacity of each half cycle from `values` according to the baseline policy.
///
/// Half cycles are contiguous runs of the segmented samples. A half cycle with no non-rest
/// sample keeps its values un-rebased under `FirstActive`.
pub fn rebase_half_cycles(samples: &mut [Sample], values: &[f64], baseline: Baseline) {
    let mut start = 0;
    for run in samples.chunk_by_mut(|a, b| a.half_cycle == b.half_cycle) {
        let run_values = &values[start..start + run.len()];
        start += run.len();
        match baseline {
            Baseline::FirstActive => {
                let offset = run
                    .iter()
                    .position(|s| !s.state.is_rest())
                    .map(|i| run_values[i])
                    .unwrap_or(0.0);
                for (sample, value) in run.iter_mut().zip(run_values) {
                    sample.capacity = value - offset;
                }
            }
            Baseline::RestartSum => {
                let mut total = 0.0;
                for (i, (sample, value)) in run.iter_mut().zip(run_values).enumerate() {
                    // The boundary sample's increment belongs to the interval it closes
                    if i > 0 {
                        total += value.abs();
                    }
                    sample.capacity = total;
                }
            }
            Baseline::Absolute => {
                for (sample, value) in run.iter_mut().zip(run_values) {
                    sample.capacity = value.abs();
                }
            }
        }
    }
}
