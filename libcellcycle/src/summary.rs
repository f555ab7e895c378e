use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::SummaryError;
use super::sample::{full_cycle_of, Sample, State};

/// Optional normalization factors for the specific columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryOptions {
    /// Active material mass
    pub mass: Option<f64>,
    /// Electrode area
    pub area: Option<f64>,
}

impl SummaryOptions {
    pub fn validate(&self) -> Result<(), SummaryError> {
        for (name, factor) in [("mass", self.mass), ("area", self.area)] {
            if let Some(value) = factor {
                if !value.is_finite() || value <= 0.0 {
                    return Err(SummaryError::BadFactor { name, value });
                }
            }
        }
        Ok(())
    }
}

/// Statistics of one full cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    #[serde(rename = "full cycle")]
    pub full_cycle: u32,
    /// Mean current over the cycle, when every sample recorded one
    #[serde(rename = "Current", skip_serializing_if = "Option::is_none")]
    pub mean_current: Option<f64>,
    #[serde(rename = "UCV")]
    pub ucv: f64,
    #[serde(rename = "LCV")]
    pub lcv: f64,
    #[serde(rename = "Discharge Capacity")]
    pub discharge_capacity: Option<f64>,
    #[serde(rename = "Charge Capacity")]
    pub charge_capacity: Option<f64>,
    /// Charge / Discharge, propagated as-is when the discharge capacity is zero
    #[serde(rename = "CE")]
    pub ce: Option<f64>,
    #[serde(
        rename = "Specific Discharge Capacity",
        skip_serializing_if = "Option::is_none"
    )]
    pub specific_discharge_capacity: Option<f64>,
    #[serde(
        rename = "Specific Charge Capacity",
        skip_serializing_if = "Option::is_none"
    )]
    pub specific_charge_capacity: Option<f64>,
    #[serde(
        rename = "Specific Discharge Capacity (Area)",
        skip_serializing_if = "Option::is_none"
    )]
    pub areal_discharge_capacity: Option<f64>,
    #[serde(
        rename = "Specific Charge Capacity (Area)",
        skip_serializing_if = "Option::is_none"
    )]
    pub areal_charge_capacity: Option<f64>,
    #[serde(rename = "Average Discharge Voltage")]
    pub average_discharge_voltage: Option<f64>,
    #[serde(rename = "Average Charge Voltage")]
    pub average_charge_voltage: Option<f64>,
}

/// CycleSummaryAggregator reduces a segmented, normalized sample stream into one row per
/// full cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleSummaryAggregator {
    options: SummaryOptions,
}

impl CycleSummaryAggregator {
    pub fn new(options: SummaryOptions) -> Self {
        Self { options }
    }

    pub fn summarize(&self, samples: &[Sample]) -> Result<Vec<CycleSummary>, SummaryError> {
        self.options.validate()?;
        if samples.is_empty() {
            return Err(SummaryError::NoSamples);
        }

        let full_cycles = group_by(samples, |s| s.full_cycle);
        let half_cycles = group_by(samples, |s| s.half_cycle);

        let mut summaries: Vec<CycleSummary> = full_cycles
            .par_iter()
            .map(|(cycle, rows)| self.reduce_cycle(*cycle, samples, rows))
            .collect();

        // (full cycle, state, average voltage) for every half cycle holding an active state
        let averages: Vec<(u32, State, f64)> = half_cycles
            .par_iter()
            .flat_map_iter(|(half, rows)| {
                let average = average_voltage(samples, rows);
                [State::Discharge, State::Charge]
                    .into_iter()
                    .filter(|state| rows.iter().any(|r| samples[*r].state == *state))
                    .map(move |state| (full_cycle_of(*half), state, average))
                    .collect::<Vec<_>>()
            })
            .collect();
        // Half cycles are in ascending order, so a later one of the same kind wins
        for (cycle, state, average) in averages {
            if let Some(summary) = summaries.iter_mut().find(|s| s.full_cycle == cycle) {
                match state {
                    State::Discharge => summary.average_discharge_voltage = Some(average),
                    State::Charge => summary.average_charge_voltage = Some(average),
                    State::Rest => (),
                }
            }
        }

        log::info!("Summarized {} full cycles.", summaries.len());
        Ok(summaries)
    }

    fn reduce_cycle(&self, full_cycle: u32, samples: &[Sample], rows: &[usize]) -> CycleSummary {
        let cycle = || rows.iter().map(|r| &samples[*r]);
        let ucv = cycle().map(|s| s.voltage).fold(f64::NEG_INFINITY, f64::max);
        let lcv = cycle().map(|s| s.voltage).fold(f64::INFINITY, f64::min);
        let max_capacity = |state: State| {
            cycle()
                .filter(|s| s.state == state)
                .map(|s| s.capacity)
                .reduce(f64::max)
        };
        let discharge = max_capacity(State::Discharge);
        let charge = max_capacity(State::Charge);
        let ce = match (charge, discharge) {
            (Some(c), Some(d)) => Some(c / d),
            _ => None,
        };
        let mean_current = cycle()
            .map(|s| s.current)
            .collect::<Option<Vec<f64>>>()
            .map(|currents| currents.iter().sum::<f64>() / currents.len() as f64);
        let per = |value: Option<f64>, factor: Option<f64>| match (value, factor) {
            (Some(v), Some(f)) => Some(v / f),
            _ => None,
        };

        CycleSummary {
            full_cycle,
            mean_current,
            ucv,
            lcv,
            discharge_capacity: discharge,
            charge_capacity: charge,
            ce,
            specific_discharge_capacity: per(discharge, self.options.mass),
            specific_charge_capacity: per(charge, self.options.mass),
            areal_discharge_capacity: per(discharge, self.options.area),
            areal_charge_capacity: per(charge, self.options.area),
            average_discharge_voltage: None,
            average_charge_voltage: None,
        }
    }
}

/// Row positions grouped by a cycle key, in ascending key order
fn group_by(samples: &[Sample], key: impl Fn(&Sample) -> u32) -> Vec<(u32, Vec<usize>)> {
    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (row, sample) in samples.iter().enumerate() {
        groups.entry(key(sample)).or_default().push(row);
    }
    groups.into_iter().collect()
}

/// Trapezoid integral of voltage over capacity, divided by the largest capacity
fn average_voltage(samples: &[Sample], rows: &[usize]) -> f64 {
    let mut integral = 0.0;
    let mut max_capacity = f64::NEG_INFINITY;
    let mut previous: Option<&Sample> = None;
    for sample in rows.iter().map(|r| &samples[*r]) {
        if let Some(p) = previous {
            integral += 0.5 * (sample.voltage + p.voltage) * (sample.capacity - p.capacity);
        }
        max_capacity = max_capacity.max(sample.capacity);
        previous = Some(sample);
    }
    integral / max_capacity
}
