use super::error::StateError;
use super::sample::{full_cycle_of, Sample, State};

/// Maps the sign of a classifying value onto a state.
///
/// Which sign means charge is a property of the instrument, so each adapter supplies its
/// own convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignConvention {
    pub positive: State,
    pub negative: State,
    pub zero: State,
}

impl SignConvention {
    /// Positive current charges the cell, zero current is rest
    pub const POSITIVE_CHARGE: Self = Self {
        positive: State::Charge,
        negative: State::Discharge,
        zero: State::Rest,
    };

    /// Ivium files have no rest state; zero current is grouped with positive current
    pub const NO_REST: Self = Self {
        positive: State::Charge,
        negative: State::Discharge,
        zero: State::Charge,
    };

    /// Classify a value by its sign. NaN has no sign and yields None.
    pub fn classify(&self, value: f64) -> Option<State> {
        if value > 0.0 {
            Some(self.positive)
        } else if value < 0.0 {
            Some(self.negative)
        } else if value == 0.0 {
            Some(self.zero)
        } else {
            None
        }
    }
}

impl Default for SignConvention {
    fn default() -> Self {
        Self::POSITIVE_CHARGE
    }
}

/// How the StateSegmenter decides the state of each sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRule {
    /// Sign of the sample current
    Current(SignConvention),
    /// Sign of the voltage change from the previous sample; the first sample is a rest
    VoltageDelta(SignConvention),
    /// The adapter already assigned states from instrument labels
    Labelled,
}

impl Default for StateRule {
    fn default() -> Self {
        Self::Current(SignConvention::default())
    }
}

/// StateSegmenter classifies each sample and assigns half and full cycle indices in a
/// single ordered pass.
#[derive(Debug, Clone, Default)]
pub struct StateSegmenter {
    rule: StateRule,
}

impl StateSegmenter {
    pub fn new(rule: StateRule) -> Self {
        Self { rule }
    }

    /// Classify and segment the samples in place
    pub fn segment(&self, samples: &mut [Sample]) -> Result<(), StateError> {
        match self.rule {
            StateRule::Current(convention) => {
                for sample in samples.iter_mut() {
                    let current = sample.current.ok_or(StateError::MissingCurrent {
                        index: sample.index,
                    })?;
                    sample.state =
                        convention
                            .classify(current)
                            .ok_or(StateError::InvalidCurrent {
                                index: sample.index,
                                value: current,
                            })?;
                }
            }
            StateRule::VoltageDelta(convention) => {
                let mut previous: Option<f64> = None;
                for sample in samples.iter_mut() {
                    let delta = match previous {
                        Some(v) => sample.voltage - v,
                        None => 0.0,
                    };
                    sample.state =
                        convention
                            .classify(delta)
                            .ok_or(StateError::InvalidVoltageDelta {
                                index: sample.index,
                                value: delta,
                            })?;
                    previous = Some(sample.voltage);
                }
            }
            StateRule::Labelled => (),
        }
        assign_half_cycles(samples);
        log::info!(
            "Segmented {} samples into {} half cycles.",
            samples.len(),
            samples.last().map(|s| s.half_cycle).unwrap_or(0)
        );
        Ok(())
    }
}

/// Count state transitions over the non-rest samples.
///
/// Rest samples keep the half cycle of the last non-rest sample, or 0 before the first one.
pub fn assign_half_cycles(samples: &mut [Sample]) {
    let mut last_active: Option<State> = None;
    let mut half_cycle: u32 = 0;
    for sample in samples.iter_mut() {
        if !sample.state.is_rest() {
            if last_active != Some(sample.state) {
                half_cycle += 1;
            }
            last_active = Some(sample.state);
        }
        sample.half_cycle = half_cycle;
        sample.full_cycle = full_cycle_of(half_cycle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::ChargeReading;
    use proptest::prelude::*;

    fn current_samples(currents: &[f64]) -> Vec<Sample> {
        currents
            .iter()
            .enumerate()
            .map(|(i, c)| Sample::new(i as u64, 3.5, ChargeReading::Current).with_current(*c))
            .collect()
    }

    #[test]
    fn test_rest_carries_previous_half_cycle() {
        let mut samples = current_samples(&[-1.0, -1.0, 0.0, 0.0, 1.0, 1.0]);
        StateSegmenter::default().segment(&mut samples).unwrap();
        let halves: Vec<u32> = samples.iter().map(|s| s.half_cycle).collect();
        assert_eq!(halves, vec![1, 1, 1, 1, 2, 2]);
        let states: Vec<State> = samples.iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![
                State::Discharge,
                State::Discharge,
                State::Rest,
                State::Rest,
                State::Charge,
                State::Charge
            ]
        );
    }

    #[test]
    fn test_leading_rest_is_half_cycle_zero() {
        let mut samples = current_samples(&[0.0, 0.0, 2.0, 0.0, 2.0, -2.0]);
        StateSegmenter::default().segment(&mut samples).unwrap();
        let halves: Vec<u32> = samples.iter().map(|s| s.half_cycle).collect();
        // Same state on both sides of a rest is not a transition
        assert_eq!(halves, vec![0, 0, 1, 1, 1, 2]);
        let fulls: Vec<u32> = samples.iter().map(|s| s.full_cycle).collect();
        assert_eq!(fulls, vec![0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_nan_current_is_invalid_sign() {
        let mut samples = current_samples(&[1.0, f64::NAN]);
        match StateSegmenter::default().segment(&mut samples) {
            Err(StateError::InvalidCurrent { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_missing_current() {
        let mut samples = vec![Sample::new(7, 3.0, ChargeReading::Current)];
        match StateSegmenter::default().segment(&mut samples) {
            Err(StateError::MissingCurrent { index }) => assert_eq!(index, 7),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_voltage_delta_fallback() {
        let voltages = [3.0, 3.1, 3.2, 3.2, 3.1, 3.0];
        let mut samples: Vec<Sample> = voltages
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::new(i as u64, *v, ChargeReading::Cumulative(0.0)))
            .collect();
        let segmenter = StateSegmenter::new(StateRule::VoltageDelta(SignConvention::default()));
        segmenter.segment(&mut samples).unwrap();
        let states: Vec<State> = samples.iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![
                State::Rest,
                State::Charge,
                State::Charge,
                State::Rest,
                State::Discharge,
                State::Discharge
            ]
        );
        let halves: Vec<u32> = samples.iter().map(|s| s.half_cycle).collect();
        assert_eq!(halves, vec![0, 1, 1, 1, 2, 2]);
    }

    #[test]
    fn test_no_rest_convention() {
        let mut samples = current_samples(&[0.0, 1.0, -1.0, 0.0]);
        let segmenter = StateSegmenter::new(StateRule::Current(SignConvention::NO_REST));
        segmenter.segment(&mut samples).unwrap();
        let halves: Vec<u32> = samples.iter().map(|s| s.half_cycle).collect();
        assert_eq!(halves, vec![1, 1, 2, 3]);
    }

    #[test]
    fn test_labelled_keeps_states() {
        let mut samples: Vec<Sample> = [State::Rest, State::Discharge, State::Charge]
            .iter()
            .enumerate()
            .map(|(i, st)| Sample::new(i as u64, 3.0, ChargeReading::Current).with_state(*st))
            .collect();
        StateSegmenter::new(StateRule::Labelled)
            .segment(&mut samples)
            .unwrap();
        assert_eq!(samples[1].state, State::Discharge);
        assert_eq!(samples[2].half_cycle, 2);
    }

    proptest! {
        #[test]
        fn prop_segmentation_invariants(signs in proptest::collection::vec(-1i8..=1, 1..200)) {
            let currents: Vec<f64> = signs.iter().map(|s| *s as f64 * 0.5).collect();
            let mut samples = current_samples(&currents);
            StateSegmenter::default().segment(&mut samples).unwrap();

            let mut last_active: Option<State> = None;
            let mut previous_half = 0u32;
            for (sample, current) in samples.iter().zip(currents.iter()) {
                prop_assert_eq!(sample.state.is_rest(), *current == 0.0);
                prop_assert_eq!(sample.full_cycle, sample.half_cycle.div_ceil(2));
                let transition = !sample.state.is_rest() && last_active != Some(sample.state);
                let step = sample.half_cycle - previous_half;
                prop_assert_eq!(step, transition as u32);
                if !sample.state.is_rest() {
                    last_active = Some(sample.state);
                }
                previous_half = sample.half_cycle;
            }
        }
    }
}
