use super::adapter::Format;
use super::state::StateRule;

// Canonical column names. A table carrying all of these is already normalized.
pub const INDEX_COLUMN: &str = "index";
pub const TIME_COLUMN: &str = "Time";
pub const STATE_COLUMN: &str = "state";
pub const HALF_CYCLE_COLUMN: &str = "half cycle";
pub const FULL_CYCLE_COLUMN: &str = "full cycle";
pub const CAPACITY_COLUMN: &str = "Capacity";
pub const VOLTAGE_COLUMN: &str = "Voltage";
pub const CURRENT_COLUMN: &str = "Current";

pub const CANONICAL_COLUMNS: [&str; 6] = [
    CAPACITY_COLUMN,
    VOLTAGE_COLUMN,
    HALF_CYCLE_COLUMN,
    FULL_CYCLE_COLUMN,
    CURRENT_COLUMN,
    STATE_COLUMN,
];

/// Electrochemical state of a single sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    #[default]
    Rest,
    Charge,
    Discharge,
}

impl State {
    /// The label used in the canonical table: R for rest, 0 for charge, 1 for discharge
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rest => "R",
            Self::Charge => "0",
            Self::Discharge => "1",
        }
    }

    /// Parse a canonical state label. Numeric labels may carry a decimal part ("1.0").
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label == "R" {
            return Some(Self::Rest);
        }
        match label.parse::<f64>() {
            Ok(v) if v == 0.0 => Some(Self::Charge),
            Ok(v) if v == 1.0 => Some(Self::Discharge),
            _ => None,
        }
    }

    pub fn is_rest(&self) -> bool {
        *self == Self::Rest
    }
}

/// The raw charge signal recorded alongside a sample. Which variant is present decides
/// how the capacity is normalized.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ChargeReading {
    #[default]
    Missing,
    /// Monotonic cumulative counters (mAh); only one of the pair moves at a time
    Counters { discharge: f64, charge: f64 },
    /// Capacity is integrated from the sample's instantaneous current and time
    Current,
    /// Charge passed since the previous sample (mAh)
    Increment(f64),
    /// A single cumulative charge signal (mAh)
    Cumulative(f64),
    /// Capacity already reset by the instrument at each half cycle (mAh)
    HalfCycle(f64),
}

impl ChargeReading {
    /// Short name of the signal shape, used in error messages
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Counters { .. } => "dual counter",
            Self::Current => "current",
            Self::Increment(_) => "increment",
            Self::Cumulative(_) => "cumulative",
            Self::HalfCycle(_) => "half cycle",
        }
    }

    pub fn same_shape(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// One instrument reading.
///
/// The adapter fills the raw fields; `state`, `half_cycle`, `full_cycle` and `capacity` are
/// filled in place by the StateSegmenter and CapacityNormalizer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    pub index: u64,
    pub time: Option<f64>,
    pub current: Option<f64>,
    pub voltage: f64,
    pub charge: ChargeReading,
    pub state: State,
    pub half_cycle: u32,
    pub full_cycle: u32,
    pub capacity: f64,
}

impl Sample {
    pub fn new(index: u64, voltage: f64, charge: ChargeReading) -> Self {
        Self {
            index,
            voltage,
            charge,
            ..Default::default()
        }
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_current(mut self, current: f64) -> Self {
        self.current = Some(current);
        self
    }

    pub fn with_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }
}

/// Full cycle index for a half cycle index, ceil(half / 2)
pub fn full_cycle_of(half_cycle: u32) -> u32 {
    half_cycle.div_ceil(2)
}

/// The ordered sample table produced by an adapter, together with how its states are to be
/// classified.
#[derive(Debug, Clone)]
pub struct Recording {
    pub format: Format,
    pub state_rule: StateRule,
    pub samples: Vec<Sample>,
    /// The table was already canonical; segmentation and normalization are skipped
    pub canonical: bool,
}

impl Recording {
    pub fn new(format: Format, state_rule: StateRule, samples: Vec<Sample>) -> Self {
        Self {
            format,
            state_rule,
            samples,
            canonical: false,
        }
    }

    /// The distinct half cycle ids, in order
    pub fn half_cycles(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.samples.iter().map(|s| s.half_cycle).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// The (capacity, voltage) columns of one half cycle
    pub fn half_cycle_curve(&self, half_cycle: u32) -> (Vec<f64>, Vec<f64>) {
        self.samples
            .iter()
            .filter(|s| s.half_cycle == half_cycle)
            .map(|s| (s.capacity, s.voltage))
            .unzip()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_labels() {
        for state in [State::Rest, State::Charge, State::Discharge] {
            assert_eq!(State::from_label(state.label()), Some(state));
        }
        assert_eq!(State::from_label("1.0"), Some(State::Discharge));
        assert_eq!(State::from_label(" 0 "), Some(State::Charge));
        assert_eq!(State::from_label("2"), None);
        assert_eq!(State::from_label("rest"), None);
    }

    #[test]
    fn test_full_cycle_is_ceil_half() {
        let expected = [0, 1, 1, 2, 2, 3];
        for (half, full) in expected.iter().enumerate() {
            assert_eq!(full_cycle_of(half as u32), *full);
        }
    }

    #[test]
    fn test_half_cycle_curve() {
        let mut samples = Vec::new();
        for i in 0..6u64 {
            let mut s = Sample::new(i, 3.0 + i as f64, ChargeReading::Current);
            s.half_cycle = (i / 3) as u32;
            s.capacity = i as f64;
            samples.push(s);
        }
        let rec = Recording::new(Format::IviumText, StateRule::default(), samples);
        assert_eq!(rec.half_cycles(), vec![0, 1]);
        let (cap, volt) = rec.half_cycle_curve(1);
        assert_eq!(cap, vec![3.0, 4.0, 5.0]);
        assert_eq!(volt, vec![6.0, 7.0, 8.0]);
    }
}
