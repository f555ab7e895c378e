use std::path::Path;
use std::sync::mpsc::Sender;

use rayon::prelude::*;

use super::adapter::Format;
use super::capacity::{CapacityMode, CapacityNormalizer};
use super::config::Config;
use super::dqdv::{dqdv_single_cycle, DqdvParams, HalfCycleCurve};
use super::error::{ConfigError, ErrorKind, ProcessorError};
use super::sample::Recording;
use super::state::StateSegmenter;
use super::summary::{CycleSummary, CycleSummaryAggregator};
use super::table::RawTable;
use super::worker_status::{Stage, WorkerStatus};
use super::writer::OutputWriter;

/// Number of stages reported over the progress channel
const N_STAGES: f32 = 6.0;

/// Everything derived from one input file
#[derive(Debug, Clone)]
pub struct Analysis {
    pub recording: Recording,
    /// None when the input was already canonical
    pub mode: Option<CapacityMode>,
    pub summary: Vec<CycleSummary>,
    pub curves: Vec<HalfCycleCurve>,
}

/// Read a delimited export. Tab separated for .txt and .tsv, comma separated otherwise.
pub fn load_table(path: &Path) -> Result<RawTable, ProcessorError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let delimiter = match extension.as_str() {
        "txt" | "tsv" => '\t',
        _ => ',',
    };
    if let Ok(metadata) = std::fs::metadata(path) {
        log::info!(
            "Reading {} with total size: {}",
            path.display(),
            human_bytes::human_bytes(metadata.len() as f64)
        );
    }
    Ok(RawTable::read_delimited(path, delimiter)?)
}

/// Translate a table into a segmented, capacity-normalized recording.
///
/// Canonical tables are passed through untouched.
pub fn build_recording(
    table: &RawTable,
    config: &Config,
) -> Result<(Recording, Option<CapacityMode>), ProcessorError> {
    let format = match config.format {
        Some(format) => format,
        None => Format::detect(&config.input_extension(), table)?,
    };
    log::info!("Input format is {format}.");
    let mut recording = format.translate(table, &config.adapter_options()?)?;
    if recording.canonical {
        return Ok((recording, None));
    }

    StateSegmenter::new(recording.state_rule).segment(&mut recording.samples)?;
    let mode = CapacityNormalizer::new().normalize(&mut recording.samples)?;
    Ok((recording, Some(mode)))
}

/// The half cycles holding at least one charge or discharge sample
pub fn active_half_cycles(recording: &Recording) -> Vec<u32> {
    let mut ids: Vec<u32> = recording
        .samples
        .iter()
        .filter(|s| !s.state.is_rest())
        .map(|s| s.half_cycle)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Compute dQ/dV curves for the given half cycles in parallel, in the order given
pub fn compute_dqdv_curves(
    recording: &Recording,
    half_cycles: &[u32],
    params: &DqdvParams,
) -> Result<Vec<HalfCycleCurve>, ProcessorError> {
    half_cycles
        .par_iter()
        .map(|half_cycle| curve_for(recording, *half_cycle, params))
        .collect()
}

fn curve_for(
    recording: &Recording,
    half_cycle: u32,
    params: &DqdvParams,
) -> Result<HalfCycleCurve, ProcessorError> {
    let (capacity, voltage) = recording.half_cycle_curve(half_cycle);
    let curve = dqdv_single_cycle(&capacity, &voltage, params)
        .map_err(|source| ProcessorError::DqdvError { half_cycle, source })?;
    Ok(HalfCycleCurve { half_cycle, curve })
}

/// Curves for every active half cycle. Half cycles too small to differentiate are skipped.
fn compute_default_curves(
    recording: &Recording,
    params: &DqdvParams,
) -> Result<Vec<HalfCycleCurve>, ProcessorError> {
    let results: Vec<Result<HalfCycleCurve, ProcessorError>> = active_half_cycles(recording)
        .par_iter()
        .map(|half_cycle| curve_for(recording, *half_cycle, params))
        .collect();
    let mut curves = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(curve) => curves.push(curve),
            Err(ProcessorError::DqdvError { half_cycle, source })
                if source.kind() == ErrorKind::InsufficientData =>
            {
                log::warn!("Skipping dQ/dV for half cycle {half_cycle}: {source}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(curves)
}

fn send(tx: &Sender<WorkerStatus>, step: f32, stage: Stage) -> Result<(), ProcessorError> {
    tx.send(WorkerStatus::new(step / N_STAGES, stage))?;
    Ok(())
}

/// Run the whole pipeline on a table: segment, normalize, summarize and differentiate.
///
/// Parallel work runs inside a local thread pool of `config.n_threads` threads.
pub fn analyze(
    table: &RawTable,
    config: &Config,
    tx: &Sender<WorkerStatus>,
) -> Result<Analysis, ProcessorError> {
    if !config.is_n_threads_valid() {
        return Err(ConfigError::BadThreadCount(config.n_threads).into());
    }
    // Fail on bad smoothing parameters before any work is done
    config.dqdv.validate().map_err(|source| ProcessorError::DqdvError {
        half_cycle: 0,
        source,
    })?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.n_threads as usize)
        .build()?;

    send(tx, 1.0, Stage::Segmenting)?;
    let (recording, mode) = build_recording(table, config)?;
    if let Some(mode) = mode {
        log::info!("Capacity computed in {mode:?} mode.");
    }

    send(tx, 2.0, Stage::Summarizing)?;
    let aggregator = CycleSummaryAggregator::new(config.summary_options());
    let summary = pool.install(|| aggregator.summarize(&recording.samples))?;

    send(tx, 3.0, Stage::Differentiating)?;
    let curves = pool.install(|| {
        if config.dqdv_half_cycles.is_empty() {
            compute_default_curves(&recording, &config.dqdv)
        } else {
            compute_dqdv_curves(&recording, &config.dqdv_half_cycles, &config.dqdv)
        }
    })?;
    log::info!("Computed {} dQ/dV curves.", curves.len());

    Ok(Analysis {
        recording,
        mode,
        summary,
        curves,
    })
}

/// The main entry point of cellcycle.
///
/// This takes in a config (and progress monitor), processes the input file and writes every
/// product to the output directory.
pub fn process(config: Config, tx: Sender<WorkerStatus>) -> Result<Analysis, ProcessorError> {
    send(&tx, 0.0, Stage::Loading)?;
    let table = load_table(&config.input_path)?;
    let analysis = analyze(&table, &config, &tx)?;

    send(&tx, 4.0, Stage::Writing)?;
    let writer = OutputWriter::new(&config)?;
    writer.write_canonical(&analysis.recording.samples)?;
    writer.write_summary(&analysis.summary)?;
    writer.write_dqdv(&analysis.curves)?;

    send(&tx, N_STAGES, Stage::Done)?;
    log::info!("Done with {}.", config.input_path.display());
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DqdvError;
    use crate::sample::State;
    use std::io::Write;
    use std::sync::mpsc::channel;

    fn small_params() -> DqdvParams {
        DqdvParams {
            window_size_1: 11,
            polyorder_1: 3,
            window_size_2: 21,
            polyorder_2: 3,
            grid_points: 200,
            ..Default::default()
        }
    }

    /// An Ivium style export: two hours of charge at 1 mA, then two of discharge
    fn write_ivium(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("cell_03.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "time /s\tI /mA\tE /V").unwrap();
        for i in 0..=100 {
            let t = i as f64 * 72.0;
            writeln!(file, "{t}\t1\t{}", 3.0 + 0.01 * i as f64).unwrap();
        }
        for i in 1..=100 {
            let t = 7200.0 + i as f64 * 72.0;
            writeln!(file, "{t}\t-1\t{}", 4.0 - 0.01 * i as f64).unwrap();
        }
        path
    }

    #[test]
    fn test_process_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            input_path: write_ivium(dir.path()),
            output_path: dir.path().join("out"),
            mass: Some(2.0),
            dqdv: small_params(),
            n_threads: 2,
            ..Default::default()
        };
        let (tx, rx) = channel();
        let analysis = process(config.clone(), tx).unwrap();

        assert_eq!(analysis.recording.format, Format::IviumText);
        assert_eq!(analysis.mode, Some(CapacityMode::CurrentIntegral));
        assert_eq!(analysis.summary.len(), 1);
        let cycle = &analysis.summary[0];
        // 100 steps of 72 s at 1 mA in each direction
        assert!((cycle.charge_capacity.unwrap() - 2.0).abs() < 1e-9);
        // The interval ending at the first discharge sample is not counted
        assert!((cycle.discharge_capacity.unwrap() - 1.98).abs() < 1e-9);
        assert_eq!(analysis.curves.len(), 2);
        assert_eq!(analysis.curves[0].half_cycle, 1);
        assert_eq!(analysis.curves[0].curve.len(), 200);
        // Capacity rises 0.02 mAh per 0.01 V
        let mid = analysis.curves[0].curve.dqdv[100];
        assert!((mid - 2.0).abs() < 0.1, "dQ/dV {mid}");

        assert!(config.get_canonical_file_name().exists());
        assert!(config.get_summary_file_name().exists());
        assert!(config
            .get_dqdv_directory()
            .join("half_cycle_2.csv")
            .exists());

        let statuses: Vec<WorkerStatus> = rx.try_iter().collect();
        assert_eq!(statuses.first().map(|s| s.stage), Some(Stage::Loading));
        assert_eq!(statuses.last().map(|s| s.progress), Some(1.0));
    }

    #[test]
    fn test_canonical_output_is_reprocessed_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            input_path: write_ivium(dir.path()),
            output_path: dir.path().join("out"),
            dqdv: small_params(),
            ..Default::default()
        };
        let (tx, _rx) = channel();
        let first = process(config.clone(), tx).unwrap();

        let table = load_table(&config.get_canonical_file_name()).unwrap();
        let second_config = Config {
            input_path: config.get_canonical_file_name(),
            ..config.clone()
        };
        let (recording, mode) = build_recording(&table, &second_config).unwrap();
        assert_eq!(mode, None);
        assert!(recording.canonical);
        assert_eq!(recording.len(), first.recording.len());
        for (a, b) in recording.samples.iter().zip(first.recording.samples.iter()) {
            assert_eq!(a.state, b.state);
            assert_eq!(a.half_cycle, b.half_cycle);
            assert_eq!(a.capacity, b.capacity);
        }
    }

    #[test]
    fn test_requested_half_cycle_errors_carry_the_half_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            input_path: write_ivium(dir.path()),
            dqdv: small_params(),
            dqdv_half_cycles: vec![1, 7],
            ..Default::default()
        };
        let table = load_table(&config.input_path).unwrap();
        let (tx, _rx) = channel();
        match analyze(&table, &config, &tx) {
            Err(ProcessorError::DqdvError {
                half_cycle,
                source: DqdvError::TooFewVoltages(0),
            }) => assert_eq!(half_cycle, 7),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_invalid_configuration() {
        let table = RawTable::parse_delimited("time /s\tI /mA\tE /V\n0\t1\t3\n", '\t').unwrap();
        let (tx, _rx) = channel();
        let config = Config {
            n_threads: 0,
            ..Default::default()
        };
        assert!(matches!(
            analyze(&table, &config, &tx),
            Err(ProcessorError::ConfigError(ConfigError::BadThreadCount(0)))
        ));

        let config = Config {
            format: Some(Format::IviumText),
            dqdv: DqdvParams {
                window_size_1: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = analyze(&table, &config, &tx).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidParameter));
    }

    #[test]
    fn test_active_half_cycles_skip_rest() {
        let contents = "Index,Current/mA,Voltage/V,Capacity/mAh\n1,0,3,0\n2,1,3.1,0.1\n3,-1,3.0,0.1\n";
        let table = RawTable::parse_delimited(contents, ',').unwrap();
        let config = Config {
            format: Some(Format::LandOld),
            ..Default::default()
        };
        let (recording, _) = build_recording(&table, &config).unwrap();
        assert_eq!(recording.samples[0].state, State::Rest);
        assert_eq!(active_half_cycles(&recording), vec![1, 2]);
    }
}
