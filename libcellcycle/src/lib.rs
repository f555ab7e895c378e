//! # cellcycle
//!
//! cellcycle turns the raw time series written by battery cyclers into a single annotated
//! table, a per-cycle summary, and differential capacity (dQ/dV) curves. Each instrument
//! vendor writes its own column layout, sign convention and capacity bookkeeping;
//! cellcycle maps every one of them onto one canonical schema before doing any analysis,
//! so the analysis stages never know where the data came from.
//!
//! ## Installation
//!
//! The only method of install is from source, which is laid out below.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./cellcycle_cli` from the top
//! level cellcycle repository. The binary will be installed to your cargo install location
//! (typically something like `~/.cargo/bin/`).
//!
//! ## Input
//!
//! cellcycle reads delimited text tables: comma separated by default, tab separated for
//! `.txt` and `.tsv` files. Vendor binary files (Biologic `.mpr`, Arbin `.res`, Neware
//! `.nda`) must be exported or decoded to a table first; the extension (or the `format`
//! field of the configuration) still selects how the columns are interpreted. Supported
//! layouts are:
//!
//! - `BiologicBinary`: `Ewe/V`, `time/s` and one of `Q charge/discharge/mA.h`, `dQ/mA.h`
//!   or `(Q-Qo)/C`
//! - `ArbinDatabase` and `ArbinSpreadsheet`: `Voltage`/`Voltage(V)`, `Current`/`Current(A)`
//!   and the `Charge_Capacity`/`Discharge_Capacity` counters
//! - `LandNew` and `LandOld`: `Voltage/V`, `Current/mA`, `Capacity/mAh`
//! - `IviumText`: `time /s`, `I /mA`, `E /V`
//! - `NewareBinary`: `Status` labels with `Current(mA)`, `Voltage` and the capacity counters
//! - `PreNormalizedTable`: a table previously written by cellcycle
//!
//! ## Configuration
//!
//! The CLI is driven by a YAML configuration file. A template can be generated with
//! `cellcycle_cli new -p config.yml`, and processing is run with
//! `cellcycle_cli -p config.yml`. The format is as follows:
//!
//! ```yml
//! input_path: /data/cell_01.csv
//! output_path: /data/out
//! format: null
//! capacity_unit: mAh
//! mass: null
//! area: null
//! dqdv:
//!   spline_order: 3
//!   spline_smoothing: 1.0e-5
//!   window_size_1: 101
//!   polyorder_1: 5
//!   window_size_2: 1001
//!   polyorder_2: 5
//!   final_smooth: true
//!   grid_points: 10000
//! dqdv_half_cycles: []
//! n_threads: 1
//! ```
//!
//! - `format`: forces an input layout (see the list above). When `null` the layout is
//!   detected from the extension and the column names.
//! - `capacity_unit`: unit the instrument wrote its capacity counters in, `mAh` or `Ah`.
//! - `mass` and `area`: when set, specific (per gram) and areal (per cm²) values are added
//!   to the outputs.
//! - `dqdv`: tuning of the dQ/dV pipeline. Any field left out takes the default shown above.
//!   Window sizes must be odd, larger than their polynomial order and no larger than
//!   `grid_points`.
//! - `dqdv_half_cycles`: half cycles to compute dQ/dV for. Empty means every charge and
//!   discharge half cycle; half cycles with too little data are then skipped with a warning.
//! - `n_threads`: size of the thread pool used for the summary and dQ/dV stages. Must be at
//!   least 1.
//!
//! ## Output
//!
//! Given an input `cell_01.csv`, the following are written to `output_path`:
//!
//! ```text
//! cell_01_canonical.csv - index, Time, state, half cycle, full cycle, Capacity, Voltage, Current
//! cell_01_summary.yml   - one entry per full cycle (UCV, LCV, capacities, CE, average voltages)
//! cell_01_dqdv/
//! |---- half_cycle_#.csv - Voltage, dQ/dV, Capacity
//! ```
//!
//! The canonical table can be fed back in as an input; it is recognized as
//! `PreNormalizedTable` and processed without renormalizing its capacity.
//!
//! States are written as `R` (rest), `0` (charge) and `1` (discharge). Half cycles are
//! numbered from 1 at every change of active state, and each full cycle spans two half
//! cycles. Rest before the first active sample belongs to cycle 0.
pub mod adapter;
pub mod capacity;
pub mod config;
pub mod dqdv;
pub mod error;
pub mod process;
pub mod sample;
pub mod state;
pub mod summary;
pub mod table;
pub mod worker_status;
pub mod writer;
