//! # Plateau Core
//!
//! Core library for steady-state performance testing of storage devices.
//!
//! A test runs rounds of workload trials, extracts one dependent variable per
//! round, and stops once a sliding window of those values is both flat and
//! non-trending, or the round budget runs out.
//!
//! ## Modules
//!
//! - `workload`: Read/write mixes, block sizes and the standard test catalogue
//! - `measurement`: Per-trial records, per-round matrices and round history
//! - `collector`: Runs one round of trials through a [`TrialRunner`]
//! - `window`: Fixed-capacity window of the most recent rounds
//! - `steady`: Steady-state detection over a window
//! - `orchestrator`: The round loop and its state machine
//! - `array`: Parallel member operations and array recreation
//! - `target`: Device kinds and pre-test preparation
//! - `error`: Error types and result aliases
//! - `config`: Runtime configuration
//! - `settings`: Persistent user settings from configuration file
//!
//! ## Example
//!
//! ```ignore
//! use plateau_core::{Config, TestKind, TestOrchestrator};
//!
//! let config = Config::new().window_size(5).max_rounds(25);
//! let orchestrator = TestOrchestrator::new(TestKind::Iops, &config)?
//!     .on_round(|p| println!("round {}: {:.0}", p.round, p.value));
//!
//! let report = orchestrator.run(&mut fio_runner)?;
//! println!("{}", report.outcome.result());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod array;
pub mod collector;
pub mod config;
pub mod error;
pub mod measurement;
pub mod orchestrator;
pub mod settings;
pub mod steady;
pub mod target;
pub mod window;
pub mod workload;

pub use array::{
    ArrayController, ArrayMember, ArrayOperationOutcome, DeviceOperation, MemberOutcome,
    ParallelDeviceOperator, DEFAULT_POLL_INTERVAL, DEFAULT_READY_TIMEOUT,
};
pub use collector::{RoundMeasurementCollector, TrialRunner};
pub use config::{Config, DEFAULT_MAX_ROUNDS, DEFAULT_WINDOW_SIZE};
pub use error::{Error, OperationError, Result};
pub use measurement::{
    DirectionStats, LatencyTriple, MeasurementMatrix, MeasurementRecord, Metric, RoundHistory,
};
pub use orchestrator::{
    Outcome, RoundCallback, RoundProgress, State, TestOrchestrator, TestReport,
};
pub use settings::{
    ArraySettings, FioSettings, OutputSettings, Settings, SettingsError, SteadyStateSettings,
};
pub use steady::{
    ExcursionRule, SlopeSpan, SteadyStateCriteria, SteadyStateDetector, SteadyStateResult,
    DEFAULT_EXCURSION_PCT, DEFAULT_SLOPE_PCT,
};
pub use target::{prepare, ArraySpec, DeviceKind, DeviceOperations};
pub use window::SlidingWindow;
pub use workload::{
    parse_block_sizes, AccessPattern, BlockSize, DependentVariable, TestKind, WorkloadMix,
    MAX_BLOCK_SIZE, MIN_BLOCK_SIZE,
};
