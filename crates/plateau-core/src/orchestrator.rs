//! The steady-state round loop.
//!
//! [`TestOrchestrator`] is a small state machine:
//!
//! ```text
//! Init -> RoundInProgress -> WindowCheck -> RoundInProgress ...
//!                                        \-> Steady
//!                                        \-> RoundsExhausted
//! ```
//!
//! Each round runs the full workload grid, appends the matrix to the round
//! history and pushes the dependent variable into the measurement window.
//! Once the window is full every round is followed by a steady-state check.
//! A failing trial aborts the whole run.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::collector::{RoundMeasurementCollector, TrialRunner};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::measurement::{MeasurementMatrix, RoundHistory};
use crate::steady::{SteadyStateDetector, SteadyStateResult};
use crate::window::SlidingWindow;
use crate::workload::{BlockSize, DependentVariable, TestKind, WorkloadMix};

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "round")]
pub enum State {
    /// Configuration validated, no round started
    Init,
    /// The given round is next to run
    RoundInProgress(usize),
    /// The window is full after the given round and is next to be checked
    WindowCheck(usize),
    /// Steady state reached (terminal)
    Steady,
    /// Round budget spent without steady state (terminal)
    RoundsExhausted,
    /// A round failed; the run cannot continue (terminal)
    Failed,
}

impl State {
    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Steady | Self::RoundsExhausted | Self::Failed)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::RoundInProgress(r) => write!(f, "round {r} in progress"),
            Self::WindowCheck(r) => write!(f, "window check after round {r}"),
            Self::Steady => write!(f, "steady"),
            Self::RoundsExhausted => write!(f, "rounds exhausted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "verdict", content = "result")]
pub enum Outcome {
    /// Steady state was reached; the result describes the stable window
    Steady(SteadyStateResult),
    /// The round budget ran out; the result is the last (failed) check
    RoundsExhausted(SteadyStateResult),
}

impl Outcome {
    /// Whether the run converged
    pub fn is_steady(&self) -> bool {
        matches!(self, Self::Steady(_))
    }

    /// The steady-state result carried by either outcome
    pub fn result(&self) -> &SteadyStateResult {
        match self {
            Self::Steady(r) | Self::RoundsExhausted(r) => r,
        }
    }
}

/// Progress information emitted after each round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundProgress {
    /// Round just completed (0-based)
    pub round: usize,
    /// Round budget
    pub max_rounds: usize,
    /// Dependent variable value of this round
    pub value: f64,
    /// Entries in the window after this round
    pub window_len: usize,
    /// Window capacity
    pub window_capacity: usize,
    /// Steady-state verdict if the window was checked after this round
    pub verdict: Option<bool>,
}

/// Progress callback type
pub type RoundCallback = Box<dyn Fn(&RoundProgress) + Send + Sync>;

/// Everything a finished run hands to reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReport {
    /// Test that was run
    pub test: TestKind,
    /// The tracked grid cell
    pub dependent_variable: DependentVariable,
    /// Steady or exhausted, with the window result
    pub outcome: Outcome,
    /// All round matrices
    pub history: RoundHistory,
}

impl TestReport {
    /// Number of rounds executed
    pub fn rounds_run(&self) -> usize {
        self.history.len()
    }

    /// Round matrices covered by the final window
    pub fn window_rounds(&self) -> &[MeasurementMatrix] {
        let rounds = &self.outcome.result().rounds;
        match (rounds.first(), rounds.last()) {
            (Some(&first), Some(&last)) => self.history.range(first, last + 1),
            _ => &[],
        }
    }

    /// Pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Drives rounds until steady state or the round budget is reached
pub struct TestOrchestrator {
    test: TestKind,
    collector: RoundMeasurementCollector,
    dependent: DependentVariable,
    detector: SteadyStateDetector,
    max_rounds: usize,
    state: State,
    window: SlidingWindow,
    history: RoundHistory,
    outcome: Option<Outcome>,
    round_callback: Option<RoundCallback>,
    cancel_flag: Arc<AtomicBool>,
}

impl fmt::Debug for TestOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestOrchestrator")
            .field("test", &self.test)
            .field("state", &self.state)
            .field("rounds_run", &self.history.len())
            .field("max_rounds", &self.max_rounds)
            .finish_non_exhaustive()
    }
}

impl TestOrchestrator {
    /// Create an orchestrator for one of the standard tests
    pub fn new(test: TestKind, config: &Config) -> Result<Self> {
        Self::with_grid(
            test,
            test.workload_mixes(),
            test.block_sizes(),
            test.dependent_variable(),
            config,
        )
    }

    /// Create an orchestrator over a custom grid.
    ///
    /// All configuration is validated here; a constructed orchestrator is in
    /// the `Init` state.
    pub fn with_grid(
        test: TestKind,
        mixes: Vec<WorkloadMix>,
        block_sizes: Vec<BlockSize>,
        dependent: DependentVariable,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;
        if dependent.mix_index >= mixes.len() || dependent.block_size_index >= block_sizes.len() {
            return Err(Error::InvalidConfig(format!(
                "dependent variable cell ({}, {}) outside {}x{} grid",
                dependent.mix_index,
                dependent.block_size_index,
                mixes.len(),
                block_sizes.len()
            )));
        }

        let collector = RoundMeasurementCollector::new(mixes, block_sizes)?;
        let window = SlidingWindow::new(config.window_size)?;

        Ok(Self {
            test,
            collector,
            dependent,
            detector: SteadyStateDetector::new(config.criteria),
            max_rounds: config.max_rounds,
            state: State::Init,
            window,
            history: RoundHistory::new(),
            outcome: None,
            round_callback: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Set a callback invoked after every completed round
    pub fn on_round<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RoundProgress) + Send + Sync + 'static,
    {
        self.round_callback = Some(Box::new(callback));
        self
    }

    /// Get a handle to cancel the run before the next round starts
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Rounds completed so far
    pub fn history(&self) -> &RoundHistory {
        &self.history
    }

    /// Current measurement window
    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// Terminal outcome, once reached
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Round budget
    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Perform one state transition.
    ///
    /// Terminal states are final: stepping them is a no-op. Errors move the
    /// orchestrator to `Failed` and are returned unchanged.
    pub fn step<R>(&mut self, runner: &mut R) -> Result<State>
    where
        R: TrialRunner + ?Sized,
    {
        let next = match self.state {
            State::Init => {
                info!(
                    "Starting {} test: {} trials per round, window {}, at most {} rounds",
                    self.test,
                    self.collector.trials_per_round(),
                    self.window.capacity(),
                    self.max_rounds
                );
                Ok(State::RoundInProgress(0))
            }
            State::RoundInProgress(round) => self.run_round(round, runner),
            State::WindowCheck(round) => self.check_window(round),
            terminal => Ok(terminal),
        };

        match next {
            Ok(state) => {
                self.state = state;
                Ok(state)
            }
            Err(e) => {
                warn!("{} test failed in {}: {}", self.test, self.state, e);
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    /// Step until a terminal state is reached and return the report
    ///
    /// An orchestrator left in `Failed` by an earlier `step` error is not
    /// resumed and yields [`Error::AlreadyFailed`].
    pub fn run<R>(mut self, runner: &mut R) -> Result<TestReport>
    where
        R: TrialRunner + ?Sized,
    {
        if self.state == State::Failed {
            return Err(Error::AlreadyFailed);
        }
        while !self.state.is_terminal() {
            self.step(runner)?;
        }
        self.into_report()
            .ok_or_else(|| Error::InvalidConfig("run ended without an outcome".to_string()))
    }

    /// Consume the orchestrator, returning the report if a verdict was reached
    pub fn into_report(self) -> Option<TestReport> {
        let outcome = self.outcome?;
        Some(TestReport {
            test: self.test,
            dependent_variable: self.dependent,
            outcome,
            history: self.history,
        })
    }

    fn run_round<R>(&mut self, round: usize, runner: &mut R) -> Result<State>
    where
        R: TrialRunner + ?Sized,
    {
        if self.cancel_flag.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }

        info!("Round {}/{}", round + 1, self.max_rounds);
        let matrix = self.collector.run_round(runner)?;

        let value = matrix
            .cell(self.dependent.mix_index, self.dependent.block_size_index)
            .map(|record| record.metric(self.dependent.metric))
            .ok_or_else(|| {
                Error::InvalidConfig("dependent variable cell missing from matrix".to_string())
            })?;

        self.history.push(matrix);
        self.window.push(round, value)?;
        info!(
            "Round {} {:?} = {:.3} {}",
            round + 1,
            self.dependent.metric,
            value,
            self.dependent.metric.unit()
        );

        if self.window.is_full() {
            Ok(State::WindowCheck(round))
        } else {
            self.notify(round, value, None);
            Ok(State::RoundInProgress(round + 1))
        }
    }

    fn check_window(&mut self, round: usize) -> Result<State> {
        let result = self.detector.check(&self.window)?;
        if let Some((_, value)) = self.window.iter().last() {
            self.notify(round, value, Some(result.reached));
        }

        if result.reached {
            info!("Steady state reached after round {}: {}", round + 1, result);
            self.outcome = Some(Outcome::Steady(result));
            Ok(State::Steady)
        } else if round + 1 >= self.max_rounds {
            warn!(
                "Steady state not reached within {} rounds: {}",
                self.max_rounds, result
            );
            self.outcome = Some(Outcome::RoundsExhausted(result));
            Ok(State::RoundsExhausted)
        } else {
            Ok(State::RoundInProgress(round + 1))
        }
    }

    fn notify(&self, round: usize, value: f64, verdict: Option<bool>) {
        if let Some(ref callback) = self.round_callback {
            callback(&RoundProgress {
                round,
                max_rounds: self.max_rounds,
                value,
                window_len: self.window.len(),
                window_capacity: self.window.capacity(),
                verdict,
            });
        }
    }
}
