//! Configuration for Plateau test runs

use std::time::Duration;

use crate::array::{DEFAULT_POLL_INTERVAL, DEFAULT_READY_TIMEOUT};
use crate::error::{Error, Result};
use crate::steady::SteadyStateCriteria;

/// Default number of rounds in the measurement window
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Default round budget
pub const DEFAULT_MAX_ROUNDS: usize = 25;

/// Main configuration struct
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Capacity of the measurement window
    pub window_size: usize,

    /// Maximum number of rounds before giving up on steady state
    pub max_rounds: usize,

    /// Steady-state thresholds
    pub criteria: SteadyStateCriteria,

    /// Interval between array readiness polls
    pub poll_interval: Duration,

    /// Maximum wait for an array to become ready
    pub ready_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            max_rounds: DEFAULT_MAX_ROUNDS,
            criteria: SteadyStateCriteria::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set window size
    pub fn window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// Set round budget
    pub fn max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Set steady-state criteria
    pub fn criteria(mut self, criteria: SteadyStateCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Set readiness poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set readiness timeout
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Validate every parameter of a test run
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::InvalidConfig(
                "window size must be positive".to_string(),
            ));
        }
        if self.max_rounds == 0 {
            return Err(Error::InvalidConfig(
                "max rounds must be positive".to_string(),
            ));
        }
        // A window that can never fill would never be checked
        if self.max_rounds < self.window_size {
            return Err(Error::InvalidConfig(format!(
                "max rounds ({}) is smaller than the window size ({})",
                self.max_rounds, self.window_size
            )));
        }
        self.validate_array()?;
        self.criteria.validate()
    }

    /// Validate only the array readiness parameters
    ///
    /// Array maintenance never runs rounds, so the window and criteria are
    /// not consulted.
    pub fn validate_array(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
