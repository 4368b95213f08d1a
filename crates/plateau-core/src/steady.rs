//! Steady-state detection.
//!
//! A measurement window is in steady state when its values are both flat
//! (bounded excursion around the window average) and non-trending (bounded
//! least-squares slope over the window).
//!
//! Two excursion rules and two slope spans exist in the wild. Both are
//! selectable through [`SteadyStateCriteria`]; the default is the full-range
//! rule at 20% of the average and a full-window slope span at 10%.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::window::SlidingWindow;

/// Default excursion allowance (fraction of the window average)
pub const DEFAULT_EXCURSION_PCT: f64 = 0.20;

/// Default slope allowance (fraction of the window average)
pub const DEFAULT_SLOPE_PCT: f64 = 0.10;

/// How the data excursion of a window is bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExcursionRule {
    /// `max - min <= average * pct`
    #[default]
    Range,
    /// every value within `average * (1 +/- pct)`, sharing `excursion_pct`
    Band,
}

impl fmt::Display for ExcursionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range => write!(f, "range"),
            Self::Band => write!(f, "band"),
        }
    }
}

/// Length over which the regression slope is projected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlopeSpan {
    /// `|slope| * window_len`
    #[default]
    Full,
    /// `|slope| * window_len / 2`
    Half,
}

impl fmt::Display for SlopeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Half => write!(f, "half"),
        }
    }
}

impl SlopeSpan {
    fn length(self, window_len: usize) -> f64 {
        match self {
            Self::Full => window_len as f64,
            Self::Half => window_len as f64 / 2.0,
        }
    }
}

/// Thresholds for the steady-state tests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteadyStateCriteria {
    /// Excursion rule
    pub excursion_rule: ExcursionRule,
    /// Allowed excursion as a fraction of the average
    pub excursion_pct: f64,
    /// Slope projection span
    pub slope_span: SlopeSpan,
    /// Allowed slope excursion as a fraction of the average
    pub slope_pct: f64,
}

impl Default for SteadyStateCriteria {
    fn default() -> Self {
        Self {
            excursion_rule: ExcursionRule::Range,
            excursion_pct: DEFAULT_EXCURSION_PCT,
            slope_span: SlopeSpan::Full,
            slope_pct: DEFAULT_SLOPE_PCT,
        }
    }
}

impl SteadyStateCriteria {
    /// Check the percentages are usable
    pub fn validate(&self) -> Result<()> {
        for (name, pct) in [
            ("excursion", self.excursion_pct),
            ("slope", self.slope_pct),
        ] {
            if !pct.is_finite() || pct <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} threshold must be a positive fraction, got {pct}"
                )));
            }
        }
        Ok(())
    }
}

/// Verdict of a steady-state check, with the data it was computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteadyStateResult {
    /// Whether both tests passed
    pub reached: bool,
    /// Round indices of the window, oldest first
    pub rounds: Vec<usize>,
    /// Window values, same order as `rounds`
    pub values: Vec<f64>,
    /// Mean of `values`
    pub average: f64,
    /// Least-squares slope over the window
    pub slope: f64,
    /// Least-squares intercept (value at round 0)
    pub intercept: f64,
    /// `max - min` of `values`
    pub excursion: f64,
    /// Slope projected over the configured span
    pub slope_excursion: f64,
}

impl SteadyStateResult {
    /// Value of the regression line at `round`
    pub fn fitted(&self, round: usize) -> f64 {
        self.slope.mul_add(round as f64, self.intercept)
    }
}

impl fmt::Display for SteadyStateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reached={} rounds={:?} avg={:.3} slope={:.3} intercept={:.3}",
            self.reached, self.rounds, self.average, self.slope, self.intercept
        )
    }
}

/// Evaluates measurement windows against [`SteadyStateCriteria`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SteadyStateDetector {
    criteria: SteadyStateCriteria,
}

impl SteadyStateDetector {
    /// Create a detector with the given criteria
    pub fn new(criteria: SteadyStateCriteria) -> Self {
        Self { criteria }
    }

    /// Criteria in use
    pub fn criteria(&self) -> &SteadyStateCriteria {
        &self.criteria
    }

    /// Check a window for steady state.
    ///
    /// Fails only for an empty or zero-average window. A window with fewer
    /// than two entries cannot be regressed and is reported as not reached.
    pub fn check(&self, window: &SlidingWindow) -> Result<SteadyStateResult> {
        let rounds = window.rounds();
        let values = window.values();

        if values.is_empty() {
            return Err(Error::DegenerateInput("window is empty".to_string()));
        }

        let average = values.iter().sum::<f64>() / values.len() as f64;
        if average == 0.0 || !average.is_finite() {
            return Err(Error::DegenerateInput(format!(
                "window average is {average}"
            )));
        }

        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let excursion = max - min;

        if values.len() < 2 {
            return Ok(SteadyStateResult {
                reached: false,
                rounds,
                values,
                average,
                slope: 0.0,
                intercept: average,
                excursion,
                slope_excursion: 0.0,
            });
        }

        let scale = average.abs();
        let excursion_ok = match self.criteria.excursion_rule {
            ExcursionRule::Range => excursion <= scale * self.criteria.excursion_pct,
            ExcursionRule::Band => values
                .iter()
                .all(|v| (v - average).abs() <= scale * self.criteria.excursion_pct),
        };

        let (slope, intercept) = least_squares(&rounds, &values);
        let slope_excursion = slope.abs() * self.criteria.slope_span.length(values.len());
        let slope_ok = slope_excursion <= scale * self.criteria.slope_pct;

        let reached = excursion_ok && slope_ok;
        debug!(
            "Steady-state check over rounds {:?}: avg={:.3} excursion={:.3} ({}) slope_excursion={:.3} ({})",
            rounds,
            average,
            excursion,
            if excursion_ok { "ok" } else { "exceeded" },
            slope_excursion,
            if slope_ok { "ok" } else { "exceeded" },
        );

        Ok(SteadyStateResult {
            reached,
            rounds,
            values,
            average,
            slope,
            intercept,
            excursion,
            slope_excursion,
        })
    }
}

/// Ordinary least-squares fit of `y = slope * x + intercept`
fn least_squares(xs: &[usize], ys: &[f64]) -> (f64, f64) {
    let n = ys.len() as f64;
    let mean_x = xs.iter().map(|&x| x as f64).sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (sxx, sxy) = xs
        .iter()
        .zip(ys)
        .fold((0.0, 0.0), |(sxx, sxy), (&x, &y)| {
            let dx = x as f64 - mean_x;
            (dx.mul_add(dx, sxx), dx.mul_add(y - mean_y, sxy))
        });

    if sxx <= f64::EPSILON {
        return (0.0, mean_y);
    }

    let slope = sxy / sxx;
    (slope, slope.mul_add(-mean_x, mean_y))
}
