//! Check command - evaluate stored round values for steady state
//!
//! Lets results from earlier runs (or other tools) be re-evaluated against
//! the configured criteria without touching a device.

use anyhow::{Context, Result};
use console::style;
use plateau_core::{
    ExcursionRule, Metric, Settings, SlidingWindow, SteadyStateCriteria, SteadyStateDetector,
    SteadyStateResult,
};

use crate::progress::format_value;

/// Execute the check command
pub fn execute(
    values: &[f64],
    start: usize,
    json: bool,
    settings: &Settings,
    silent: bool,
) -> Result<()> {
    let criteria = settings.to_config().criteria;
    let result = evaluate(values, start, criteria)?;

    if json {
        let output =
            serde_json::to_string_pretty(&result).context("Failed to serialize result to JSON")?;
        println_if!(silent, "{}", output);
    } else {
        println_if!(silent);
        print_verdict(&result, silent);
        print_window(&result, &criteria, None, silent);
    }

    Ok(())
}

/// Run the detector over `values`, the first being round `start`
pub fn evaluate(
    values: &[f64],
    start: usize,
    criteria: SteadyStateCriteria,
) -> Result<SteadyStateResult> {
    criteria.validate()?;
    let window = SlidingWindow::from_values(start, values)?;
    Ok(SteadyStateDetector::new(criteria).check(&window)?)
}

/// One-line verdict
pub fn print_verdict(result: &SteadyStateResult, silent: bool) {
    if result.reached {
        println_if!(
            silent,
            "{} {}",
            style("STEADY").green().bold(),
            style(format!("over rounds {}", round_span(&result.rounds))).dim()
        );
    } else {
        println_if!(
            silent,
            "{} {}",
            style("NOT STEADY").yellow().bold(),
            style(format!("over rounds {}", round_span(&result.rounds))).dim()
        );
    }
}

/// Window table and the two test margins
pub fn print_window(
    result: &SteadyStateResult,
    criteria: &SteadyStateCriteria,
    metric: Option<Metric>,
    silent: bool,
) {
    let fmt = |v: f64| match metric {
        Some(m) => format_value(v, m),
        None => format!("{:.3}", v),
    };
    let limit = |pct: f64| result.average.abs() * pct;
    let excursion = match criteria.excursion_rule {
        ExcursionRule::Range => result.excursion,
        ExcursionRule::Band => result
            .values
            .iter()
            .map(|v| (v - result.average).abs())
            .fold(0.0, f64::max),
    };

    println_if!(silent);
    println_if!(silent, "  ┌───────┬──────────────────┬──────────────────┐");
    println_if!(silent, "  │ Round │ Measured         │ Fitted           │");
    println_if!(silent, "  ├───────┼──────────────────┼──────────────────┤");
    for (&round, &value) in result.rounds.iter().zip(&result.values) {
        println_if!(
            silent,
            "  │ {:>5} │ {:>16} │ {:>16} │",
            round,
            fmt(value),
            fmt(result.fitted(round))
        );
    }
    println_if!(silent, "  └───────┴──────────────────┴──────────────────┘");
    println_if!(silent);
    println_if!(silent, "  Average:          {}", style(fmt(result.average)).cyan());
    println_if!(
        silent,
        "  Excursion:        {} (limit {}, {} rule) {}",
        fmt(excursion),
        fmt(limit(criteria.excursion_pct)),
        criteria.excursion_rule,
        pass_mark(excursion <= limit(criteria.excursion_pct))
    );
    println_if!(
        silent,
        "  Slope excursion:  {} (limit {}, slope {:.4}/round) {}",
        fmt(result.slope_excursion),
        fmt(limit(criteria.slope_pct)),
        result.slope,
        pass_mark(result.slope_excursion <= limit(criteria.slope_pct))
    );
}

fn pass_mark(ok: bool) -> console::StyledObject<&'static str> {
    if ok {
        style("✓").green()
    } else {
        style("✗").red()
    }
}

/// `first..=last` of a window's rounds
pub fn round_span(rounds: &[usize]) -> String {
    match (rounds.first(), rounds.last()) {
        (Some(first), Some(last)) if first != last => format!("{first}-{last}"),
        (Some(first), _) => first.to_string(),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_reference_window() {
        let result =
            evaluate(&[998.0, 999.0, 1000.0, 998.0], 0, SteadyStateCriteria::default()).unwrap();
        assert!(result.reached);
        assert_eq!(result.average, 998.75);
    }

    #[test]
    fn test_evaluate_rejects_zero_average() {
        assert!(evaluate(&[0.0, 0.0, 0.0], 0, SteadyStateCriteria::default()).is_err());
    }

    #[test]
    fn test_evaluate_rejects_bad_criteria() {
        let criteria = SteadyStateCriteria {
            slope_pct: 0.0,
            ..Default::default()
        };
        assert!(evaluate(&[1.0, 2.0], 0, criteria).is_err());
    }

    #[test]
    fn test_round_span() {
        assert_eq!(round_span(&[4, 5, 6, 7, 8]), "4-8");
        assert_eq!(round_span(&[3]), "3");
        assert_eq!(round_span(&[]), "-");
    }

    #[test]
    fn test_execute_silent() {
        let settings = Settings::default();
        assert!(execute(&[10.0, 10.0, 10.0], 2, false, &settings, true).is_ok());
        assert!(execute(&[10.0, 10.0, 10.0], 2, true, &settings, true).is_ok());
    }
}
