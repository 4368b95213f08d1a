//! Fuzz test for steady-state detection
//!
//! Feeds arbitrary windows, including NaN and infinite values, through the
//! detector under both rule variants.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use plateau_core::{
    ExcursionRule, SlidingWindow, SlopeSpan, SteadyStateCriteria, SteadyStateDetector,
};

#[derive(Debug, Arbitrary)]
struct Input {
    first_round: u16,
    values: Vec<f64>,
    band: bool,
    half_span: bool,
}

fuzz_target!(|input: Input| {
    let Ok(window) = SlidingWindow::from_values(input.first_round as usize, &input.values) else {
        return;
    };

    let criteria = SteadyStateCriteria {
        excursion_rule: if input.band {
            ExcursionRule::Band
        } else {
            ExcursionRule::Range
        },
        slope_span: if input.half_span {
            SlopeSpan::Half
        } else {
            SlopeSpan::Full
        },
        ..Default::default()
    };

    if let Ok(result) = SteadyStateDetector::new(criteria).check(&window) {
        assert_eq!(result.rounds.len(), input.values.len());
        assert_eq!(result.values.len(), input.values.len());
    }
});
