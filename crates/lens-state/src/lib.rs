use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// A decoded counter pair went backwards relative to the session baseline.
/// Signals a misread frame, not a fatal condition: the caller discards the
/// reading and the baseline stays as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[error(
    "counter went backwards: score {prev_score} -> {score}, EX score {prev_ex_score} -> {ex_score}"
)]
pub struct MonotonicityViolation {
    pub prev_score: u64,
    pub prev_ex_score: u64,
    pub score: u64,
    pub ex_score: u64,
}

/// Numeric value of a decoded counter string. Blank cells are unlit leading
/// positions and simply absent; an all-blank counter reads as zero.
pub fn counter_value(text: &str) -> u64 {
    text.chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0u64, |acc, d| acc * 10 + u64::from(d))
}

/// Tracks the last accepted (score, EX score) pair across the frames of one
/// in-play run. Both counters only ever grow during a run, so a decrease
/// means a decoding error on the incoming frame.
///
/// Single-writer: one validator per session, fed in strict capture order.
#[derive(Debug, Clone, Default)]
pub struct SessionValidator {
    last: Option<(u64, u64)>,
}

impl SessionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a newly decoded pair against the baseline. Accepts and
    /// becomes the new baseline only if neither value decreased; otherwise
    /// the state is left untouched and the violation is returned.
    pub fn accept(
        &mut self,
        score: &str,
        ex_score: &str,
    ) -> Result<(), MonotonicityViolation> {
        let score = counter_value(score);
        let ex_score = counter_value(ex_score);

        if let Some((prev_score, prev_ex_score)) = self.last {
            if score < prev_score || ex_score < prev_ex_score {
                return Err(MonotonicityViolation {
                    prev_score,
                    prev_ex_score,
                    score,
                    ex_score,
                });
            }
        }

        self.last = Some((score, ex_score));
        Ok(())
    }

    /// Drop the baseline. Called when the run leaves the in-play phase,
    /// never as a reaction to a violation.
    pub fn reset(&mut self) {
        if self.last.is_some() {
            debug!("Session baseline reset");
        }
        self.last = None;
    }

    pub fn last_accepted(&self) -> Option<(u64, u64)> {
        self.last
    }
}
