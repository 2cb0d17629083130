//! Admission policy for the adaptive breaker
//!
//! Empty history slots count as successes, so a fresh breaker starts fully
//! open and every observed failure lowers the probability by `1/capacity`.

use std::fmt;
use std::num::NonZeroUsize;

use super::history::OutcomeRecord;

/// Probability in `[0, 1]` that the next call is admitted
///
/// `(successes + empty_slots) / capacity`, where `empty_slots` is the part of
/// `capacity` not yet filled by `records`.
pub fn admission_probability<'a, I>(records: I, capacity: NonZeroUsize) -> f64
where
    I: IntoIterator<Item = &'a OutcomeRecord>,
{
    let (len, successes) = records
        .into_iter()
        .fold((0usize, 0usize), |(len, ok), r| (len + 1, ok + usize::from(r.succeeded)));

    let capacity = capacity.get();
    let empty = capacity.saturating_sub(len);
    let probability = (successes + empty) as f64 / capacity as f64;

    probability.clamp(0.0, 1.0)
}

/// Coarse regime derived from an admission probability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionRegime {
    /// Every call is admitted
    FullyOpen,
    /// Calls are admitted stochastically
    Degraded,
    /// No call is admitted until failures age out
    FullyClosed,
}

impl AdmissionRegime {
    /// Classify a probability
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 1.0 {
            Self::FullyOpen
        } else if probability <= 0.0 {
            Self::FullyClosed
        } else {
            Self::Degraded
        }
    }
}

impl fmt::Display for AdmissionRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionRegime::FullyOpen => write!(f, "OPEN"),
            AdmissionRegime::Degraded => write!(f, "DEGRADED"),
            AdmissionRegime::FullyClosed => write!(f, "CLOSED"),
        }
    }
}
