//! Injectable randomness for admission decisions
//!
//! The adaptive breaker draws one uniform value per call. Drawing it through
//! [`RandomSource`] lets production use the thread-local RNG while tests pin
//! the sequence, either with a seed or with an explicit script.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform values in `[0, 1)`
pub trait RandomSource: Send + Sync + 'static {
    /// Draw the next value; implementations must stay within `[0, 1)`
    fn next_unit(&self) -> f64;
}

impl<T: RandomSource> RandomSource for Arc<T> {
    fn next_unit(&self) -> f64 {
        (**self).next_unit()
    }
}

/// Non-deterministic source backed by `rand::thread_rng`
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Deterministic pseudo-random source seeded with a fixed value
///
/// Two sources built from the same seed produce the same sequence.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Create a source from `seed`
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        rng.gen::<f64>()
    }
}

/// Source that replays a fixed script of values, cycling when exhausted
///
/// Values are clamped into `[0, 1)` at construction. An empty script yields
/// `0.0` forever, which admits every call with a non-zero probability.
#[derive(Debug)]
pub struct ScriptedRandom {
    values: Vec<f64>,
    cursor: AtomicUsize,
}

impl ScriptedRandom {
    /// Create a source that replays `values` in order
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        let values = values.into().into_iter().map(clamp_unit).collect();
        Self { values, cursor: AtomicUsize::new(0) }
    }

    /// Create a source that always returns `value`
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of values drawn so far
    pub fn draws(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let index = self.cursor.fetch_add(1, Ordering::AcqRel);
        self.values[index % self.values.len()]
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() || value < 0.0 {
        0.0
    } else if value >= 1.0 {
        // largest f64 below 1.0
        1.0 - f64::EPSILON / 2.0
    } else {
        value
    }
}
