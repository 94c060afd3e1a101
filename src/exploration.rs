//! Epsilon-greedy exploration shared by the background and trait scorers.
//!
//! Two operations:
//! - [`ExplorationPolicy::choose`] perturbs a value by a uniform offset in
//!   `[-0.5, 0.5]` with probability ε, clamped to bounds.
//! - [`ExplorationPolicy::select`] picks a uniformly random candidate with
//!   probability ε, otherwise the highest-valued one (first wins on ties).
//!
//! The random source is injectable so both branches can be driven
//! deterministically in tests.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use std::ops::RangeInclusive;
use std::sync::{Mutex, PoisonError};
use tracing::trace;

/// Half-width of the uniform perturbation applied when exploring
pub const PERTURBATION: f64 = 0.5;

/// Epsilon-greedy policy over an injectable random source
pub struct ExplorationPolicy {
    rate: f64,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl ExplorationPolicy {
    /// Policy seeded from OS entropy
    pub fn new(rate: f64) -> Self {
        Self::with_rng(rate, StdRng::from_entropy())
    }

    /// Reproducible policy
    pub fn seeded(rate: f64, seed: u64) -> Self {
        Self::with_rng(rate, StdRng::seed_from_u64(seed))
    }

    /// Policy over `seed` when given, entropy otherwise
    pub fn from_seed(rate: f64, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(rate, seed),
            None => Self::new(rate),
        }
    }

    /// Policy over a caller-supplied random source
    pub fn with_rng(rate: f64, rng: impl RngCore + Send + 'static) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// Exploration probability ε
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Return `value`, perturbed with probability ε and clamped to `bounds`
    ///
    /// The second element reports whether this call explored.
    pub fn choose(&self, value: f64, bounds: RangeInclusive<f64>) -> (f64, bool) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if !explores(&mut **rng, self.rate) {
            return (value, false);
        }

        let offset = rng.gen_range(-PERTURBATION..=PERTURBATION);
        let perturbed = (value + offset).clamp(*bounds.start(), *bounds.end());
        trace!(value, offset, perturbed, "exploring perturbed value");
        (perturbed, true)
    }

    /// Pick one candidate: random with probability ε, else the best by `value_of`
    ///
    /// Returns `None` only for an empty candidate set.
    pub fn select<'a, T, F>(&self, candidates: &'a [T], value_of: F) -> Option<&'a T>
    where
        F: Fn(&T) -> f64,
    {
        if candidates.is_empty() {
            return None;
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if explores(&mut **rng, self.rate) {
            return candidates.choose(&mut **rng);
        }
        drop(rng);

        let mut best = &candidates[0];
        let mut best_value = value_of(best);
        for candidate in &candidates[1..] {
            let value = value_of(candidate);
            if value > best_value {
                best = candidate;
                best_value = value;
            }
        }
        Some(best)
    }
}

impl std::fmt::Debug for ExplorationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorationPolicy")
            .field("rate", &self.rate)
            .finish_non_exhaustive()
    }
}

fn explores(rng: &mut (dyn RngCore + Send), rate: f64) -> bool {
    rate > 0.0 && rng.gen::<f64>() < rate
}
