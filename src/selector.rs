//! Random choices made by the pipeline: category, prompt count, list element.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::PipelineError;

/// Categories drawn from when a request names none.
pub const CATEGORIES: &[&str] = &["ExtendedFamily", "Self", "NearFamily", "MD", "General"];

/// Source of every random decision in the pipeline.
///
/// Seed it for deterministic tests; pin a category to make
/// [`RandomSelector::pick_category`] constant.
#[derive(Debug)]
pub struct RandomSelector {
    rng: Mutex<StdRng>,
    pinned_category: Option<String>,
}

impl RandomSelector {
    /// Create a selector seeded from OS entropy.
    #[must_use]
    pub fn new(pinned_category: Option<String>) -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()), pinned_category }
    }

    /// Create a selector with a fixed seed.
    #[must_use]
    pub fn seeded(seed: u64, pinned_category: Option<String>) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)), pinned_category }
    }

    /// Pick a category: the pinned one if configured, otherwise a uniform draw.
    pub fn pick_category(&self) -> String {
        if let Some(ref pinned) = self.pinned_category {
            return pinned.clone();
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        CATEGORIES.choose(&mut *rng).copied().unwrap_or("General").to_string()
    }

    /// Pick an integer uniformly from `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRange`] if `min > max`.
    pub fn pick_count(&self, min: i64, max: i64) -> Result<i64, PipelineError> {
        if min > max {
            return Err(PipelineError::InvalidRange { min, max });
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rng.gen_range(min..=max))
    }

    /// Pick one element uniformly, or `None` if the slice is empty.
    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        items.choose(&mut *rng)
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new(None)
    }
}
