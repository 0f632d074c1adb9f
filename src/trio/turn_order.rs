//! Randomized turn order for the agents of one invocation.
//!
//! The random source is injected: production code builds the selector once
//! from entropy and shares it, tests build it from a fixed seed.
//!
//! ```
//! use trio::model::Agent;
//! use trio::turn_order::TurnOrderSelector;
//!
//! let agents = vec![Agent::new(1, "Ada"), Agent::new(2, "Bob")];
//! let a = TurnOrderSelector::seeded(7).shuffle(&agents);
//! let b = TurnOrderSelector::seeded(7).shuffle(&agents);
//! assert_eq!(a, b);
//! assert_eq!(agents[0].name, "Ada"); // input untouched
//! ```

use crate::trio::model::Agent;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Return a uniformly shuffled copy of `items`, leaving the input untouched.
pub fn shuffled<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut copy = items.to_vec();
    copy.shuffle(rng);
    copy
}

/// Shared, lockable random source producing agent permutations.
pub struct TurnOrderSelector {
    rng: Mutex<StdRng>,
    seed: Option<u64>,
}

impl TurnOrderSelector {
    /// Deterministic selector for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            seed: Some(seed),
        }
    }

    /// Selector seeded from operating-system entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            seed: None,
        }
    }

    /// Seed used to build this selector, if it was built deterministically.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// A fresh permutation of `agents`. Independent across calls.
    pub fn shuffle(&self, agents: &[Agent]) -> Vec<Agent> {
        match self.rng.lock() {
            Ok(mut rng) => shuffled(agents, &mut *rng),
            // A panic while shuffling leaves the generator state intact; keep using it.
            Err(poisoned) => shuffled(agents, &mut *poisoned.into_inner()),
        }
    }
}

impl Default for TurnOrderSelector {
    fn default() -> Self {
        Self::from_entropy()
    }
}
