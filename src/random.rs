use std::cell::RefCell;

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::ast::MacroNode;
use crate::error::{Error, Result};
use crate::formatter::{Formatter, MacroFormatter};

// Concrete, seedable PRNG so runs can be reproduced.
type SmallRng = Xoshiro256StarStar;

/// Weighted random selection over replacement strings.
///
/// Registered as a macro rule, it replaces each occurrence of the macro
/// with one of the choices, drawn independently with probability
/// proportional to weight.
pub struct WeightedChoice<R: RngCore = SmallRng> {
    choices: Vec<(f64, String)>,
    total: f64,
    rng: RefCell<R>,
}

impl WeightedChoice<SmallRng> {
    /// Entropy-seeded selector.
    pub fn new(choices: Vec<(f64, String)>) -> Result<Self> {
        Self::with_rng(choices, SmallRng::from_entropy())
    }

    /// Deterministic selector for reproducible runs.
    pub fn seeded(choices: Vec<(f64, String)>, seed: u64) -> Result<Self> {
        Self::with_rng(choices, SmallRng::seed_from_u64(seed))
    }
}

impl<R: RngCore> WeightedChoice<R> {
    /// Build a selector drawing from `rng`. Weights must be finite and
    /// non-negative, and at least one must be positive.
    pub fn with_rng(choices: Vec<(f64, String)>, rng: R) -> Result<Self> {
        for (weight, _) in &choices {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::InvalidWeight { weight: *weight });
            }
        }

        let total: f64 = choices.iter().map(|(weight, _)| weight).sum();
        if total <= 0.0 {
            return Err(Error::EmptyChoices);
        }

        Ok(Self {
            choices,
            total,
            rng: RefCell::new(rng),
        })
    }

    /// Draw one choice, weight-proportionally.
    pub fn draw(&self) -> &str {
        let rand_val = self.rng.borrow_mut().next_u32();
        let target = (rand_val as f64) / (u32::MAX as f64) * self.total;

        let mut acc = 0.0;
        let mut picked = None;
        for (weight, text) in &self.choices {
            if *weight <= 0.0 {
                continue;
            }
            picked = Some(text.as_str());
            acc += weight;
            if target < acc {
                break;
            }
        }
        // Rounding at the top of the range falls back to the last
        // positive-weight choice.
        picked.expect("validated: at least one positive weight")
    }
}

impl<R: RngCore> MacroFormatter for WeightedChoice<R> {
    fn format(&self, _: &MacroNode<'_>, _: &Formatter) -> Result<String> {
        Ok(self.draw().to_string())
    }
}

/// Weighted random replacement rule: each `(weight, text)` pair is drawn
/// with probability `weight / total`.
pub fn probabilistic_formatter(choices: Vec<(f64, String)>) -> Result<WeightedChoice> {
    WeightedChoice::new(choices)
}
