//! Splits a total image quota across prompt variants.

use crate::error::{LoomError, Result};

/// How many units each variant of a batch produces.
///
/// Every variant gets `base`; the last one also takes the whole remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPlan {
    pub total: u32,
    pub variants: u32,
    pub base: u32,
    pub remainder: u32,
}

impl QuotaPlan {
    /// Plan `total` units over `variants` variants. Both must be positive.
    pub fn new(total: u32, variants: u32) -> Result<Self> {
        if variants == 0 {
            return Err(LoomError::InvalidRequest(
                "variant count must be at least 1".into(),
            ));
        }
        if total == 0 {
            return Err(LoomError::InvalidRequest("total count must be at least 1".into()));
        }
        Ok(Self {
            total,
            variants,
            base: total / variants,
            remainder: total % variants,
        })
    }

    /// Units for the 1-based `variant`.
    ///
    /// When `variants > total` this keeps the skew: all but the last variant
    /// get zero units.
    pub fn units_for(&self, variant: u32) -> u32 {
        if variant == self.variants {
            self.base + self.remainder
        } else {
            self.base
        }
    }

    /// Unit counts for variants `1..=variants`, in order.
    pub fn counts(&self) -> Vec<u32> {
        (1..=self.variants).map(|v| self.units_for(v)).collect()
    }
}
