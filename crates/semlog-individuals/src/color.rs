//! Visual mask colors and unique color generation.
//!
//! A visual mask is a flat RGB color rendered instead of an individual's
//! materials, so that segmentation images can be mapped back to individuals.
//! Masks have to stay far apart from each other and from the reserved
//! near-black and near-white colors so that lighting noise in the rendered
//! image cannot make two individuals indistinguishable.
//!
//! # Example
//!
//! ```
//! use semlog_individuals::color::{ColorGenerator, MaskColor};
//! use semlog_individuals::config::MaskConfig;
//!
//! let mut gen = ColorGenerator::new(42, MaskConfig::default());
//! let mut consumed = Vec::new();
//! let a = gen.generate_unique(&mut consumed);
//! let b = gen.generate_unique(&mut consumed);
//! assert!(a.manhattan_distance(b) >= 29);
//! assert_eq!(consumed, vec![a, b]);
//! ```

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use crate::config::MaskConfig;
use crate::IndividualError;

// ---------------------------------------------------------------------------
// MaskColor
// ---------------------------------------------------------------------------

/// An 8-bit RGB color, written as `RRGGBB` hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaskColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl MaskColor {
    pub const BLACK: MaskColor = MaskColor { r: 0, g: 0, b: 0 };
    pub const WHITE: MaskColor = MaskColor {
        r: 255,
        g: 255,
        b: 255,
    };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Sum of the absolute per-channel differences.
    pub fn manhattan_distance(self, other: MaskColor) -> u32 {
        (self.r as i32 - other.r as i32).unsigned_abs()
            + (self.g as i32 - other.g as i32).unsigned_abs()
            + (self.b as i32 - other.b as i32).unsigned_abs()
    }

    /// `true` if the two colors are within `tolerance` of each other.
    /// A zero tolerance means exact equality.
    pub fn is_near(self, other: MaskColor, tolerance: u32) -> bool {
        if tolerance == 0 {
            return self == other;
        }
        self.manhattan_distance(other) <= tolerance
    }

    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Parse `RRGGBB` (an optional leading `#` is accepted).
    pub fn from_hex(hex: &str) -> Result<Self, IndividualError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let invalid = || IndividualError::InvalidColor {
            value: hex.to_owned(),
        };
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for MaskColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for MaskColor {
    type Err = IndividualError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// ---------------------------------------------------------------------------
// ColorGenerator
// ---------------------------------------------------------------------------

/// Seeded random source of mask colors.
#[derive(Debug, Clone)]
pub struct ColorGenerator {
    rng: Pcg64,
    config: MaskConfig,
}

impl ColorGenerator {
    pub fn new(seed: u64, config: MaskConfig) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
            config,
        }
    }

    pub fn config(&self) -> &MaskConfig {
        &self.config
    }

    /// Near-black and near-white colors are never handed out.
    pub fn is_reserved(&self, color: MaskColor) -> bool {
        color.is_near(MaskColor::BLACK, self.config.min_distance_to_black)
            || color.is_near(MaskColor::WHITE, self.config.min_distance_to_white)
    }

    fn sample(&mut self) -> MaskColor {
        MaskColor::new(self.rng.gen(), self.rng.gen(), self.rng.gen())
    }

    /// A random non-reserved color, with no uniqueness requirement.
    ///
    /// Returns black if every trial hit a reserved color.
    pub fn random_color(&mut self) -> MaskColor {
        for _ in 0..self.config.num_trials.max(1) {
            let color = self.sample();
            if !self.is_reserved(color) {
                return color;
            }
        }
        error!(trials = self.config.num_trials, "could not sample a non-reserved color, saving as black");
        MaskColor::BLACK
    }

    /// A color at least the configured minimum distance from every color
    /// in `consumed`, using the configured trial count.
    pub fn generate_unique(&mut self, consumed: &mut Vec<MaskColor>) -> MaskColor {
        let (trials, min_distance) = (self.config.num_trials, self.config.min_manhattan_distance);
        self.generate_unique_with(consumed, min_distance, trials)
    }

    /// Sample up to `trials` random colors and return the first one that is
    /// not reserved and at least `min_distance` from every consumed color.
    /// The accepted color is appended to `consumed`.
    ///
    /// Returns [`MaskColor::BLACK`] (a sentinel, never a valid mask) and logs
    /// an error when the trials are exhausted.
    pub fn generate_unique_with(
        &mut self,
        consumed: &mut Vec<MaskColor>,
        min_distance: u32,
        trials: u32,
    ) -> MaskColor {
        for _ in 0..trials {
            let color = self.sample();
            if self.is_reserved(color) {
                trace!(color = %color, "reserved color sampled, trying again");
                continue;
            }
            if consumed.iter().all(|c| color.manhattan_distance(*c) >= min_distance) {
                consumed.push(color);
                return color;
            }
        }
        error!(
            trials,
            consumed = consumed.len(),
            min_distance,
            "could not generate a unique color, saving as black"
        );
        MaskColor::BLACK
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
