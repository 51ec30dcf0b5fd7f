//! Match configuration
//!
//! Declarative thresholds and weights for the pair scorer and the blocker.
//! Weights are normalized to sum to 1.0 on validation, so a config file
//! may state them in any scale.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchConfig {
    /// Config version for future compatibility
    #[serde(default = "default_version")]
    pub version: u32,

    /// Relative weight of the name component
    #[serde(default = "default_name_weight")]
    pub name_weight: f32,

    /// Relative weight of the address component
    #[serde(default = "default_address_weight")]
    pub address_weight: f32,

    /// Share of token-set Jaccard in the name score; the rest is the
    /// Levenshtein ratio
    #[serde(default = "default_name_jaccard_weight")]
    pub name_jaccard_weight: f32,

    /// At or above: merge unconditionally
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f32,

    /// Below: no edge. Between low and high: greedy best-match only
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f32,

    /// Floor applied to the score when both normalized phones are equal
    #[serde(default = "default_phone_match_score")]
    pub phone_match_score: f32,

    /// Side of a blocking grid cell, in degrees
    #[serde(default = "default_cell_size_deg")]
    pub cell_size_deg: f64,

    /// Characters of the locality (or name) used as a fallback block key
    #[serde(default = "default_prefix_len")]
    pub block_prefix_len: usize,
}

fn default_version() -> u32 {
    1
}

fn default_name_weight() -> f32 {
    0.6
}

fn default_address_weight() -> f32 {
    0.4
}

fn default_name_jaccard_weight() -> f32 {
    0.5
}

fn default_high_threshold() -> f32 {
    0.85
}

fn default_low_threshold() -> f32 {
    0.65
}

fn default_phone_match_score() -> f32 {
    0.9
}

fn default_cell_size_deg() -> f64 {
    0.005
}

fn default_prefix_len() -> usize {
    3
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            name_weight: default_name_weight(),
            address_weight: default_address_weight(),
            name_jaccard_weight: default_name_jaccard_weight(),
            high_threshold: default_high_threshold(),
            low_threshold: default_low_threshold(),
            phone_match_score: default_phone_match_score(),
            cell_size_deg: default_cell_size_deg(),
            block_prefix_len: default_prefix_len(),
        }
    }
}

impl MatchConfig {
    /// Validate the config
    /// - Checks that weights are non-negative and not all zero
    /// - Normalizes component weights to sum to 1.0
    /// - Checks threshold ordering and ranges
    pub fn validate_and_normalize(&mut self) -> Result<(), ConfigError> {
        for (name, weight) in [("name_weight", self.name_weight), ("address_weight", self.address_weight)] {
            if weight < 0.0 || !weight.is_finite() {
                return Err(ConfigError::NegativeWeight(name.to_string()));
            }
        }

        let weight_sum = self.name_weight + self.address_weight;
        if weight_sum <= 0.0 {
            return Err(ConfigError::ZeroTotalWeight);
        }

        if (weight_sum - 1.0).abs() > 0.001 {
            self.name_weight /= weight_sum;
            self.address_weight /= weight_sum;
        }

        for (name, value) in [
            ("name_jaccard_weight", self.name_jaccard_weight),
            ("high_threshold", self.high_threshold),
            ("low_threshold", self.low_threshold),
            ("phone_match_score", self.phone_match_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange(name.to_string(), value));
            }
        }

        if self.low_threshold > self.high_threshold {
            return Err(ConfigError::ThresholdOrder {
                low: self.low_threshold,
                high: self.high_threshold,
            });
        }

        if !(self.cell_size_deg > 0.0) {
            return Err(ConfigError::InvalidCellSize(self.cell_size_deg));
        }

        if self.block_prefix_len == 0 {
            return Err(ConfigError::OutOfRange("block_prefix_len".to_string(), 0.0));
        }

        Ok(())
    }
}

/// Errors that can occur during config validation
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Weight '{0}' must be a non-negative number")]
    NegativeWeight(String),

    #[error("Total weight cannot be zero")]
    ZeroTotalWeight,

    #[error("'{0}' must lie in [0, 1], got {1}")]
    OutOfRange(String, f32),

    #[error("low_threshold ({low}) must not exceed high_threshold ({high})")]
    ThresholdOrder { low: f32, high: f32 },

    #[error("cell_size_deg must be positive, got {0}")]
    InvalidCellSize(f64),
}

impl From<ConfigError> for dishx_core::Error {
    fn from(e: ConfigError) -> Self {
        dishx_core::Error::InvalidConfig(e.to_string())
    }
}
