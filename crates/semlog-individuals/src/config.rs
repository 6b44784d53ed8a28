//! Registry configuration.

use serde::{Deserialize, Serialize};

use crate::IndividualError;

/// Parameters of visual mask color generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// Random samples drawn before giving up on a unique color.
    pub num_trials: u32,
    /// Minimum Manhattan RGB distance of a new color to every consumed
    /// color.
    pub min_manhattan_distance: u32,
    /// Colors this close to black are reserved.
    pub min_distance_to_black: u32,
    /// Colors this close to white are reserved.
    pub min_distance_to_white: u32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            num_trials: 100,
            min_manhattan_distance: 29,
            min_distance_to_black: 37,
            min_distance_to_white: 23,
        }
    }
}

/// Configuration shared by every individual of a [`SemanticWorld`](crate::world::SemanticWorld).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Tag type under which an actor's own values are persisted.
    pub tag_type: String,
    /// Prefix of the per-bone tag type, followed by the bone index.
    pub bone_tag_prefix: String,
    /// Seed for id and color generation.
    pub seed: u64,
    pub mask: MaskConfig,
    /// Pose changes at or below this tolerance do not refresh cached poses.
    pub pose_tolerance: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            tag_type: "SemLog".to_owned(),
            bone_tag_prefix: "SemLogBone".to_owned(),
            seed: 0x5E_4106,
            mask: MaskConfig::default(),
            pose_tolerance: 0.01,
        }
    }
}

impl RegistryConfig {
    /// Default configuration with a different seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Tag type of bone `bone_index`, e.g. `SemLogBone3`.
    pub fn bone_tag_type(&self, bone_index: usize) -> String {
        format!("{}{}", self.bone_tag_prefix, bone_index)
    }

    /// Tag type of the bone constraint individual for `constraint_index`.
    pub fn bone_constraint_tag_type(&self, constraint_index: usize) -> String {
        format!("{}Constraint{}", self.bone_tag_prefix, constraint_index)
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, IndividualError> {
        serde_json::from_str(json).map_err(|e| IndividualError::InvalidConfig {
            details: e.to_string(),
        })
    }
}
