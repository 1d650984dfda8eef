//! Analysis configuration
//!
//! Thresholds for the escape classifier and hard enumeration ceilings for
//! the two bounded searches. Defaults are deliberately small; an embedding
//! tool can widen them per target.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Largest non-escaping allocation, in bytes, eligible for stack
    /// promotion
    pub stack_promotion_limit: u64,
    /// Largest non-escaping array, in bytes, eligible for scalar
    /// replacement. Stricter than `stack_promotion_limit`.
    pub scalar_replacement_limit: u64,
    /// Devirtualization candidate enumeration stops here; a call site that
    /// exceeds it is classified `none`
    pub devirt_candidate_ceiling: usize,
    /// Monomorphization generates at most this many specialization
    /// signatures per function
    pub specialization_ceiling: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stack_promotion_limit: 256,
            scalar_replacement_limit: 64,
            devirt_candidate_ceiling: 16,
            specialization_ceiling: 64,
        }
    }
}

impl AnalysisConfig {
    /// Parse a configuration from TOML. Unknown keys are rejected.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| AnalysisError::invalid_config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert!(config.scalar_replacement_limit < config.stack_promotion_limit);
        assert!(config.devirt_candidate_ceiling >= 4);
    }

    #[test]
    fn test_from_toml() {
        let config = AnalysisConfig::from_toml_str(
            "stack_promotion_limit = 512\nscalar_replacement_limit = 128\n",
        )
        .unwrap();
        assert_eq!(config.stack_promotion_limit, 512);
        assert_eq!(config.scalar_replacement_limit, 128);
        // Unspecified keys keep their defaults
        assert_eq!(config.devirt_candidate_ceiling, 16);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = AnalysisConfig::from_toml_str("inline_budget = 3\n");
        assert!(err.is_err());
    }
}
