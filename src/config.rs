use serde::Deserialize;

use crate::error::SpriteError;
use crate::renderer::quad_batch::{DEFAULT_BATCH_QUADS, MAX_BATCH_QUADS};
use crate::sprites::store::MAX_SUPPORTED_TEXTURES;

// ── BatchConfig ───────────────────────────────────────────────────────────────

/// Sizing and safety settings for sprite pools and quad batchers.
///
/// Every field is optional in JSON; missing fields take the values from
/// `BatchConfig::default()`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Fixed record count of each instanced sprite pool.
    pub capacity: usize,
    /// Quads per immediate-path draw call.
    pub max_quads: usize,
    /// Validate handle generations on every pool access.
    pub checked_handles: bool,
    /// Texture slots an instanced batch may bind.
    pub max_textures: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            capacity:        4096,
            max_quads:       DEFAULT_BATCH_QUADS,
            checked_handles: cfg!(debug_assertions),
            max_textures:    MAX_SUPPORTED_TEXTURES,
        }
    }
}

impl BatchConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(text: &str) -> Result<Self, SpriteError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SpriteError> {
        if self.capacity == 0 {
            return Err(SpriteError::InvalidConfig("capacity must be at least 1".into()));
        }
        if self.capacity > u32::MAX as usize {
            return Err(SpriteError::InvalidConfig(format!(
                "capacity {} does not fit a 32-bit index",
                self.capacity
            )));
        }
        if self.max_quads == 0 || self.max_quads > MAX_BATCH_QUADS {
            return Err(SpriteError::InvalidConfig(format!(
                "max_quads must be in 1..={MAX_BATCH_QUADS}, got {}",
                self.max_quads
            )));
        }
        if self.max_textures > MAX_SUPPORTED_TEXTURES {
            return Err(SpriteError::TooManyTextures {
                requested: self.max_textures,
                max: MAX_SUPPORTED_TEXTURES,
            });
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(BatchConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_capacity_rejected() {
        let cfg = BatchConfig { capacity: 0, ..BatchConfig::default() };
        assert!(matches!(cfg.validate(), Err(SpriteError::InvalidConfig(_))));
    }
}
