//! Per-session configuration.
//!
//! Immutable once the run loop begins, with one exception: the
//! `CTXCAP_EMBED` environment fallback may flip `embeddings_enabled` once,
//! before the loop starts, for users who only set the env var.

use serde::{Deserialize, Serialize};

use crate::error::{CtxError, Result};

/// Environment variable that enables embeddings when the CLI flag is absent.
pub const EMBED_ENV_VAR: &str = "CTXCAP_EMBED";

/// Immutable per-session parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub clipboard_allowed: bool,
    pub screenshots_allowed: bool,
    pub poll_interval_ms: u64,
    pub embeddings_enabled: bool,
    pub embed_min_interval_s: f64,
    pub embed_min_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            clipboard_allowed: false,
            screenshots_allowed: false,
            poll_interval_ms: 500,
            embeddings_enabled: false,
            embed_min_interval_s: 10.0,
            embed_min_chars: 12,
        }
    }
}

impl SessionConfig {
    /// Validates the parameters. Called before a session starts; a bad
    /// config never reaches the run loop.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms < 1 {
            return Err(CtxError::Config(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }
        // Rejects negatives, NaN, infinities and values too large to
        // represent as a Duration.
        if std::time::Duration::try_from_secs_f64(self.embed_min_interval_s).is_err() {
            return Err(CtxError::Config(
                "embed_min_interval_s must be a non-negative duration in seconds".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies the one permitted environment fallback: if embeddings were
    /// not enabled via flag, `CTXCAP_EMBED=1|true|yes` enables them.
    /// Must be called once, before the run loop starts.
    pub fn apply_env_fallback(&mut self) {
        if !self.embeddings_enabled {
            self.embeddings_enabled = std::env::var(EMBED_ENV_VAR)
                .map(|value| {
                    matches!(
                        value.to_lowercase().as_str(),
                        "1" | "true" | "yes"
                    )
                })
                .unwrap_or(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = SessionConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CtxError::Config(_))));
    }

    #[test]
    fn test_negative_embed_interval_rejected() {
        let config = SessionConfig {
            embed_min_interval_s: -1.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CtxError::Config(_))));
    }

    #[test]
    fn test_oversized_embed_interval_rejected() {
        // Larger than any representable Duration.
        let config = SessionConfig {
            embed_min_interval_s: 1.0e20,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CtxError::Config(_))));
    }

    #[test]
    fn test_nan_embed_interval_rejected() {
        let config = SessionConfig {
            embed_min_interval_s: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CtxError::Config(_))));
    }

    #[test]
    fn test_env_fallback_does_not_disable() {
        // A flag-enabled config stays enabled regardless of the env var.
        let mut config = SessionConfig {
            embeddings_enabled: true,
            ..Default::default()
        };
        config.apply_env_fallback();
        assert!(config.embeddings_enabled);
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = SessionConfig {
            clipboard_allowed: true,
            poll_interval_ms: 250,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
