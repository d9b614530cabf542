//! Exchange configuration

use std::time::Duration;
use tracing::warn;

/// Default time a secured trade may wait for confirmation
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(180);

/// Settings for an [`Exchange`](crate::core::Exchange)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// How long a secured trade stays open before it expires
    pub session_ttl: Duration,
    /// Whether secured trades may be proposed at all
    pub secured_trades_enabled: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
            secured_trades_enabled: true,
        }
    }
}

impl ExchangeConfig {
    /// Create an ExchangeConfig with custom values
    ///
    /// A zero ttl would expire every session on creation, so it falls back to
    /// the default.
    pub fn new(session_ttl: Duration, secured_trades_enabled: bool) -> Self {
        let session_ttl = if session_ttl.is_zero() {
            warn!(
                default_secs = DEFAULT_SESSION_TTL.as_secs(),
                "invalid session ttl 0, using default"
            );
            DEFAULT_SESSION_TTL
        } else {
            session_ttl
        };

        Self {
            session_ttl,
            secured_trades_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::custom(Duration::from_secs(30), true, Duration::from_secs(30))]
    #[case::zero_falls_back(Duration::ZERO, false, DEFAULT_SESSION_TTL)]
    fn test_new(
        #[case] ttl: Duration,
        #[case] enabled: bool,
        #[case] expected_ttl: Duration,
    ) {
        let config = ExchangeConfig::new(ttl, enabled);
        assert_eq!(config.session_ttl, expected_ttl);
        assert_eq!(config.secured_trades_enabled, enabled);
    }

    #[test]
    fn test_default() {
        let config = ExchangeConfig::default();
        assert_eq!(config.session_ttl, Duration::from_secs(180));
        assert!(config.secured_trades_enabled);
    }
}
