use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Broker-wide timing knobs. Defaults apply when no config file is given;
/// a TOML file may override any subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// How long a fresh stream may stay silent before its first frame.
    pub handshake_timeout: Duration,

    /// Sliding expiry of a pooled database handle.
    pub connection_ttl: Duration,

    /// How often the background janitor wakes up.
    pub janitor_interval: Duration,

    /// Upper bound on a single janitor round.
    pub janitor_round_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
            connection_ttl: Duration::from_secs(60),
            janitor_interval: Duration::from_secs(60),
            janitor_round_timeout: Duration::from_secs(60),
        }
    }
}

impl BrokerConfig {
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::read_from_file(p), // propagate errors unchanged
            None => Ok(Self::default()),
        }
    }

    fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path.as_ref()))?;
        let cfg: BrokerConfig = toml::from_str(&raw).with_context(|| "parsing broker config TOML")?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_constants() {
        let cfg = BrokerConfig::default();
        assert_eq!(cfg.handshake_timeout, Duration::from_secs(30));
        assert_eq!(cfg.connection_ttl, Duration::from_secs(60));
        assert_eq!(cfg.janitor_interval, Duration::from_secs(60));
        assert_eq!(cfg.janitor_round_timeout, Duration::from_secs(60));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let cfg: BrokerConfig =
            toml::from_str("connection_ttl = { secs = 5, nanos = 0 }").unwrap();
        assert_eq!(cfg.connection_ttl, Duration::from_secs(5));
        assert_eq!(cfg.handshake_timeout, Duration::from_secs(30));
    }
}
