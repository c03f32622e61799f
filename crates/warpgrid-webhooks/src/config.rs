//! Controller configuration.
//!
//! Durations are written as strings (`"30s"`, `"500ms"`, `"2m"`); a bare
//! number is read as seconds.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use warpgrid_health::DEFAULT_FAILURE_THRESHOLD;

use crate::error::{WebhookError, WebhookResult};

/// Tunables for the discovery loop and the per-worker monitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// How often tenants are scanned for webhook workers.
    #[serde(with = "duration_str")]
    pub scan_interval: Duration,
    /// How often each started worker is health checked.
    #[serde(with = "duration_str")]
    pub probe_interval: Duration,
    /// Upper bound on a single health check, body read included.
    #[serde(with = "duration_str")]
    pub probe_timeout: Duration,
    /// Consecutive failures tolerated; the next one marks the worker inactive.
    pub failure_threshold: u32,
    /// Purpose string passed to the credential issuer.
    pub token_purpose: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(30),
            probe_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(10),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            token_purpose: "webhook-worker".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Parse a `[controller]`-style TOML table.
    pub fn from_toml_str(s: &str) -> WebhookResult<Self> {
        let config: ControllerConfig =
            toml::from_str(s).map_err(|e| WebhookError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the loops cannot run with.
    pub fn validate(&self) -> WebhookResult<()> {
        if self.scan_interval.is_zero() {
            return Err(WebhookError::Config("scan_interval must be positive".into()));
        }
        if self.probe_interval.is_zero() {
            return Err(WebhookError::Config("probe_interval must be positive".into()));
        }
        if self.probe_timeout.is_zero() {
            return Err(WebhookError::Config("probe_timeout must be positive".into()));
        }
        if self.token_purpose.is_empty() {
            return Err(WebhookError::Config("token_purpose must not be empty".into()));
        }
        Ok(())
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Render a duration in the shortest exact unit `parse_duration` accepts.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms % 60_000 == 0 && ms > 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{ms}ms")
    }
}

mod duration_str {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        parse_duration(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration {raw:?}")))
    }
}
