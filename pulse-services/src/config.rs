//! Process configuration loaded from environment variables

use std::env;
use std::time::Duration;

use pulse_core::{PulseError, PulseResult};
use pulse_intel::{ClassifierRules, GeminiConfig, DEFAULT_MODEL, GEMINI_API_BASE};

/// Default countdown estimate for one cycle, in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u32 = 60;

const DEFAULT_SERVER_PORT: u16 = 3001;

/// Timing for refresh cycles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Countdown shown to callers while a cycle runs
    pub scan_duration_secs: u32,
    /// Hard bound on the acquisition call
    pub acquisition_timeout: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            scan_duration_secs: DEFAULT_SCAN_DURATION_SECS,
            acquisition_timeout: Duration::from_secs(DEFAULT_SCAN_DURATION_SECS as u64),
        }
    }
}

/// Everything the server needs to start
#[derive(Debug, Clone)]
pub struct PulseConfig {
    pub gemini: GeminiConfig,
    pub refresh: RefreshConfig,
    /// Periodic refresh interval; `None` refreshes only on startup and on demand
    pub refresh_interval: Option<Duration>,
    pub notify_webhook_url: Option<String>,
    pub classifier_rules: ClassifierRules,
    pub server_port: u16,
}

impl PulseConfig {
    /// Load configuration from the process environment
    ///
    /// Reads:
    /// - GEMINI_API_KEY (falls back to API_KEY)
    /// - GEMINI_MODEL, GEMINI_API_BASE
    /// - SCAN_DURATION_SECS, ACQUISITION_TIMEOUT_SECS, REFRESH_INTERVAL_SECS
    /// - NOTIFY_WEBHOOK_URL
    /// - CLASSIFIER_RATE_LIMIT_MARKERS, CLASSIFIER_AUTH_MARKERS (comma separated)
    /// - SERVER_PORT
    pub fn from_env() -> PulseResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> PulseResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let scan_duration_secs: u32 =
            parse_var(&get, "SCAN_DURATION_SECS")?.unwrap_or(DEFAULT_SCAN_DURATION_SECS);
        let timeout_secs: u64 = parse_var(&get, "ACQUISITION_TIMEOUT_SECS")?
            .unwrap_or(scan_duration_secs as u64);
        if timeout_secs == 0 {
            return Err(PulseError::config(
                "ACQUISITION_TIMEOUT_SECS must be greater than zero",
            ));
        }
        let acquisition_timeout = Duration::from_secs(timeout_secs);

        let refresh_interval = parse_var::<u64, _>(&get, "REFRESH_INTERVAL_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let mut classifier_rules = ClassifierRules::default();
        if let Some(raw) = get("CLASSIFIER_RATE_LIMIT_MARKERS") {
            classifier_rules.rate_limit_markers = ClassifierRules::parse_markers(&raw);
        }
        if let Some(raw) = get("CLASSIFIER_AUTH_MARKERS") {
            classifier_rules.auth_markers = ClassifierRules::parse_markers(&raw);
        }

        Ok(Self {
            gemini: GeminiConfig {
                api_key: get("GEMINI_API_KEY").or_else(|| get("API_KEY")),
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                api_base: get("GEMINI_API_BASE").unwrap_or_else(|| GEMINI_API_BASE.to_string()),
                request_timeout: acquisition_timeout,
            },
            refresh: RefreshConfig {
                scan_duration_secs,
                acquisition_timeout,
            },
            refresh_interval,
            notify_webhook_url: get("NOTIFY_WEBHOOK_URL"),
            classifier_rules,
            server_port: parse_var(&get, "SERVER_PORT")?.unwrap_or(DEFAULT_SERVER_PORT),
        })
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> PulseResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| PulseError::config(format!("Invalid {} '{}': {}", key, raw, e)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> PulseResult<PulseConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PulseConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(config.gemini.api_key.is_none());
        assert_eq!(config.gemini.model, DEFAULT_MODEL);
        assert_eq!(config.gemini.api_base, GEMINI_API_BASE);
        assert_eq!(config.refresh, RefreshConfig::default());
        assert_eq!(config.gemini.request_timeout, Duration::from_secs(60));
        assert!(config.refresh_interval.is_none());
        assert!(config.notify_webhook_url.is_none());
        assert_eq!(config.classifier_rules, ClassifierRules::default());
        assert_eq!(config.server_port, 3001);
    }

    #[test]
    fn test_timeout_follows_scan_duration() {
        let config = config_from(&[("SCAN_DURATION_SECS", "45")]).unwrap();
        assert_eq!(config.refresh.scan_duration_secs, 45);
        assert_eq!(config.refresh.acquisition_timeout, Duration::from_secs(45));

        let config =
            config_from(&[("SCAN_DURATION_SECS", "45"), ("ACQUISITION_TIMEOUT_SECS", "90")]).unwrap();
        assert_eq!(config.refresh.acquisition_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_api_key_fallback() {
        let config = config_from(&[("API_KEY", "legacy")]).unwrap();
        assert_eq!(config.gemini.api_key.as_deref(), Some("legacy"));

        let config = config_from(&[("API_KEY", "legacy"), ("GEMINI_API_KEY", "primary")]).unwrap();
        assert_eq!(config.gemini.api_key.as_deref(), Some("primary"));

        let config = config_from(&[("GEMINI_API_KEY", "  ")]).unwrap();
        assert!(config.gemini.api_key.is_none());
    }

    #[test]
    fn test_refresh_interval() {
        let config = config_from(&[("REFRESH_INTERVAL_SECS", "3600")]).unwrap();
        assert_eq!(config.refresh_interval, Some(Duration::from_secs(3600)));

        let config = config_from(&[("REFRESH_INTERVAL_SECS", "0")]).unwrap();
        assert!(config.refresh_interval.is_none());
    }

    #[test]
    fn test_marker_overrides() {
        let config = config_from(&[("CLASSIFIER_AUTH_MARKERS", "denied, forbidden")]).unwrap();
        assert_eq!(config.classifier_rules.auth_markers, vec!["denied", "forbidden"]);
        assert_eq!(
            config.classifier_rules.rate_limit_markers,
            ClassifierRules::default().rate_limit_markers
        );
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let err = config_from(&[("SERVER_PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));

        assert!(config_from(&[("ACQUISITION_TIMEOUT_SECS", "0")]).is_err());
        assert!(config_from(&[("SCAN_DURATION_SECS", "-5")]).is_err());
    }
}
