//! Matcher configuration.
//!
//! The flags are injected into every matcher at construction time rather than
//! read from process-wide state, so two stores with different settings can
//! live side by side.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_true() -> bool {
    true
}

fn default_max_expectations() -> usize {
    5000
}

fn default_open_api_fetch_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatcherConfig {
    /// Stop evaluating a request as soon as one non-blank field fails.
    #[serde(default = "default_true")]
    pub matchers_fail_fast: bool,

    /// Record per-field differences explaining a failed match.
    #[serde(default = "default_true")]
    pub detailed_match_failures: bool,

    /// Upper bound on stored expectations; the oldest are evicted first.
    #[serde(default = "default_max_expectations")]
    pub max_expectations: usize,

    /// Timeout applied when an OpenAPI spec has to be fetched over HTTP.
    #[serde(default = "default_open_api_fetch_timeout_ms")]
    pub open_api_fetch_timeout_ms: u64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            matchers_fail_fast: default_true(),
            detailed_match_failures: default_true(),
            max_expectations: default_max_expectations(),
            open_api_fetch_timeout_ms: default_open_api_fetch_timeout_ms(),
        }
    }
}

impl MatcherConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: MatcherConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_expectations == 0 {
            anyhow::bail!("maxExpectations must be greater than zero");
        }
        if self.open_api_fetch_timeout_ms == 0 {
            anyhow::bail!("openApiFetchTimeoutMs must be greater than zero");
        }
        Ok(())
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.matchers_fail_fast = fail_fast;
        self
    }

    pub fn with_detailed_match_failures(mut self, detailed: bool) -> Self {
        self.detailed_match_failures = detailed;
        self
    }

    pub fn open_api_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.open_api_fetch_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MatcherConfig::default();
        assert!(config.matchers_fail_fast);
        assert!(config.detailed_match_failures);
        assert_eq!(config.max_expectations, 5000);
        assert_eq!(config.open_api_fetch_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
matchersFailFast: false
maxExpectations: 10
"#;
        let config: MatcherConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.matchers_fail_fast);
        assert!(config.detailed_match_failures);
        assert_eq!(config.max_expectations, 10);
    }

    #[test]
    fn test_from_file_rejects_zero_capacity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "maxExpectations: 0").unwrap();
        let err = MatcherConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("maxExpectations"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "detailedMatchFailures: false\nopenApiFetchTimeoutMs: 250").unwrap();
        let config = MatcherConfig::from_file(file.path()).unwrap();
        assert!(!config.detailed_match_failures);
        assert_eq!(config.open_api_fetch_timeout(), Duration::from_millis(250));
    }
}
