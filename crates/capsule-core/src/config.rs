//! Explicit pipeline configuration.
//!
//! Nothing in the pipeline reads global state: the normalizer, consolidator,
//! and query front-ends all take a configuration value at call time. The
//! value can be built in code or parsed from TOML:
//!
//! ```toml
//! [normalize]
//! skip_policy = "either"       # source-flag | duration | either
//! skip_threshold_ms = 30000
//! min_ms_played = 0
//!
//! [query]
//! default_bucket = "month"     # day | month | year
//! default_limit = 10
//! default_window_secs = 300
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::aggregate::Bucket;

/// How a play is classified as skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipPolicy {
    /// Trust the export's own `skipped` flag only.
    SourceFlag,
    /// Skipped iff `ms_played < skip_threshold_ms`.
    Duration,
    /// Skipped if the source flags it or it is shorter than the threshold.
    #[default]
    Either,
}

impl SkipPolicy {
    pub const ALL: [Self; 3] = [Self::SourceFlag, Self::Duration, Self::Either];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceFlag => "source-flag",
            Self::Duration => "duration",
            Self::Either => "either",
        }
    }

    /// True when the policy consults the duration threshold.
    #[must_use]
    pub const fn uses_threshold(self) -> bool {
        matches!(self, Self::Duration | Self::Either)
    }

    /// Classify one play.
    #[must_use]
    pub const fn classify(self, source_flag: Option<bool>, ms_played: u64, threshold_ms: u64) -> bool {
        let flagged = matches!(source_flag, Some(true));
        let short = ms_played < threshold_ms;
        match self {
            Self::SourceFlag => flagged,
            Self::Duration => short,
            Self::Either => flagged || short,
        }
    }
}

impl fmt::Display for SkipPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkipPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownSkipPolicy(s.to_string()))
    }
}

/// Record normalization policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    #[serde(default)]
    pub skip_policy: SkipPolicy,
    #[serde(default = "default_skip_threshold_ms")]
    pub skip_threshold_ms: u64,
    /// Plays shorter than this are filtered out of the log (not rejected).
    #[serde(default)]
    pub min_ms_played: u64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            skip_policy: SkipPolicy::default(),
            skip_threshold_ms: default_skip_threshold_ms(),
            min_ms_played: 0,
        }
    }
}

/// Defaults applied by front-ends when a query omits a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_bucket")]
    pub default_bucket: Bucket,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_window_secs")]
    pub default_window_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_bucket: default_bucket(),
            default_limit: default_limit(),
            default_window_secs: default_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleConfig {
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

impl CapsuleConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown enum
    /// values, and the validation errors of [`CapsuleConfig::validate`].
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would silently change query semantics.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroSkipThreshold`] when a duration-based skip
    ///   policy has a zero threshold (nothing could ever be skipped).
    /// - [`ConfigError::ZeroDefaultLimit`] when `query.default_limit` is 0.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.normalize.skip_policy.uses_threshold() && self.normalize.skip_threshold_ms == 0 {
            return Err(ConfigError::ZeroSkipThreshold);
        }
        if self.query.default_limit == 0 {
            return Err(ConfigError::ZeroDefaultLimit);
        }
        Ok(())
    }
}

/// Invalid configuration values. Always a hard error, never coerced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),

    #[error("unknown skip policy '{0}': expected one of source-flag, duration, either")]
    UnknownSkipPolicy(String),

    #[error("skip_threshold_ms must be positive when skip_policy uses durations")]
    ZeroSkipThreshold,

    #[error("query.default_limit must be at least 1")]
    ZeroDefaultLimit,
}

const fn default_skip_threshold_ms() -> u64 {
    30_000
}

const fn default_bucket() -> Bucket {
    Bucket::Month
}

const fn default_limit() -> usize {
    10
}

const fn default_window_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = CapsuleConfig::from_toml_str("").expect("parse");
        assert_eq!(config, CapsuleConfig::default());
        assert_eq!(config.normalize.skip_policy, SkipPolicy::Either);
        assert_eq!(config.normalize.skip_threshold_ms, 30_000);
        assert_eq!(config.query.default_bucket, Bucket::Month);
        assert_eq!(config.query.default_limit, 10);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config = CapsuleConfig::from_toml_str(
            "[normalize]\nskip_policy = \"source-flag\"\n\n[query]\ndefault_bucket = \"year\"\n",
        )
        .expect("parse");
        assert_eq!(config.normalize.skip_policy, SkipPolicy::SourceFlag);
        assert_eq!(config.normalize.skip_threshold_ms, 30_000);
        assert_eq!(config.query.default_bucket, Bucket::Year);
        assert_eq!(config.query.default_window_secs, 300);
    }

    #[test]
    fn unknown_bucket_is_a_parse_error() {
        let err = CapsuleConfig::from_toml_str("[query]\ndefault_bucket = \"week\"\n")
            .expect_err("week is not a bucket");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_limit_rejected() {
        let err = CapsuleConfig::from_toml_str("[query]\ndefault_limit = 0\n")
            .expect_err("zero limit");
        assert_eq!(err, ConfigError::ZeroDefaultLimit);
    }

    #[test]
    fn zero_threshold_only_matters_for_duration_policies() {
        let err = CapsuleConfig::from_toml_str("[normalize]\nskip_threshold_ms = 0\n")
            .expect_err("either uses threshold");
        assert_eq!(err, ConfigError::ZeroSkipThreshold);

        let ok = CapsuleConfig::from_toml_str(
            "[normalize]\nskip_policy = \"source-flag\"\nskip_threshold_ms = 0\n",
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn skip_policy_classification() {
        assert!(SkipPolicy::SourceFlag.classify(Some(true), 999_999, 30_000));
        assert!(!SkipPolicy::SourceFlag.classify(None, 1, 30_000));
        assert!(SkipPolicy::Duration.classify(Some(false), 29_999, 30_000));
        assert!(!SkipPolicy::Duration.classify(Some(true), 30_000, 30_000));
        assert!(SkipPolicy::Either.classify(Some(true), 200_000, 30_000));
        assert!(SkipPolicy::Either.classify(None, 10, 30_000));
        assert!(!SkipPolicy::Either.classify(Some(false), 200_000, 30_000));
    }

    #[test]
    fn skip_policy_fromstr_roundtrip() {
        for policy in SkipPolicy::ALL {
            assert_eq!(policy.as_str().parse::<SkipPolicy>(), Ok(policy));
        }
        assert!("sometimes".parse::<SkipPolicy>().is_err());
    }
}
