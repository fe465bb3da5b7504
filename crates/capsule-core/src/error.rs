use std::fmt;
use std::time::Duration;

/// Machine-readable error codes surfaced by front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidConfig,
    ConfigNotFound,
    InputNotFound,
    InputUnreadable,
    InvalidQuery,
    ExportWriteFailed,
    InternalUnexpected,
}

impl ErrorCode {
    pub const ALL: [Self; 8] = [
        Self::ConfigParseError,
        Self::InvalidConfig,
        Self::ConfigNotFound,
        Self::InputNotFound,
        Self::InputUnreadable,
        Self::InvalidQuery,
        Self::ExportWriteFailed,
        Self::InternalUnexpected,
    ];

    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidConfig => "E1002",
            Self::ConfigNotFound => "E1003",
            Self::InputNotFound => "E2001",
            Self::InputUnreadable => "E2002",
            Self::InvalidQuery => "E3001",
            Self::ExportWriteFailed => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidConfig => "Invalid configuration value",
            Self::ConfigNotFound => "Config file not found",
            Self::InputNotFound => "Export path not found",
            Self::InputUnreadable => "Export path unreadable",
            Self::InvalidQuery => "Invalid query parameter",
            Self::ExportWriteFailed => "Export write failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in capsule.toml and retry."),
            Self::InvalidConfig => {
                Some("Use a positive skip_threshold_ms and a default_limit of at least 1.")
            }
            Self::ConfigNotFound => Some("Check the --config path."),
            Self::InputNotFound => Some("Pass export files or a directory containing *.json."),
            Self::InputUnreadable => Some("Check file permissions."),
            Self::InvalidQuery => Some("Run the command with --help to see accepted values."),
            Self::ExportWriteFailed => Some("Check disk space and write permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Contract violations in query parameters.
///
/// Empty results are never errors; these are.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("limit must be at least 1")]
    ZeroLimit,

    #[error("window of {0:?} is too large to represent")]
    WindowOutOfRange(Duration),

    #[error("unknown dimension '{0}': expected track or artist")]
    UnknownDimension(String),

    #[error("unknown metric '{0}': expected plays or ms")]
    UnknownMetric(String),

    #[error("unknown bucket '{0}': expected day, month, or year")]
    UnknownBucket(String),
}

impl QueryError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidQuery
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ErrorCode::ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ErrorCode::ALL {
            let s = code.code();
            assert_eq!(s.len(), 5);
            assert!(s.starts_with('E'));
            assert!(s.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn config_codes_share_the_e1_range() {
        assert_eq!(ErrorCode::ConfigNotFound.code(), "E1003");
        assert!(ErrorCode::ConfigNotFound.hint().is_some_and(|h| h.contains("--config")));
    }

    #[test]
    fn display_is_the_code() {
        assert_eq!(ErrorCode::InvalidQuery.to_string(), "E3001");
    }
}
