//! Configuration file parser for ~/.config/feedsweep/config.toml, plus the
//! duration syntax accepted for the polling interval.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings since they are
//! usually typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),

    #[error("Invalid interval {input:?}: {reason}")]
    InvalidInterval { input: String, reason: String },

    #[error("HOME environment variable not set")]
    NoHome,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. Defaults to `feedsweep.db` in the config directory.
    pub database_path: Option<PathBuf>,

    /// Sent as the User-Agent header on every feed request.
    pub user_agent: String,

    /// Number of due feeds picked up per sweep.
    pub batch_size: u32,

    /// Upper bound on feeds fetched at the same time within one sweep.
    pub max_concurrent_fetches: usize,

    /// Per-request timeout in seconds. 0 disables the timeout.
    pub request_timeout_secs: u64,

    /// Responses larger than this are rejected.
    pub max_feed_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            user_agent: format!("feedsweep/{}", env!("CARGO_PKG_VERSION")),
            batch_size: 10,
            max_concurrent_fetches: 10,
            request_timeout_secs: 30,
            max_feed_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "database_path",
        "user_agent",
        "batch_size",
        "max_concurrent_fetches",
        "request_timeout_secs",
        "max_feed_bytes",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_fetches must be at least 1".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent must not be empty".into()));
        }
        Ok(())
    }

    /// `None` when the timeout is disabled
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Database path, falling back to `<config_dir>/feedsweep.db`
    pub fn database_path_in(&self, config_dir: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| config_dir.join("feedsweep.db"))
    }
}

/// The config directory path (~/.config/feedsweep/)
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(".config").join("feedsweep"))
}

// ============================================================================
// Interval Parsing
// ============================================================================

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Parse a polling interval such as `30s`, `1m`, `1h30m` or `1.5h`.
///
/// The input is one or more `<decimal><unit>` pairs with units `ns`, `us`
/// (or `µs`), `ms`, `s`, `m` and `h`. The result must be strictly positive.
pub fn parse_interval(input: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidInterval {
        input: input.to_string(),
        reason,
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty duration".into()));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("must be positive".into()));
    }
    let mut rest = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_end];
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        if number.is_empty() || number == "." {
            return Err(invalid(format!("expected a number before {:?}", unit)));
        }

        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SECOND,
            "m" => 60 * NANOS_PER_SECOND,
            "h" => 3_600 * NANOS_PER_SECOND,
            "" => return Err(invalid(format!("missing unit after {}", number))),
            other => return Err(invalid(format!("unknown unit {:?}", other))),
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if fraction.contains('.') {
            return Err(invalid(format!("malformed number {}", number)));
        }

        let out_of_range = || invalid("duration out of range".into());
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };
        let mut part = whole.checked_mul(unit_nanos).ok_or_else(out_of_range)?;

        if !fraction.is_empty() {
            // Digits past nanosecond precision of the largest unit cannot
            // change the result.
            let digits = &fraction[..fraction.len().min(18)];
            let scale = 10u128.pow(digits.len() as u32);
            let value: u128 = digits.parse().map_err(|_| out_of_range())?;
            part += value * unit_nanos / scale;
        }

        total = total.checked_add(part).ok_or_else(out_of_range)?;
    }

    if total == 0 {
        return Err(invalid("must be greater than zero".into()));
    }
    let nanos = u64::try_from(total).map_err(|_| invalid("duration out of range".into()))?;
    Ok(Duration::from_nanos(nanos))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database_path.is_none());
        assert!(config.user_agent.starts_with("feedsweep/"));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_concurrent_fetches, 10);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.max_feed_bytes, 10 * 1024 * 1024);
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedsweep_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("feedsweep_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "  \n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.batch_size, 10);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("feedsweep_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
database_path = "/var/lib/feedsweep/posts.db"
user_agent = "my-aggregator/2.0"
batch_size = 3
max_concurrent_fetches = 1
request_timeout_secs = 0
max_feed_bytes = 4096
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.database_path_in(Path::new("/unused")),
            PathBuf::from("/var/lib/feedsweep/posts.db")
        );
        assert_eq!(config.user_agent, "my-aggregator/2.0");
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.max_concurrent_fetches, 1);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.max_feed_bytes, 4096);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("feedsweep_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "batch_size = 25\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.max_concurrent_fetches, 10);
        assert_eq!(
            config.database_path_in(Path::new("/home/me/.config/feedsweep")),
            PathBuf::from("/home/me/.config/feedsweep/feedsweep.db")
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("feedsweep_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let dir = std::env::temp_dir().join("feedsweep_config_test_zero_batch");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "batch_size = 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("feedsweep_config_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "batch_size = 5\nbatchsize = 7\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.batch_size, 5);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("feedsweep_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    // ========================================================================
    // parse_interval
    // ========================================================================

    #[test]
    fn test_parse_interval_single_units() {
        assert_eq!(parse_interval("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_interval("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_interval("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_interval("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_interval("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_interval("250µs").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_interval("10ns").unwrap(), Duration::from_nanos(10));
    }

    #[test]
    fn test_parse_interval_compound_and_fractional() {
        assert_eq!(parse_interval("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_interval("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_interval(".5s").unwrap(), Duration::from_millis(500));
        assert_eq!(
            parse_interval("2m30.25s").unwrap(),
            Duration::from_millis(150_250)
        );
        assert_eq!(parse_interval(" +1m ").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_interval_rejects_bad_input() {
        for input in ["", "   ", "10", "abc", "5x", "1m5", "..5s", "1..5s", "s"] {
            let err = parse_interval(input).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidInterval { .. }),
                "{:?} gave {:?}",
                input,
                err
            );
        }
    }

    #[test]
    fn test_parse_interval_rejects_non_positive() {
        assert!(matches!(
            parse_interval("0s"),
            Err(ConfigError::InvalidInterval { .. })
        ));
        assert!(matches!(
            parse_interval("-1m"),
            Err(ConfigError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn test_parse_interval_overflow() {
        assert!(parse_interval("99999999999999999999999h").is_err());
    }
}
