use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Context, Result};

use super::{validator, FeedConfig};

const DEFAULT_PATHS: [&str; 2] = ["config.json", "config/config.json"];

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    BuiltIn,
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOrigin::File(path) => write!(f, "{}", path.display()),
            ConfigOrigin::BuiltIn => f.write_str("built-in defaults"),
        }
    }
}

impl FeedConfig {
    /// Strict load: the file must exist, parse, and validate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config = Self::from_json(&json)?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: FeedConfig = serde_json::from_str(json)?;
        validator::validate_config(&config)?;
        Ok(config)
    }

    /// Load the explicit path, else the first default location that exists,
    /// else the built-in defaults. Any file that is found must be valid.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigOrigin)> {
        let candidate = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => DEFAULT_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|path| path.exists()),
        };

        match candidate {
            Some(path) => {
                let config = Self::from_file(&path)?;
                Ok((config, ConfigOrigin::File(path)))
            }
            None => Ok((Self::default(), ConfigOrigin::BuiltIn)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuoteFormat;
    use crate::error::AppError;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = FeedConfig::from_json(r#"{ "polling": { "interval_ms": 1500 } }"#)
            .expect("partial config parses");

        assert_eq!(config.polling.interval_ms, 1500);
        assert_eq!(config.chart.window_capacity, 50);
        assert_eq!(config.history.adjustment, "qfq");
        assert_eq!(config.realtime.format, QuoteFormat::Sina);
    }

    #[test]
    fn selects_tilde_format() {
        let config = FeedConfig::from_json(
            r#"{ "realtime": { "format": "tencent", "url_template": "http://qt.gtimg.cn/q={code}" } }"#,
        )
        .expect("config parses");

        assert_eq!(config.realtime.format, QuoteFormat::Tencent);
        assert_eq!(config.realtime.format.delimiter(), '~');
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = FeedConfig::from_json(r#"{ "chart": { "window_capacity": 0 } }"#)
            .expect_err("zero capacity must fail");
        assert!(matches!(err, AppError::Config(_)), "unexpected error: {err}");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = FeedConfig::load(Some(Path::new("/nonexistent/stock-feed.json")))
            .expect_err("missing explicit config must fail");
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn explicit_broken_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("stock-feed-{}.json", std::process::id()));
        fs::write(&path, r#"{ "polling": { "interval_ms": 0 } }"#).unwrap();

        let result = FeedConfig::load(Some(&path));
        fs::remove_file(&path).ok();

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn no_file_uses_built_in_defaults() {
        let (config, origin) = FeedConfig::load(None).expect("defaults");
        assert_eq!(origin, ConfigOrigin::BuiltIn);
        assert_eq!(config.polling.interval_ms, 5_000);
        assert_eq!(origin.to_string(), "built-in defaults");
    }
}
