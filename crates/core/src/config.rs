//! Run configuration loaded from TOML
//!
//! ```toml
//! book = "books/performance.bin"
//! pv_count = 3
//! limit = { time = 0.5 }
//!
//! [[engines]]
//! path = "/usr/bin/stockfish"
//! options = { hash_mb = 256, threads = 2 }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::correlation::{AnalysisSettings, Direction};
use crate::engine::{AnalysisLimit, EngineSpec};
use crate::error::{Error, Result};

/// Lines per engine when nothing is configured
pub const DEFAULT_PV_COUNT: u32 = 1;

/// Seconds per position when no limit is configured
pub const DEFAULT_MOVE_TIME: f64 = 1.0;

/// Search limit as written in the file
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitConfig {
    /// Seconds per position
    Time(f64),
    /// Plies per position
    Depth(u32),
}

impl LimitConfig {
    pub fn to_limit(self) -> Result<AnalysisLimit> {
        match self {
            LimitConfig::Time(seconds) => AnalysisLimit::time_secs(seconds),
            LimitConfig::Depth(plies) => AnalysisLimit::depth(plies),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub engines: Vec<EngineSpec>,
    /// Polyglot opening book
    pub book: Option<PathBuf>,
    pub pv_count: Option<u32>,
    pub limit: Option<LimitConfig>,
    #[serde(default)]
    pub backward: bool,
    /// Directory for per-file analysis logs
    pub log_dir: Option<PathBuf>,
}

impl RunConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            Error::Configuration(msg) => {
                Error::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(contents)
            .map_err(|e| Error::Configuration(format!("invalid config: {}", e)))?;
        for engine in &config.engines {
            engine.options.validate()?;
        }
        Ok(config)
    }

    /// Settings for the run, with defaults filled in
    pub fn analysis_settings(&self) -> Result<AnalysisSettings> {
        let limit = match self.limit {
            Some(limit) => limit.to_limit()?,
            None => AnalysisLimit::time_secs(DEFAULT_MOVE_TIME)?,
        };
        let direction = if self.backward {
            Direction::Backward
        } else {
            Direction::Forward
        };
        AnalysisSettings::new(limit, self.pv_count.unwrap_or(DEFAULT_PV_COUNT), direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_full_config() {
        let config = RunConfig::from_toml_str(
            r#"
book = "books/performance.bin"
pv_count = 3
limit = { depth = 18 }
backward = true
log_dir = "logs"

[[engines]]
path = "/usr/bin/stockfish"
options = { hash_mb = 256, threads = 2, extra = { "Skill Level" = "20" } }

[[engines]]
path = "/opt/engines/lc0"
args = ["--backend=blas"]
name = "Leela"
timeouts = { handshake_ms = 60000 }
"#,
        )
        .unwrap();

        assert_eq!(config.engines.len(), 2);
        assert_eq!(config.engines[0].options.hash_mb, Some(256));
        assert_eq!(config.engines[0].options.extra["Skill Level"], "20");
        assert_eq!(config.engines[1].label(), "Leela");
        assert_eq!(config.engines[1].timeouts.handshake(), Duration::from_secs(60));
        assert_eq!(config.engines[1].timeouts.search_margin_ms, 5_000);
        assert_eq!(config.book, Some(PathBuf::from("books/performance.bin")));

        let settings = config.analysis_settings().unwrap();
        assert_eq!(settings.pv_count, 3);
        assert_eq!(settings.limit, AnalysisLimit::depth(18).unwrap());
        assert_eq!(settings.direction, Direction::Backward);
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert!(config.engines.is_empty());
        let settings = config.analysis_settings().unwrap();
        assert_eq!(settings.pv_count, DEFAULT_PV_COUNT);
        assert_eq!(settings.limit, AnalysisLimit::Time(Duration::from_secs(1)));
        assert_eq!(settings.direction, Direction::Forward);
    }

    #[test]
    fn test_time_limit() {
        let config = RunConfig::from_toml_str("limit = { time = 0.25 }").unwrap();
        assert_eq!(
            config.analysis_settings().unwrap().limit,
            AnalysisLimit::Time(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        for toml in [
            "limit = { depth = 0 }",
            "limit = { time = -1.0 }",
            "pv_count = 0",
        ] {
            let config = RunConfig::from_toml_str(toml).unwrap();
            let err = config.analysis_settings().unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{}", toml);
        }

        let err = RunConfig::from_toml_str("unknown = 1").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = RunConfig::from_toml_str(
            "[[engines]]\npath = \"sf\"\noptions = { extra = { MultiPV = \"4\" } }",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RunConfig::load("/nonexistent/correlation.toml").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
