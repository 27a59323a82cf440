//! Typed engine configuration

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Options that the correlation run manages itself and must not be overridden.
const RESERVED_OPTIONS: &[&str] = &["MultiPV", "UCI_AnalyseMode"];

/// Options applied once to an engine before any analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineOptions {
    /// Transposition table size in MB (UCI `Hash`)
    pub hash_mb: Option<u32>,
    /// Search threads (UCI `Threads`)
    pub threads: Option<u32>,
    /// Engine-specific options passed through as `setoption name <k> value <v>`
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl EngineOptions {
    pub fn validate(&self) -> Result<()> {
        if self.hash_mb == Some(0) {
            return Err(Error::Configuration("hash size must be at least 1 MB".into()));
        }
        if self.threads == Some(0) {
            return Err(Error::Configuration("thread count must be at least 1".into()));
        }
        for name in self.extra.keys() {
            if name.trim().is_empty() {
                return Err(Error::Configuration("engine option with an empty name".into()));
            }
            if RESERVED_OPTIONS.iter().any(|r| r.eq_ignore_ascii_case(name)) {
                return Err(Error::Configuration(format!(
                    "option '{}' is managed by the analysis run and cannot be set",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Overlays `other` on top of these options.
    pub fn merge(&mut self, other: &EngineOptions) {
        if other.hash_mb.is_some() {
            self.hash_mb = other.hash_mb;
        }
        if other.threads.is_some() {
            self.threads = other.threads;
        }
        for (name, value) in &other.extra {
            self.extra.insert(name.clone(), value.clone());
        }
    }

    /// Parses a `NAME=VALUE` pair into `extra`.
    pub fn insert_pair(&mut self, pair: &str) -> Result<()> {
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            Error::Configuration(format!("engine option '{}' is not NAME=VALUE", pair))
        })?;
        self.extra
            .insert(name.trim().to_string(), value.trim().to_string());
        Ok(())
    }
}

/// How long to wait on an engine before treating it as unresponsive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineTimeouts {
    /// `uci`/`uciok` and `isready`/`readyok` round trips
    pub handshake_ms: u64,
    /// Extra time granted over a movetime search, and after `stop`
    pub search_margin_ms: u64,
    /// Upper bound for a depth-limited search
    pub depth_search_ms: u64,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        EngineTimeouts {
            handshake_ms: 30_000,
            search_margin_ms: 5_000,
            depth_search_ms: 600_000,
        }
    }
}

impl EngineTimeouts {
    pub fn handshake(&self) -> Duration {
        Duration::from_millis(self.handshake_ms)
    }

    pub fn search_margin(&self) -> Duration {
        Duration::from_millis(self.search_margin_ms)
    }

    pub fn depth_search(&self) -> Duration {
        Duration::from_millis(self.depth_search_ms)
    }
}

/// How to start one engine and what to configure on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    /// Overrides the `id name` the engine reports
    pub name: Option<String>,
    #[serde(default)]
    pub options: EngineOptions,
    #[serde(default)]
    pub timeouts: EngineTimeouts,
}

impl EngineSpec {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        EngineSpec {
            path: path.into(),
            args: Vec::new(),
            name: None,
            options: EngineOptions::default(),
            timeouts: EngineTimeouts::default(),
        }
    }

    /// Label used before the engine has identified itself
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_reserved_and_zero() {
        let mut options = EngineOptions::default();
        assert!(options.validate().is_ok());

        options.hash_mb = Some(0);
        assert!(options.validate().is_err());
        options.hash_mb = Some(256);

        options.insert_pair("multipv=4").unwrap();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_insert_pair_and_merge() {
        let mut base = EngineOptions {
            hash_mb: Some(128),
            threads: Some(1),
            extra: BTreeMap::new(),
        };
        let mut overlay = EngineOptions {
            threads: Some(4),
            ..Default::default()
        };
        overlay.insert_pair("SyzygyPath = /tb").unwrap();
        assert!(overlay.insert_pair("Contempt").is_err());

        base.merge(&overlay);
        assert_eq!(base.hash_mb, Some(128));
        assert_eq!(base.threads, Some(4));
        assert_eq!(base.extra.get("SyzygyPath").map(String::as_str), Some("/tb"));
    }

    #[test]
    fn test_spec_label() {
        let spec = EngineSpec::new("/opt/engines/stockfish_15_x64");
        assert_eq!(spec.label(), "stockfish_15_x64");

        let named = EngineSpec {
            name: Some("Komodo".into()),
            ..EngineSpec::new("komodo")
        };
        assert_eq!(named.label(), "Komodo");
    }
}
