//! Runtime configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working ticker with the built-in source list. Sections mirror the parts of
//! the system they tune: `[fetch]` for the per-source state machine, `[pool]`
//! for storage limits, `[health]` for circuit breaking and host checks, and
//! `[display]` for the terminal ticker.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::source::{builtin_sources, Source};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "ticker.toml";

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    /// Overrides the built-in catalog when non-empty.
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Per-source fetch behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Skip TLS certificate validation. Many of the regional feeds serve
    /// broken chains; turn this off where that is not a concern.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Budget for locating one `<item>` token.
    #[serde(default = "default_token_timeout_ms")]
    pub token_timeout_ms: u64,
    /// Budget for capturing one item body.
    #[serde(default = "default_item_timeout_ms")]
    pub item_timeout_ms: u64,
    /// Budget for a whole source, connection included.
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
    #[serde(default = "default_poll_wait_ms")]
    pub poll_wait_ms: u64,
    #[serde(default = "default_find_stall_polls")]
    pub find_stall_polls: u32,
    #[serde(default = "default_capture_stall_polls")]
    pub capture_stall_polls: u32,
    /// Accepted stories per source per cycle.
    #[serde(default = "default_per_source_limit")]
    pub per_source_limit: usize,
    #[serde(default = "default_item_max_len")]
    pub item_max_len: usize,
    #[serde(default = "default_full_item_max_len")]
    pub full_item_max_len: usize,
    /// Cap on the description/content text used as a headline fallback.
    #[serde(default = "default_content_max_len")]
    pub content_max_len: usize,
    #[serde(default = "default_max_consecutive_rejections")]
    pub max_consecutive_rejections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_max_headline_len")]
    pub max_headline_len: usize,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: i64,
    /// Sources refreshed together in one cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Failure streak above which a source is skipped for a cycle.
    #[serde(default = "default_circuit_threshold")]
    pub circuit_threshold: u32,
    /// Free memory required to start a source fetch.
    #[serde(default = "default_memory_floor")]
    pub memory_floor_bytes: u64,
    /// Free memory below which a running fetch stops early.
    #[serde(default = "default_memory_abort_floor")]
    pub memory_abort_floor_bytes: u64,
    /// Consecutive failed reconnect cycles before giving up.
    #[serde(default = "default_max_link_failures")]
    pub max_link_failures: u32,
    #[serde(default = "default_reconnect_timeout_ms")]
    pub reconnect_timeout_ms: u64,
    /// Address dialed to decide whether the network link is up.
    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,
    /// Heartbeat silence after which the process exits.
    #[serde(default = "default_watchdog_secs")]
    pub watchdog_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Seconds between row replacements.
    #[serde(default = "default_carousel_secs")]
    pub carousel_secs: u64,
    #[serde(default = "default_rows")]
    pub rows: usize,
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            pool: PoolConfig::default(),
            health: HealthConfig::default(),
            display: DisplayConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_invalid_certs: default_true(),
            max_redirects: default_max_redirects(),
            token_timeout_ms: default_token_timeout_ms(),
            item_timeout_ms: default_item_timeout_ms(),
            source_timeout_ms: default_source_timeout_ms(),
            poll_wait_ms: default_poll_wait_ms(),
            find_stall_polls: default_find_stall_polls(),
            capture_stall_polls: default_capture_stall_polls(),
            per_source_limit: default_per_source_limit(),
            item_max_len: default_item_max_len(),
            full_item_max_len: default_full_item_max_len(),
            content_max_len: default_content_max_len(),
            max_consecutive_rejections: default_max_consecutive_rejections(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            max_headline_len: default_max_headline_len(),
            max_age_secs: default_max_age_secs(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            circuit_threshold: default_circuit_threshold(),
            memory_floor_bytes: default_memory_floor(),
            memory_abort_floor_bytes: default_memory_abort_floor(),
            max_link_failures: default_max_link_failures(),
            reconnect_timeout_ms: default_reconnect_timeout_ms(),
            probe_addr: default_probe_addr(),
            watchdog_secs: default_watchdog_secs(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            carousel_secs: default_carousel_secs(),
            rows: default_rows(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (ticker-feed)".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_redirects() -> usize {
    10
}

fn default_token_timeout_ms() -> u64 {
    10_000
}

fn default_item_timeout_ms() -> u64 {
    8_000
}

fn default_source_timeout_ms() -> u64 {
    20_000
}

fn default_poll_wait_ms() -> u64 {
    250
}

fn default_find_stall_polls() -> u32 {
    12
}

fn default_capture_stall_polls() -> u32 {
    20
}

fn default_per_source_limit() -> usize {
    6
}

fn default_item_max_len() -> usize {
    1500
}

fn default_full_item_max_len() -> usize {
    4000
}

fn default_content_max_len() -> usize {
    200
}

fn default_max_consecutive_rejections() -> u32 {
    3
}

fn default_max_size() -> usize {
    180
}

fn default_max_headline_len() -> usize {
    crate::sanitize::DEFAULT_MAX_HEADLINE_LEN
}

fn default_max_age_secs() -> i64 {
    129_600
}

fn default_batch_size() -> usize {
    6
}

fn default_circuit_threshold() -> u32 {
    3
}

fn default_memory_floor() -> u64 {
    64 * MIB
}

fn default_memory_abort_floor() -> u64 {
    32 * MIB
}

fn default_max_link_failures() -> u32 {
    4
}

fn default_reconnect_timeout_ms() -> u64 {
    10_000
}

fn default_probe_addr() -> String {
    "1.1.1.1:443".to_string()
}

fn default_watchdog_secs() -> u64 {
    90
}

fn default_refresh_interval_secs() -> u64 {
    900
}

fn default_carousel_secs() -> u64 {
    15
}

fn default_rows() -> usize {
    3
}

fn default_utc_offset_hours() -> i32 {
    -5
}

impl FetchConfig {
    pub fn token_timeout(&self) -> Duration {
        Duration::from_millis(self.token_timeout_ms)
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    pub fn poll_wait(&self) -> Duration {
        Duration::from_millis(self.poll_wait_ms)
    }
}

impl HealthConfig {
    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.reconnect_timeout_ms)
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_secs(self.watchdog_secs)
    }
}

impl DisplayConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn carousel(&self) -> Duration {
        Duration::from_secs(self.carousel_secs)
    }
}

impl Config {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] when it exists,
    /// falling back to defaults. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path: Option<PathBuf> = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                local.exists().then_some(local)
            }
        };

        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?;
                info!(path = %path.display(), "loaded config");
                config
            }
            None => {
                debug!("no config file, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Configured sources, or the built-in catalog when none are given.
    pub fn resolved_sources(&self) -> Vec<Source> {
        if self.sources.is_empty() {
            builtin_sources()
        } else {
            self.sources.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolved_sources().is_empty() {
            return Err(ConfigError::NoSources);
        }
        if self.pool.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.pool.max_headline_len < 4 {
            return Err(ConfigError::HeadlineTooShort(self.pool.max_headline_len));
        }
        if self.pool.max_size < 2 {
            return Err(ConfigError::PoolTooSmall(self.pool.max_size));
        }
        if self.display.utc_offset_hours.unsigned_abs() > 14 {
            return Err(ConfigError::UtcOffsetOutOfRange(self.display.utc_offset_hours));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Palette;
    use std::io::Write;

    #[test]
    fn defaults_match_firmware_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.pool.max_size, 180);
        assert_eq!(cfg.pool.max_headline_len, 114);
        assert_eq!(cfg.pool.max_age_secs, 36 * 3600);
        assert_eq!(cfg.fetch.per_source_limit, 6);
        assert_eq!(cfg.fetch.source_timeout(), Duration::from_secs(20));
        assert_eq!(cfg.health.circuit_threshold, 3);
        assert_eq!(cfg.display.refresh_interval(), Duration::from_secs(900));
        assert_eq!(cfg.resolved_sources().len(), 30);
        cfg.validate().unwrap();
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.pool.batch_size, 6);
        assert!(cfg.fetch.accept_invalid_certs);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = Config::from_toml("[pool]\nmax_size = 40\n").unwrap();
        assert_eq!(cfg.pool.max_size, 40);
        assert_eq!(cfg.pool.batch_size, 6);
        assert_eq!(cfg.display.rows, 3);
    }

    #[test]
    fn load_reads_file_with_sources() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[display]
rows = 2

[[sources]]
name = "LOCAL"
url = "https://example.com/feed"
text = "white"
background = "navy"
title = "cyan"
age_exempt = true
"#
        )
        .unwrap();

        let cfg = Config::load(Some(file.path())).unwrap();
        assert_eq!(cfg.display.rows, 2);
        let sources = cfg.resolved_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].style.background, Palette::Navy);
        assert!(sources[0].age_exempt);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pool\nmax_size = ").unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.pool.batch_size = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidBatchSize)));

        let mut cfg = Config::default();
        cfg.pool.max_headline_len = 3;
        assert!(matches!(cfg.validate(), Err(ConfigError::HeadlineTooShort(3))));

        let mut cfg = Config::default();
        cfg.pool.max_size = 1;
        assert!(matches!(cfg.validate(), Err(ConfigError::PoolTooSmall(1))));

        let mut cfg = Config::default();
        cfg.display.utc_offset_hours = 1_000_000;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UtcOffsetOutOfRange(1_000_000))
        ));
        cfg.display.utc_offset_hours = i32::MIN;
        assert!(matches!(cfg.validate(), Err(ConfigError::UtcOffsetOutOfRange(_))));
        cfg.display.utc_offset_hours = -14;
        assert!(cfg.validate().is_ok());
    }
}
