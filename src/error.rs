//! Error types shared across the ingestion engine.
//!
//! Only transport failures and configuration problems are real errors here.
//! Per-item problems (bad dates, boilerplate headlines, duplicates) are
//! ordinary outcomes and are modelled by [`crate::engine::Rejection`]
//! instead, because the fetch loop always recovers from them.

use std::path::PathBuf;

use thiserror::Error;

/// Why a byte-stream scan ended without finding what it was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The wall-clock budget for this scan ran out.
    #[error("scan timed out")]
    TimedOut,
    /// Too many consecutive polls came back with no data.
    #[error("stream stalled")]
    Stalled,
    /// The peer closed the stream.
    #[error("stream closed")]
    Closed,
}

/// Failure to open a feed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("at least one feed source must be configured")]
    NoSources,
    #[error("pool.batch_size must be at least 1")]
    InvalidBatchSize,
    #[error("pool.max_headline_len must be at least 4, got {0}")]
    HeadlineTooShort(usize),
    #[error("pool.max_size must leave room for the two placeholder stories, got {0}")]
    PoolTooSmall(usize),
    #[error("display.utc_offset_hours must be within -14..=14, got {0}")]
    UtcOffsetOutOfRange(i32),
}

/// Conditions that end the ingestion engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The network link stayed down across too many refresh cycles.
    #[error("network link lost for {failures} consecutive refresh cycles")]
    LinkLost { failures: u32 },
}
