//! ticker-feed: streams RSS feeds into a bounded story pool for a news
//! ticker.
//!
//! The crate is the ingestion side of the ticker. Feed bodies are scanned as
//! they arrive ([`scan`]), items are pulled apart ([`extract`]), cleaned
//! ([`sanitize`]) and checked ([`validate`]), and the survivors land in a
//! capacity-bounded [`pool`]. The [`engine`] ties this together per source
//! and per refresh cycle, and the [`playback`] queue deals stories back out
//! without showing the same source twice in a row.
//!
//! The terminal display lives in the binary and only ever sees immutable
//! [`engine::Snapshot`]s published by the [`poll`] driver.

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod playback;
pub mod poll;
pub mod pool;
pub mod sanitize;
pub mod scan;
pub mod source;
pub mod system;
pub mod validate;

pub use config::Config;
pub use engine::{RefreshReport, Snapshot, TickerEngine};
pub use error::{ConfigError, EngineError, ScanError, TransportError};
pub use source::{HttpTransport, Source, Story};
