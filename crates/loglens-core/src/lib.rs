//! loglens-core — the log ingestion, normalization and query pipeline.
//!
//! # Architecture
//!
//! ```text
//! FilterSpec ──► Query Builder ──► Poller ──► LogBackend
//!                                    │            │
//!                 View Controller ◄──┴─ Normalizer┘
//!                       │
//!                       └──► Exporter ──► Export Serializer ──► file
//! ```
//!
//! Each widget feed runs as one `tokio` task owned by a [`poller::Poller`];
//! its state is published through a `watch` channel. Nothing in this crate
//! touches a socket or the terminal directly: the HTTP side is behind
//! [`backend::LogBackend`].

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod normalizer;
pub mod poller;
pub mod query;
pub mod types;
pub mod view;

pub use backend::LogBackend;
pub use error::{ErrorKind, ErrorPresentation, FetchError};
pub use types::{AnomalyReport, FilterSpec, NormalizedLogEntry, RawLogRecord, RecordId, Role, SourceSpec};
