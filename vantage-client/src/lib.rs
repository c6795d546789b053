//! VANTAGE Client - Resilient fetch/cache/retry client
//!
//! Wraps the data-governance optimization backend behind a cache-through,
//! retry-aware client with one shared state-of-truth. Reads consult a
//! TTL-bound cache before the network; transient failures retry with
//! exponential backoff; mutations commit only after the backend confirms.
//! `open()` starts the auto-refresh and live-channel tasks, `close()` tears
//! them down.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
mod realtime;
mod refresh;
pub mod retry;
pub mod state;
pub mod transport;

pub use cache::TtlCache;
pub use client::VantageClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, ClientResult};
pub use http::HttpTransport;
pub use metrics::{ClientMetrics, MetricsSnapshot};
pub use retry::RetryPolicy;
pub use state::{ConsoleState, LiveStatus, StateError};
pub use transport::Transport;
