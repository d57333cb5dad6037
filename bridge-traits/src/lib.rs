//! # Host Bridge Traits
//!
//! Platform abstraction traits that the session core depends on.
//!
//! ## Overview
//!
//! The session core never talks to a keychain, a network stack or the wall
//! clock directly. Each of those capabilities is expressed as a trait here and
//! injected by the host (see `bridge-desktop` for the desktop adapters).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP used for renewal and wrapped API calls
//! - [`SecureStore`](storage::SecureStore) - Durable credential persistence (Keychain/Keystore)
//! - [`Clock`](time::Clock) - Time source for deterministic freshness checks
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert platform errors into it and keep secret values out of messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! between the renewal coordinator, the scheduler task and request wrappers.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::SecureStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
