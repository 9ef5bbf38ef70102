#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Quiver-HTTP: request composition and batch execution
//!
//! This crate builds outbound HTTP calls declaratively and executes them one
//! at a time or as a concurrent batch over a single multiplexed polling loop.
//!
//! ## Overview
//!
//! Three pieces do the heavy lifting:
//!
//! 1. **Parameter mapping**: a [`MapSpec`] maps a flat argument bag onto
//!    required (`#key`), renamed (`new:old`), grouped (choice), and nested
//!    request fields, resolved by a pure recursive-descent resolver.
//! 2. **URI model**: [`Uri`] parses, normalizes, and incrementally merges
//!    relative paths and query data with POSIX-style path resolution.
//! 3. **Batch scheduling**: [`BatchScheduler`] drives many in-flight
//!    requests through one busy-drain-then-wait loop and reports per-request
//!    and aggregate outcomes.
//!
//! A [`Request`] glues them together: fluent configuration, mapping specs for
//! query and body, ordered encode/decode transform pipelines, and a frozen
//! [`ComposedCall`] handed to the [`Transport`].
//!
//! ## Single request
//!
//! ```no_run
//! use quiver_http::{HttpTransport, MapSpec, Request};
//! use serde_json::json;
//!
//! let transport = HttpTransport::new()?;
//! let mut request = Request::parse("https://api.example.com/v1/search")
//!     .uri_map(MapSpec::new().field("#q").field("lang:locale"))
//!     .parameters(json!({"q": "rust", "locale": "en"}));
//!
//! let value = request.execute_with(&transport)?;
//! println!("status {}: {}", request.status_code(), value);
//! # Ok::<(), quiver_http::Error>(())
//! ```
//!
//! ## Batch
//!
//! ```no_run
//! use quiver_http::{BatchScheduler, Request};
//!
//! let mut batch = BatchScheduler::new()?;
//! batch.register(Request::parse("https://example.com/a"));
//! batch.register(Request::parse("https://example.com/b"));
//!
//! let all_ok = batch.execute()?;
//! if !all_ok {
//!     for req in batch.requests() {
//!         if let Some(error) = req.error() {
//!             eprintln!("failed: {}", error);
//!         }
//!     }
//! }
//! # Ok::<(), quiver_http::Error>(())
//! ```
//!
//! ## Module Structure
//!
//! - **[uri]** - URL model with decode/merge/add_path semantics
//! - **[mapping]** - declarative parameter resolver
//! - **[transform]** - JSON/XML/custom encode and decode stages
//! - **[request]** - fluent request composer
//! - **[transport]** - transport boundary and reqwest implementation
//! - **[batch]** - multiplexed batch scheduler
//! - **[error]** - error types and result handling

pub mod batch;
pub mod error;
pub mod mapping;
pub mod request;
pub mod transform;
pub mod transport;
pub mod uri;

pub use batch::{BatchOptions, BatchScheduler, Drive, Multiplexer, ReqwestMultiplexer};
pub use error::{Error, Result};
pub use mapping::{args_from, Args, MapRule, MapSpec};
pub use request::{CallBody, Method, Request};
pub use transform::Transform;
pub use transport::{
    ComposedCall, HttpTransport, Transport, TransportOptions, TransportResponse,
};
pub use uri::{QueryData, Uri};
