//! Concurrent batch execution.
//!
//! A [`BatchScheduler`] multiplexes many in-flight requests over a single
//! polling loop on the calling thread: no worker threads, no CPU parallelism,
//! concurrency is I/O-interleaved. [`BatchScheduler::execute`] blocks until
//! every registered request has completed or failed; individual transport
//! failures never abort the batch, they only flip the aggregate result to
//! `false` while each member request records its own response and error
//! state.
//!
//! # Module Organization
//!
//! ```text
//! batch/
//! ├── driver      - drive loop, Multiplexer trait, BatchOptions
//! └── multiplexer - reqwest-backed multiplexed handle set
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use quiver_http::{BatchScheduler, Request};
//!
//! let mut batch = BatchScheduler::new()?;
//! batch.register(Request::parse("https://example.com/a"));
//! batch.register(Request::parse("https://example.com/b"));
//!
//! let all_ok = batch.execute()?;
//! let bodies = batch.map(|req| req.response_text());
//! # let _ = (all_ok, bodies);
//! # Ok::<(), quiver_http::Error>(())
//! ```

mod driver;
mod multiplexer;

pub use driver::{drive_to_completion, BatchOptions, Drive, Multiplexer};
pub use multiplexer::{ReqwestMultiplexer, Token};

use crate::error::{Error, Result};
use crate::request::Request;
use crate::transport::{error_code, ComposedCall, TransportResponse};

/// A set of requests executed concurrently over one multiplexed handle set.
///
/// Lifecycle: created, populated via the `register` calls, executed exactly
/// once, after which each member request owns its own result. The scheduler
/// itself keeps no result state beyond the aggregate success flag it
/// returns.
pub struct BatchScheduler {
    mux: ReqwestMultiplexer,
    requests: Vec<Request>,
    raw_tokens: Vec<Token>,
    options: BatchOptions,
    executed: bool,
}

impl BatchScheduler {
    /// Create a scheduler with default options.
    pub fn new() -> Result<Self> {
        BatchScheduler::with_options(BatchOptions::default())
    }

    /// Create a scheduler with explicit timing options.
    pub fn with_options(options: BatchOptions) -> Result<Self> {
        Ok(BatchScheduler {
            mux: ReqwestMultiplexer::new()?,
            requests: Vec::new(),
            raw_tokens: Vec::new(),
            options,
            executed: false,
        })
    }

    /// Register a request. Its method, URL, and body are finalized when the
    /// batch executes.
    pub fn register(&mut self, request: Request) -> &mut Self {
        self.requests.push(request);
        self
    }

    /// Register several requests at once.
    pub fn register_all(&mut self, requests: impl IntoIterator<Item = Request>) -> &mut Self {
        self.requests.extend(requests);
        self
    }

    /// Register a bare transport handle from an already composed call.
    ///
    /// The returned token fetches the response via
    /// [`BatchScheduler::take_response`] after execution.
    pub fn register_call(&mut self, call: ComposedCall) -> Token {
        let token = self.mux.add(call);
        self.raw_tokens.push(token);
        token
    }

    /// Deferred registration: the callback receives the scheduler itself.
    pub fn register_with(&mut self, register: impl FnOnce(&mut Self)) -> &mut Self {
        register(self);
        self
    }

    /// Number of registered requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// True when nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.raw_tokens.is_empty()
    }

    /// Execute every registered request concurrently and block until all
    /// have completed or failed.
    ///
    /// Returns `Ok(false)` immediately when nothing is registered. Otherwise
    /// each request is composed up front (configuration errors abort the
    /// batch before any transfer starts and release all handles), the drive
    /// loop runs to completion, and every request's response state is
    /// populated. The aggregate is `true` only when no member recorded a
    /// non-zero transport error code.
    pub fn execute(&mut self) -> Result<bool> {
        if self.executed {
            return Err(Error::Batch("batch already executed".to_string()));
        }
        if self.is_empty() {
            return Ok(false);
        }
        self.executed = true;

        let mut tokens = Vec::with_capacity(self.requests.len());
        for request in &self.requests {
            match request.compose() {
                Ok(call) => tokens.push(self.mux.add(call)),
                Err(e) => {
                    self.mux.clear();
                    return Err(e);
                }
            }
        }

        tracing::debug!(requests = self.requests.len(), "batch started");
        drive_to_completion(&mut self.mux, &self.options)?;

        let mut success = true;
        for (request, token) in self.requests.iter_mut().zip(tokens) {
            let response = self.mux.take(token).unwrap_or_else(|| {
                TransportResponse::failure(error_code::OTHER, "batch produced no result")
            });
            if response.error_code != 0 {
                success = false;
            }
            request.finish(response);
        }
        tracing::debug!(success, "batch finished");
        Ok(success)
    }

    /// Execute with timing options overriding the ones set at construction.
    pub fn execute_with_options(&mut self, options: BatchOptions) -> Result<bool> {
        self.options = options;
        self.execute()
    }

    /// Fetch the completed response of a bare handle registered with
    /// [`BatchScheduler::register_call`].
    pub fn take_response(&mut self, token: Token) -> Option<TransportResponse> {
        self.mux.take(token)
    }

    /// Apply a function across all registered requests, collecting results.
    pub fn map<T>(&self, mut f: impl FnMut(&Request) -> T) -> Vec<T> {
        self.requests.iter().map(&mut f).collect()
    }

    /// Apply a function across all registered requests in place.
    pub fn each(&mut self, mut f: impl FnMut(&mut Request)) -> &mut Self {
        for request in &mut self.requests {
            f(request);
        }
        self
    }

    /// Borrow the registered requests.
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Take the registered requests out of the scheduler.
    pub fn into_requests(self) -> Vec<Request> {
        self.requests
    }
}
