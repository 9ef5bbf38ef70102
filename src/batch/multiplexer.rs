//! Reqwest-backed multiplexer.
//!
//! Holds every in-flight transfer of a batch in one `FuturesUnordered` set
//! and drives it on a current-thread tokio runtime, so concurrency is
//! I/O-interleaved on the calling thread rather than CPU-parallel. A drive
//! step polls the set under a zero timeout; a wait step polls it under the
//! caller's timeout. Completed responses are parked by token until the
//! scheduler collects them.

use crate::batch::driver::{Drive, Multiplexer};
use crate::error::{Error, Result};
use crate::transport::{send_call, ComposedCall, TransportResponse};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::time::Duration;

/// Token identifying one registered transfer.
pub type Token = usize;

/// Multiplexed handle set over reqwest transfers.
pub struct ReqwestMultiplexer {
    runtime: tokio::runtime::Runtime,
    in_flight: FuturesUnordered<BoxFuture<'static, (Token, TransportResponse)>>,
    finished: BTreeMap<Token, TransportResponse>,
    next_token: Token,
}

impl ReqwestMultiplexer {
    /// Create an empty multiplexer with its own single-threaded runtime.
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Batch(format!("failed to build runtime: {}", e)))?;
        Ok(ReqwestMultiplexer {
            runtime,
            in_flight: FuturesUnordered::new(),
            finished: BTreeMap::new(),
            next_token: 0,
        })
    }

    /// Register a composed call, acquiring a handle in the set.
    ///
    /// The transfer does not start until the set is driven.
    pub fn add(&mut self, call: ComposedCall) -> Token {
        let token = self.next_token;
        self.next_token += 1;
        self.in_flight
            .push(async move { (token, send_call(call).await) }.boxed());
        token
    }

    /// Take the completed response for a token, releasing its handle state.
    pub fn take(&mut self, token: Token) -> Option<TransportResponse> {
        self.finished.remove(&token)
    }

    /// Transfers still in flight.
    pub fn active(&self) -> usize {
        self.in_flight.len()
    }

    /// Drop all in-flight transfers and parked responses.
    ///
    /// Guarantees handle release on early-exit paths.
    pub fn clear(&mut self) {
        self.in_flight = FuturesUnordered::new();
        self.finished.clear();
    }

    /// Poll the set once under a timeout, parking any completion.
    fn step(&mut self, timeout: Duration) -> Drive {
        if self.in_flight.is_empty() {
            return Drive {
                again: false,
                active: 0,
            };
        }
        let ReqwestMultiplexer {
            runtime, in_flight, ..
        } = self;
        let polled =
            runtime.block_on(async { tokio::time::timeout(timeout, in_flight.next()).await });
        match polled {
            // A transfer completed; more may be immediately runnable.
            Ok(Some((token, response))) => {
                self.finished.insert(token, response);
                Drive {
                    again: true,
                    active: self.in_flight.len(),
                }
            }
            Ok(None) => Drive {
                again: false,
                active: 0,
            },
            // Timed out: nothing completed on this step.
            Err(_) => Drive {
                again: false,
                active: self.in_flight.len(),
            },
        }
    }
}

impl Multiplexer for ReqwestMultiplexer {
    fn drive(&mut self) -> Result<Drive> {
        Ok(self.step(Duration::ZERO))
    }

    fn wait(&mut self, timeout: Duration) -> Result<()> {
        self.step(timeout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_reports_drained() {
        let mut mux = ReqwestMultiplexer::new().unwrap();
        let progress = mux.drive().unwrap();
        assert!(!progress.again);
        assert_eq!(progress.active, 0);
    }

    #[test]
    fn test_tokens_are_distinct() {
        let mut mux = ReqwestMultiplexer::new().unwrap();
        let call = ComposedCall {
            method: crate::Method::Get,
            url: "http://127.0.0.1/".to_string(),
            headers: Vec::new(),
            cookie_header: None,
            body: None,
            options: crate::TransportOptions::default(),
        };
        let a = mux.add(call.clone());
        let b = mux.add(call);
        assert_ne!(a, b);
        assert_eq!(mux.active(), 2);
        mux.clear();
        assert_eq!(mux.active(), 0);
    }
}
