//! Transport boundary.
//!
//! The composition core hands a finished [`ComposedCall`] to a [`Transport`]
//! and gets back a [`TransportResponse`] record: status, content type,
//! headers, body, and an error indicator. A transport never panics and never
//! returns a Rust error; failures are reported through a non-zero
//! [`TransportResponse::error_code`] so batch execution can keep driving the
//! remaining requests.
//!
//! [`HttpTransport`] is the production implementation, a thin wrapper around
//! `reqwest` driven on a current-thread tokio runtime. The async entry point
//! [`send_call`] is shared with the batch multiplexer.

use crate::error::{Error, Result};
use crate::request::{CallBody, Method};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Transport error code classes. Zero means success.
pub mod error_code {
    /// No error.
    pub const OK: i32 = 0;
    /// Unclassified transport failure.
    pub const OTHER: i32 = 1;
    /// The client could not be built from the composed options.
    pub const BUILD: i32 = 2;
    /// Connection (or name resolution) failed.
    pub const CONNECT: i32 = 7;
    /// The request timed out.
    pub const TIMEOUT: i32 = 28;
    /// The response body could not be received.
    pub const RECV: i32 = 56;
}

/// Options carried from the composer to the transport.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Follow redirects automatically.
    pub follow_redirects: bool,
    /// Verify TLS certificates for https targets.
    pub verify_ssl: bool,
    /// Path to a persistent cookie jar. The core only carries the string;
    /// reading and writing it is the transport's business.
    pub cookie_jar: Option<PathBuf>,
    /// User-Agent header value.
    pub user_agent: Option<String>,
    /// Referer header value.
    pub referrer: Option<String>,
    /// Proxy URL applied to all traffic.
    pub proxy: Option<String>,
    /// Overall request timeout.
    pub timeout: Option<Duration>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        TransportOptions {
            follow_redirects: true,
            verify_ssl: false,
            cookie_jar: None,
            user_agent: None,
            referrer: None,
            proxy: None,
            timeout: None,
        }
    }
}

/// A transport-ready request: final URL, headers, and encoded body.
#[derive(Debug, Clone)]
pub struct ComposedCall {
    /// Request method.
    pub method: Method,
    /// Fully rendered URL.
    pub url: String,
    /// Header pairs in canonical casing, in registration order.
    pub headers: Vec<(String, String)>,
    /// Pre-formatted `Cookie` header value, when cookies were configured.
    pub cookie_header: Option<String>,
    /// Encoded body, absent for bodiless methods.
    pub body: Option<CallBody>,
    /// Transport options.
    pub options: TransportOptions,
}

/// Raw outcome of one executed call.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    /// HTTP status code, zero when the call never completed.
    pub status: u16,
    /// Response content type, empty when unknown.
    pub content_type: String,
    /// Response headers with lowercased names.
    pub headers: BTreeMap<String, String>,
    /// Response body bytes.
    pub body: Bytes,
    /// Error message, empty on success.
    pub error: String,
    /// Error code class, zero on success.
    pub error_code: i32,
}

impl TransportResponse {
    /// Build a failure record with no response data.
    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        TransportResponse {
            error: message.into(),
            error_code: code,
            ..TransportResponse::default()
        }
    }

    /// True when the transport reported no error.
    pub fn is_ok(&self) -> bool {
        self.error_code == error_code::OK
    }
}

/// Executes one composed call and reports the raw outcome.
pub trait Transport {
    /// Send the call and block until it completes or fails.
    fn send(&self, call: &ComposedCall) -> TransportResponse;
}

/// Production transport backed by `reqwest` on a current-thread runtime.
pub struct HttpTransport {
    runtime: tokio::runtime::Runtime,
}

impl HttpTransport {
    /// Create a transport with its own single-threaded runtime.
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Batch(format!("failed to build runtime: {}", e)))?;
        Ok(HttpTransport { runtime })
    }
}

impl Transport for HttpTransport {
    fn send(&self, call: &ComposedCall) -> TransportResponse {
        self.runtime.block_on(send_call(call.clone()))
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Search => {
            reqwest::Method::from_bytes(b"SEARCH").unwrap_or(reqwest::Method::GET)
        }
    }
}

fn classify(err: &reqwest::Error) -> i32 {
    if err.is_timeout() {
        error_code::TIMEOUT
    } else if err.is_connect() {
        error_code::CONNECT
    } else if err.is_builder() {
        error_code::BUILD
    } else if err.is_body() || err.is_decode() {
        error_code::RECV
    } else {
        error_code::OTHER
    }
}

/// Execute one composed call asynchronously.
///
/// Shared by [`HttpTransport`] and the batch multiplexer. Infallible by
/// contract: every failure is folded into the returned record.
pub async fn send_call(call: ComposedCall) -> TransportResponse {
    let mut builder = reqwest::Client::builder();
    builder = if call.options.follow_redirects {
        builder.redirect(reqwest::redirect::Policy::limited(10))
    } else {
        builder.redirect(reqwest::redirect::Policy::none())
    };
    if !call.options.verify_ssl {
        builder = builder.danger_accept_invalid_certs(true);
    }
    if call.options.cookie_jar.is_some() {
        builder = builder.cookie_store(true);
    }
    if let Some(agent) = &call.options.user_agent {
        builder = builder.user_agent(agent);
    }
    if let Some(proxy) = &call.options.proxy {
        match reqwest::Proxy::all(proxy) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => return TransportResponse::failure(error_code::BUILD, e.to_string()),
        }
    }
    if let Some(timeout) = call.options.timeout {
        builder = builder.timeout(timeout);
    }
    let client = match builder.build() {
        Ok(client) => client,
        Err(e) => return TransportResponse::failure(error_code::BUILD, e.to_string()),
    };

    let mut request = client.request(to_reqwest_method(call.method), &call.url);
    for (name, value) in &call.headers {
        request = request.header(name, value);
    }
    if let Some(cookie) = &call.cookie_header {
        request = request.header("Cookie", cookie);
    }
    if let Some(referrer) = &call.options.referrer {
        request = request.header("Referer", referrer);
    }
    match &call.body {
        Some(CallBody::Form(pairs)) => request = request.form(pairs),
        Some(CallBody::Raw(text)) => request = request.body(text.clone()),
        None => {}
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return TransportResponse::failure(classify(&e), e.to_string()),
    };

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let mut headers = BTreeMap::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
        }
    }

    match response.bytes().await {
        Ok(body) => TransportResponse {
            status,
            content_type,
            headers,
            body,
            error: String::new(),
            error_code: error_code::OK,
        },
        Err(e) => TransportResponse {
            status,
            content_type,
            headers,
            body: Bytes::new(),
            error: e.to_string(),
            error_code: error_code::RECV,
        },
    }
}
