//! Request composition.
//!
//! [`Request`] owns one outbound call: its method, target [`Uri`], raw
//! parameter bag, mapping specifications, and the ordered encode/decode
//! pipelines. Configuration is fluent; [`Request::compose`] freezes the
//! request into a transport-ready [`ComposedCall`] exactly once per
//! execution; the URI and body never silently re-resolve mid-flight.
//!
//! # Examples
//!
//! ```no_run
//! use quiver_http::{HttpTransport, MapSpec, Request, Transform};
//! use serde_json::json;
//!
//! let transport = HttpTransport::new()?;
//! let mut request = Request::parse("https://api.example.com/v1/token")
//!     .uri_map(MapSpec::new().field("#grant_type").field("appid:client_id"))
//!     .parameters(json!({"grant_type": "code", "client_id": "abc"}))
//!     .decode(Transform::Json);
//! let value = request.execute_with(&transport)?;
//! # Ok::<(), quiver_http::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::mapping::{args_from, Args, MapSpec};
use crate::transform::{apply_decode, apply_encode, Transform};
use crate::transport::{ComposedCall, Transport, TransportOptions, TransportResponse};
use crate::uri::{flatten, Uri};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET, the default.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// PATCH.
    Patch,
    /// DELETE.
    Delete,
    /// HEAD.
    Head,
    /// OPTIONS.
    Options,
    /// SEARCH.
    Search,
}

impl Method {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Search => "SEARCH",
        }
    }

    /// True when the composed call carries a body.
    pub fn has_body(&self) -> bool {
        matches!(
            self,
            Method::Post | Method::Put | Method::Patch | Method::Search
        )
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded request body.
#[derive(Debug, Clone)]
pub enum CallBody {
    /// Form-urlencoded pairs.
    Form(Vec<(String, String)>),
    /// Raw pre-encoded text (typically a JSON or XML stage output).
    Raw(String),
}

/// One outbound request under construction.
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: Option<Method>,
    uri: Uri,
    parameters: Args,
    raw_body: Option<Value>,
    uri_map: Option<MapSpec>,
    uri_encode: Option<Transform>,
    form_map: Option<MapSpec>,
    encode_stages: Vec<Transform>,
    decode_stages: Vec<Transform>,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    options: TransportOptions,
    response: Option<TransportResponse>,
}

impl Request {
    /// Create an empty GET request.
    pub fn new() -> Self {
        Request::default()
    }

    /// Create a request targeting a URL string.
    pub fn parse(url: &str) -> Self {
        Request::new().url(url)
    }

    /// Set the target URL from a string.
    pub fn url(mut self, url: &str) -> Self {
        self.uri = Uri::parse(url);
        self
    }

    /// Set the target URI directly.
    pub fn uri(mut self, uri: Uri) -> Self {
        self.uri = uri;
        self
    }

    /// Borrow the target URI.
    pub fn uri_ref(&self) -> &Uri {
        &self.uri
    }

    /// Mapping spec resolved into the query string at composition time.
    pub fn uri_map(mut self, spec: MapSpec) -> Self {
        self.uri_map = Some(spec);
        self
    }

    /// Optional transform applied to the resolved URI parameters before they
    /// are folded into the query data.
    pub fn uri_encode(mut self, transform: Transform) -> Self {
        self.uri_encode = Some(transform);
        self
    }

    /// Mapping spec resolved into the request body.
    ///
    /// Configuring a form map switches a GET request to POST, matching the
    /// common "maps imply a form submission" usage.
    pub fn maps(mut self, spec: MapSpec) -> Self {
        if self.method.is_none() || self.method == Some(Method::Get) {
            self.method = Some(Method::Post);
        }
        self.form_map = Some(spec);
        self
    }

    /// Append rules to the form mapping spec.
    pub fn append_maps(mut self, spec: MapSpec) -> Self {
        self.form_map = Some(match self.form_map.take() {
            Some(existing) => existing.extend(spec),
            None => spec,
        });
        self
    }

    /// Merge parameters into the argument bag.
    ///
    /// An object merges key by key; null is ignored; any other value becomes
    /// the raw request body, bypassing the form map and encode stages.
    pub fn parameters(mut self, value: Value) -> Self {
        match value {
            Value::Null => {}
            Value::Object(_) => self.parameters.extend(args_from(value)),
            other => self.raw_body = Some(other),
        }
        self
    }

    /// Set a single parameter.
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Borrow the raw argument bag.
    pub fn parameters_ref(&self) -> &Args {
        &self.parameters
    }

    /// Append an encode stage.
    pub fn encode(mut self, transform: Transform) -> Self {
        self.encode_stages.push(transform);
        self
    }

    /// Drop all encode stages.
    pub fn clear_encode(mut self) -> Self {
        self.encode_stages.clear();
        self
    }

    /// Append a decode stage.
    pub fn decode(mut self, transform: Transform) -> Self {
        self.decode_stages.push(transform);
        self
    }

    /// Drop all decode stages.
    pub fn clear_decode(mut self) -> Self {
        self.decode_stages.clear();
        self
    }

    /// Set the request method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Shorthand for [`Request::method`] with [`Method::Get`].
    pub fn get(self) -> Self {
        self.method(Method::Get)
    }

    /// Shorthand for [`Request::method`] with [`Method::Post`].
    pub fn post(self) -> Self {
        self.method(Method::Post)
    }

    /// Shorthand for [`Request::method`] with [`Method::Put`].
    pub fn put(self) -> Self {
        self.method(Method::Put)
    }

    /// Shorthand for [`Request::method`] with [`Method::Patch`].
    pub fn patch(self) -> Self {
        self.method(Method::Patch)
    }

    /// Shorthand for [`Request::method`] with [`Method::Delete`].
    pub fn delete(self) -> Self {
        self.method(Method::Delete)
    }

    /// Shorthand for [`Request::method`] with [`Method::Head`].
    pub fn head(self) -> Self {
        self.method(Method::Head)
    }

    /// Shorthand for [`Request::method`] with [`Method::Options`].
    pub fn options(self) -> Self {
        self.method(Method::Options)
    }

    /// Shorthand for [`Request::method`] with [`Method::Search`].
    pub fn search(self) -> Self {
        self.method(Method::Search)
    }

    /// Add a request header. Empty values are skipped; names are canonicalized
    /// to `Ucfirst-Joined` casing at composition time.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            return self;
        }
        self.headers.push((name.into(), value));
        self
    }

    /// Add a cookie pair sent with the request.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Use a persistent cookie jar at the given path.
    pub fn cookie_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cookie_jar = Some(path.into());
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.options.user_agent = Some(agent.into());
        self
    }

    /// Set the Referer header.
    pub fn referrer(mut self, referrer: impl Into<String>) -> Self {
        self.options.referrer = Some(referrer.into());
        self
    }

    /// Allow or forbid automatic redirects (allowed by default).
    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.options.follow_redirects = allow;
        self
    }

    /// Verify TLS certificates (off by default, matching lenient API-client
    /// usage).
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.options.verify_ssl = verify;
        self
    }

    /// Route through a proxy.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.options.proxy = Some(proxy.into());
        self
    }

    /// Bound the whole call by a timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// The effective method (GET unless configured otherwise).
    pub fn effective_method(&self) -> Method {
        self.method.unwrap_or(Method::Get)
    }

    /// Freeze the request into a transport-ready call.
    ///
    /// Resolves the URI mapping into query data, renders the final URL, and
    /// encodes the body through the configured stages. Configuration errors
    /// (missing required parameters, unsatisfied choice groups) surface here.
    pub fn compose(&self) -> Result<ComposedCall> {
        let method = self.effective_method();
        let mut uri = self.uri.clone();

        if let Some(spec) = &self.uri_map {
            let resolved = spec.resolve(&self.parameters)?;
            let mut value = Value::Object(resolved.into_iter().collect());
            if let Some(transform) = &self.uri_encode {
                value = transform.encode(value)?;
            }
            fold_into_query(&mut uri, value);
        }
        let url = uri.encode(true);

        let body = if method.has_body() {
            self.compose_body()?
        } else {
            None
        };

        let headers = self
            .headers
            .iter()
            .map(|(name, value)| (canonical_header_name(name), value.clone()))
            .collect();
        let cookie_header = if self.cookies.is_empty() {
            None
        } else {
            Some(
                self.cookies
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };

        tracing::debug!(%url, method = %method, "composed request");

        Ok(ComposedCall {
            method,
            url,
            headers,
            cookie_header,
            body,
            options: self.options.clone(),
        })
    }

    fn compose_body(&self) -> Result<Option<CallBody>> {
        // A raw (non-object) parameter value is used verbatim and bypasses
        // both the form map and the encode stages.
        if let Some(raw) = &self.raw_body {
            let text = match raw {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(Some(CallBody::Raw(text)));
        }

        let resolved = match &self.form_map {
            Some(spec) => spec.resolve(&self.parameters)?,
            None => self.parameters.clone(),
        };
        if resolved.is_empty() && self.encode_stages.is_empty() {
            return Ok(None);
        }

        let value = apply_encode(
            &self.encode_stages,
            Value::Object(resolved.into_iter().collect()),
        )?;
        match value {
            Value::String(text) => Ok(Some(CallBody::Raw(text))),
            other => {
                let mut pairs = Vec::new();
                if let Value::Object(map) = other {
                    for (key, item) in &map {
                        pairs.extend(flatten(key, item));
                    }
                }
                Ok(Some(CallBody::Form(pairs)))
            }
        }
    }

    /// Execute synchronously against a transport.
    ///
    /// Blocks until the call completes. A non-zero transport error code is
    /// raised as [`Error::Transport`]; on success the body is decoded through
    /// the decode pipeline (or the implicit content-type sniffing stage).
    pub fn execute_with(&mut self, transport: &dyn Transport) -> Result<Value> {
        let call = self.compose()?;
        let response = transport.send(&call);
        self.finish(response);
        if let Some(response) = &self.response {
            if !response.is_ok() {
                return Err(Error::Transport {
                    code: response.error_code,
                    message: response.error.clone(),
                });
            }
        }
        self.decode_response()
    }

    /// Execute and force JSON decoding of the response.
    pub fn json_with(&mut self, transport: &dyn Transport) -> Result<Value> {
        self.decode_stages = vec![Transform::Json];
        self.execute_with(transport)
    }

    /// Execute and force XML decoding of the response.
    pub fn xml_with(&mut self, transport: &dyn Transport) -> Result<Value> {
        self.decode_stages = vec![Transform::Xml];
        self.execute_with(transport)
    }

    /// Record a completed transport response without raising.
    ///
    /// Used by batch execution, where individual failures must not abort the
    /// job; callers inspect [`Request::error_code`] afterwards.
    pub fn finish(&mut self, response: TransportResponse) {
        tracing::debug!(
            status = response.status,
            error_code = response.error_code,
            "request finished"
        );
        self.response = Some(response);
    }

    /// Decode the recorded response body through the decode pipeline.
    pub fn decode_response(&self) -> Result<Value> {
        let response = self
            .response
            .as_ref()
            .ok_or_else(|| Error::Decode("request has not been executed".to_string()))?;
        let text = String::from_utf8_lossy(&response.body).into_owned();
        apply_decode(&self.decode_stages, text, &response.content_type)
    }

    /// The recorded response, when the request has been executed.
    pub fn response(&self) -> Option<&TransportResponse> {
        self.response.as_ref()
    }

    /// HTTP status of the recorded response, zero before execution.
    pub fn status_code(&self) -> u16 {
        self.response.as_ref().map(|r| r.status).unwrap_or(0)
    }

    /// Content type of the recorded response.
    pub fn content_type(&self) -> &str {
        self.response
            .as_ref()
            .map(|r| r.content_type.as_str())
            .unwrap_or("")
    }

    /// A recorded response header by lowercased name.
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|r| r.headers.get(name))
            .map(|v| v.as_str())
    }

    /// The transport error message, when one was recorded.
    pub fn error(&self) -> Option<&str> {
        self.response
            .as_ref()
            .filter(|r| !r.error.is_empty())
            .map(|r| r.error.as_str())
    }

    /// The transport error code, zero on success or before execution.
    pub fn error_code(&self) -> i32 {
        self.response.as_ref().map(|r| r.error_code).unwrap_or(0)
    }

    /// The raw response body as text.
    pub fn response_text(&self) -> Option<String> {
        self.response
            .as_ref()
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
    }
}

/// Fold a resolved (and possibly transformed) parameter value into the query.
///
/// Objects merge pair by pair; a string output of an encode stage is parsed
/// as a query string and merged.
fn fold_into_query(uri: &mut Uri, value: Value) {
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                uri.add_data(key, item);
            }
        }
        Value::String(query) => {
            uri.merge(&format!("?{}", query));
        }
        _ => {}
    }
}

/// Canonicalize a header name to `Ucfirst-Joined` casing.
fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let lower = part.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::error_code;
    use serde_json::json;

    struct FakeTransport {
        response: TransportResponse,
    }

    impl Transport for FakeTransport {
        fn send(&self, _call: &ComposedCall) -> TransportResponse {
            self.response.clone()
        }
    }

    fn json_response(body: &str) -> TransportResponse {
        TransportResponse {
            status: 200,
            content_type: "application/json".to_string(),
            body: bytes::Bytes::copy_from_slice(body.as_bytes()),
            ..TransportResponse::default()
        }
    }

    #[test]
    fn test_compose_resolves_uri_map() {
        let request = Request::parse("http://api.example.com/v1/items")
            .uri_map(MapSpec::new().field("#q").field("lang:locale"))
            .parameters(json!({"q": "rust", "locale": "en"}));
        let call = request.compose().unwrap();
        assert_eq!(call.method, Method::Get);
        // Resolved parameters fold in sorted key order.
        assert_eq!(call.url, "http://api.example.com/v1/items?lang=en&q=rust");
        assert!(call.body.is_none());
    }

    #[test]
    fn test_compose_missing_required_parameter() {
        let request = Request::parse("http://api.example.com/")
            .uri_map(MapSpec::new().field("#q"));
        let err = request.compose().unwrap_err();
        assert!(matches!(err, Error::MissingParameter(key) if key == "q"));
    }

    #[test]
    fn test_maps_switches_get_to_post() {
        let request = Request::parse("http://api.example.com/")
            .maps(MapSpec::new().field("#name"))
            .parameters(json!({"name": "quiver"}));
        assert_eq!(request.effective_method(), Method::Post);
        let call = request.compose().unwrap();
        match call.body {
            Some(CallBody::Form(pairs)) => {
                assert_eq!(pairs, vec![("name".to_string(), "quiver".to_string())]);
            }
            other => panic!("expected form body, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_method_survives_maps() {
        let request = Request::new().put().maps(MapSpec::new().field("a"));
        assert_eq!(request.effective_method(), Method::Put);
    }

    #[test]
    fn test_json_encode_stage_makes_raw_body() {
        let request = Request::parse("http://api.example.com/")
            .post()
            .maps(MapSpec::new().field("#name"))
            .parameters(json!({"name": "quiver"}))
            .encode(Transform::Json);
        let call = request.compose().unwrap();
        match call.body {
            Some(CallBody::Raw(text)) => assert_eq!(text, r#"{"name":"quiver"}"#),
            other => panic!("expected raw body, got {:?}", other),
        }
    }

    #[test]
    fn test_raw_parameter_bypasses_stages() {
        let request = Request::parse("http://api.example.com/")
            .post()
            .encode(Transform::Json)
            .parameters(json!("already-encoded"));
        let call = request.compose().unwrap();
        match call.body {
            Some(CallBody::Raw(text)) => assert_eq!(text, "already-encoded"),
            other => panic!("expected raw body, got {:?}", other),
        }
    }

    #[test]
    fn test_null_parameters_are_a_no_op() {
        let request = Request::parse("http://api.example.com/")
            .post()
            .parameters(json!(null));
        let call = request.compose().unwrap();
        assert!(call.body.is_none());
    }

    #[test]
    fn test_get_request_has_no_body() {
        let request = Request::parse("http://api.example.com/")
            .parameter("a", "1");
        let call = request.compose().unwrap();
        assert!(call.body.is_none());
    }

    #[test]
    fn test_header_canonicalization() {
        let request = Request::parse("http://api.example.com/")
            .header("content-type", "text/plain")
            .header("x-api-key", "k")
            .header("Empty", "");
        let call = request.compose().unwrap();
        assert_eq!(
            call.headers,
            vec![
                ("Content-Type".to_string(), "text/plain".to_string()),
                ("X-Api-Key".to_string(), "k".to_string()),
            ]
        );
    }

    #[test]
    fn test_cookie_header_built_from_pairs() {
        let request = Request::parse("http://api.example.com/")
            .cookie("sid", "1")
            .cookie("lang", "en");
        let call = request.compose().unwrap();
        assert_eq!(call.cookie_header.as_deref(), Some("sid=1; lang=en"));
    }

    #[test]
    fn test_compose_is_repeatable() {
        let request = Request::parse("http://api.example.com/x")
            .uri_map(MapSpec::new().field("a"))
            .parameter("a", "1");
        let first = request.compose().unwrap();
        let second = request.compose().unwrap();
        assert_eq!(first.url, second.url);
    }

    #[test]
    fn test_execute_success_decodes_json() {
        let transport = FakeTransport {
            response: json_response(r#"{"ok": true}"#),
        };
        let mut request = Request::parse("http://api.example.com/");
        let value = request.execute_with(&transport).unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert_eq!(request.status_code(), 200);
        assert!(request.error().is_none());
    }

    #[test]
    fn test_execute_transport_failure_raises() {
        let transport = FakeTransport {
            response: TransportResponse::failure(error_code::CONNECT, "refused"),
        };
        let mut request = Request::parse("http://api.example.com/");
        let err = request.execute_with(&transport).unwrap_err();
        assert!(matches!(err, Error::Transport { code, .. } if code == error_code::CONNECT));
        // The failure is also recorded on the request.
        assert_eq!(request.error_code(), error_code::CONNECT);
        assert_eq!(request.error(), Some("refused"));
    }

    #[test]
    fn test_decode_stage_overrides_sniffing() {
        let mut response = json_response(r#"{"n": 1}"#);
        response.content_type = "text/plain".to_string();
        let transport = FakeTransport { response };
        let mut request = Request::parse("http://api.example.com/").decode(Transform::Json);
        let value = request.execute_with(&transport).unwrap();
        assert_eq!(value, json!({"n": 1}));
    }

    #[test]
    fn test_uri_encode_string_folds_as_query() {
        let request = Request::parse("http://api.example.com/")
            .uri_map(MapSpec::new().field("a").field("b"))
            .uri_encode(Transform::custom(|v| {
                // Render resolved parameters as a pre-built query string.
                let a = v["a"].as_str().unwrap_or("").to_string();
                Ok(Value::String(format!("combined={}", a)))
            }))
            .parameters(json!({"a": "1", "b": "2"}));
        let call = request.compose().unwrap();
        assert_eq!(call.url, "http://api.example.com/?combined=1");
    }

    #[test]
    fn test_canonical_header_name() {
        assert_eq!(canonical_header_name("content-TYPE"), "Content-Type");
        assert_eq!(canonical_header_name("x-api-key"), "X-Api-Key");
        assert_eq!(canonical_header_name("Accept"), "Accept");
    }
}
