//! URL model with incremental merge semantics.
//!
//! [`Uri`] parses a URL into scheme, authority, path, query data, and fragment,
//! and supports two ways of folding a second URL into an existing value:
//!
//! - [`Uri::decode`] **replaces** every component present in the source string
//!   and leaves absent components untouched (a merge-into-empty, not a reset).
//! - [`Uri::merge`] combines **additively**: the path is resolved relative to
//!   the current path via [`Uri::add_path`], and query data is added to the
//!   existing data instead of replacing it.
//!
//! Rendering via [`Uri::encode`] is stable: encoding twice without mutation
//! yields identical output, and re-decoding an encoded value reproduces every
//! component (the default port 80 is omitted on encode and restored on decode).
//!
//! # Examples
//!
//! ```
//! use quiver_http::Uri;
//!
//! let mut uri = Uri::parse("http://example.com/a/b?x=1");
//! uri.merge("c?y=2");
//! assert_eq!(uri.encode(true), "http://example.com/a/c?x=1&y=2");
//! ```

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use url::form_urlencoded;

/// Insertion-ordered query data.
///
/// Keys keep the order they were first added in; setting an existing key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryData {
    entries: Vec<(String, Value)>,
}

impl QueryData {
    /// Create empty query data.
    pub fn new() -> Self {
        QueryData::default()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no data is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Set a key, replacing the value in place when the key already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove a key. Unknown keys are ignored.
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// Merge another set of entries in, later values overwriting earlier ones.
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (k, v) in entries {
            self.set(k, v);
        }
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a `key=value&key2=value2` query string. Later duplicate keys win.
    ///
    /// Bracketed keys rebuild their containers: `tags[0]=a&tags[1]=b` becomes
    /// an array, `f[a]=1` an object, and `a[]=1&a[]=2` appends, so container
    /// structure survives an encode/parse round trip.
    pub fn parse(query: &str) -> Self {
        let query = query.replace("&amp;", "&");
        let mut data = QueryData::new();
        for (k, v) in form_urlencoded::parse(query.as_bytes()) {
            data.set_parsed(&k, Value::String(v.into_owned()));
        }
        data
    }

    /// Set a possibly bracketed key, rebuilding nested containers.
    fn set_parsed(&mut self, key: &str, value: Value) {
        let (base, segments) = split_brackets(key);
        if segments.is_empty() {
            self.set(base, value);
            return;
        }
        match self.entries.iter_mut().find(|(k, _)| k == base) {
            Some(entry) => insert_segments(&mut entry.1, &segments, value),
            None => {
                let mut slot = Value::Null;
                insert_segments(&mut slot, &segments, value);
                self.entries.push((base.to_string(), slot));
            }
        }
    }

    /// Render as a percent-encoded query string.
    ///
    /// Array and object values are flattened with bracket notation
    /// (`key[0]=..`, `key[sub]=..`) before encoding.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.entries {
            for (k, v) in flatten(key, value) {
                serializer.append_pair(&k, &v);
            }
        }
        serializer.finish()
    }
}

/// Flatten a possibly nested value into `(key, scalar)` pairs.
///
/// Scalars map to a single pair; arrays index with `key[0]`, `key[1]`, ..;
/// objects nest with `key[sub]`. Empty containers and nulls become an empty
/// string so the key still appears in the output.
pub fn flatten(key: &str, value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return vec![(key.to_string(), String::new())];
            }
            items
                .iter()
                .enumerate()
                .flat_map(|(i, item)| flatten(&format!("{}[{}]", key, i), item))
                .collect()
        }
        Value::Object(map) => {
            if map.is_empty() {
                return vec![(key.to_string(), String::new())];
            }
            map.iter()
                .flat_map(|(sub, item)| flatten(&format!("{}[{}]", key, sub), item))
                .collect()
        }
        other => vec![(key.to_string(), scalar_to_string(other))],
    }
}

/// Split `f[a][0]` into its base key and bracket segments.
///
/// Keys without a well-formed bracket suffix stay literal.
fn split_brackets(key: &str) -> (&str, Vec<&str>) {
    match key.find('[') {
        Some(pos) if key.ends_with(']') => {
            let inner = &key[pos + 1..key.len() - 1];
            (&key[..pos], inner.split("][").collect())
        }
        _ => (key, Vec::new()),
    }
}

/// Rebuild one bracket path inside a slot: numeric and empty segments index
/// or append to an array, string segments key into an object. Out-of-range
/// indices append rather than leave holes.
fn insert_segments(slot: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *slot = value;
        return;
    };
    if head.is_empty() || head.chars().all(|c| c.is_ascii_digit()) {
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            let index = head.parse().unwrap_or(items.len()).min(items.len());
            if index == items.len() {
                items.push(Value::Null);
            }
            insert_segments(&mut items[index], rest, value);
        }
    } else {
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(map) = slot {
            let entry = map.entry(head.to_string()).or_insert(Value::Null);
            insert_segments(entry, rest, value);
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        // Handled by flatten; kept for completeness.
        other => other.to_string(),
    }
}

/// Components split out of a URL string.
///
/// Mirrors a permissive `parse_url`-style split: every component is optional,
/// and a string without scheme or authority is treated entirely as a path.
#[derive(Debug, Default, Clone)]
struct UrlParts {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    path: Option<String>,
    query: Option<String>,
    fragment: Option<String>,
}

fn split_url(url: &str) -> UrlParts {
    let mut parts = UrlParts::default();
    let mut rest = url;

    if let Some(pos) = rest.find('#') {
        if pos + 1 < rest.len() {
            parts.fragment = Some(rest[pos + 1..].to_string());
        }
        rest = &rest[..pos];
    }
    if let Some(pos) = rest.find('?') {
        if pos + 1 < rest.len() {
            parts.query = Some(rest[pos + 1..].to_string());
        }
        rest = &rest[..pos];
    }

    let mut has_authority = false;
    if let Some(pos) = rest.find("://") {
        if pos > 0 {
            parts.scheme = Some(rest[..pos].to_ascii_lowercase());
            rest = &rest[pos + 3..];
            has_authority = true;
        }
    } else if let Some(stripped) = rest.strip_prefix("//") {
        rest = stripped;
        has_authority = true;
    }

    if has_authority {
        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, ""),
        };
        let mut host_port = authority;
        if let Some(pos) = authority.rfind('@') {
            let userinfo = &authority[..pos];
            host_port = &authority[pos + 1..];
            match userinfo.split_once(':') {
                Some((user, pass)) => {
                    parts.username = Some(user.to_string());
                    parts.password = Some(pass.to_string());
                }
                None => parts.username = Some(userinfo.to_string()),
            }
        }
        match host_port.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
                parts.host = Some(host.to_string());
                parts.port = port.parse().ok();
            }
            _ => {
                if !host_port.is_empty() {
                    parts.host = Some(host_port.to_string());
                }
            }
        }
        if !path.is_empty() {
            parts.path = Some(path.to_string());
        }
    } else if !rest.is_empty() {
        parts.path = Some(rest.to_string());
    }

    parts
}

/// Everything up to the last `/`, exclusive.
///
/// `"/a/b"` gives `"/a"`, `"/a"` gives `"/"`, and a path without a slash
/// gives `"."` so relative resolution starts from the current directory.
fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(pos) => &path[..pos],
        None => ".",
    }
}

/// A mutable URL value with merge semantics.
///
/// Constructed empty via [`Uri::new`] or from a source string via
/// [`Uri::parse`]; mutated in place by setters, [`Uri::add_path`],
/// [`Uri::add_data`], and [`Uri::merge`]; rendered on demand with
/// [`Uri::encode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Uri {
    scheme: String,
    host: String,
    port: u16,
    username: String,
    password: String,
    path: String,
    data: QueryData,
    fragment: String,
}

impl Default for Uri {
    fn default() -> Self {
        Uri {
            scheme: "http".to_string(),
            host: String::new(),
            port: 80,
            username: String::new(),
            password: String::new(),
            path: String::new(),
            data: QueryData::new(),
            fragment: String::new(),
        }
    }
}

impl Uri {
    /// Create an empty URI (`http`, port 80, no host).
    pub fn new() -> Self {
        Uri::default()
    }

    /// Create a URI from a source string.
    pub fn parse(url: &str) -> Self {
        let mut uri = Uri::new();
        if !url.is_empty() {
            uri.decode(url);
        }
        uri
    }

    /// Replace every component present in `url`, leaving absent ones untouched.
    ///
    /// This is a merge-into-empty, not a reset: callers that need a clean
    /// slate must construct a fresh [`Uri`].
    pub fn decode(&mut self, url: &str) -> &mut Self {
        self.apply(url, false)
    }

    /// Fold `url` in additively: path via [`Uri::add_path`], query via
    /// [`Uri::add_data`]. Other components replace as in [`Uri::decode`].
    pub fn merge(&mut self, url: &str) -> &mut Self {
        self.apply(url, true)
    }

    fn apply(&mut self, url: &str, additive: bool) -> &mut Self {
        let parts = split_url(url);
        if let Some(scheme) = parts.scheme {
            self.scheme = scheme;
        }
        if let Some(host) = parts.host {
            self.host = host;
        }
        if let Some(port) = parts.port {
            self.port = port;
        }
        if let Some(user) = parts.username {
            self.username = user;
        }
        if let Some(pass) = parts.password {
            self.password = pass;
        }
        if let Some(fragment) = parts.fragment {
            self.fragment = fragment;
        }
        if additive {
            if let Some(path) = parts.path {
                self.add_path(&path);
            }
            if let Some(query) = parts.query {
                self.merge_data(QueryData::parse(&query));
            }
        } else {
            if let Some(path) = parts.path {
                self.set_path(&path);
            }
            if let Some(query) = parts.query {
                self.data = QueryData::parse(&query);
            }
        }
        self
    }

    /// Resolve `path` against the current path.
    ///
    /// An absolute `path` (own scheme or host) degenerates to a full
    /// [`Uri::decode`]. A query string embedded in `path` is merged into the
    /// data. A root-relative path replaces the current one; anything else is
    /// resolved against `dirname(current)` with POSIX segment rules: `.` is
    /// dropped, `..` pops the previous segment unless the stack is empty or
    /// already ends in `..` (excess `..` accumulate verbatim rather than
    /// erroring). Leading and trailing empty segments survive the resolution.
    pub fn add_path(&mut self, path: &str) -> &mut Self {
        let parts = split_url(path);
        if parts.scheme.is_some() || parts.host.is_some() {
            return self.decode(path);
        }
        if let Some(query) = parts.query {
            self.merge_data(QueryData::parse(&query));
        }
        let relative = parts.path.unwrap_or_default();
        if relative.starts_with('/') {
            return self.set_path(&relative);
        }

        let combined = format!("{}/{}", dirname(&self.path), relative);
        let segments: Vec<&str> = combined.split('/').collect();
        let mut resolved: Vec<&str> = Vec::with_capacity(segments.len());
        if segments.first() == Some(&"") {
            resolved.push("");
        }
        for segment in &segments {
            match *segment {
                ".." => {
                    if resolved.is_empty() || resolved.last() == Some(&"..") {
                        resolved.push("..");
                    } else {
                        resolved.pop();
                    }
                }
                "" | "." => {}
                dir => resolved.push(dir),
            }
        }
        if segments.last() == Some(&"") && resolved.last() != Some(&"") {
            resolved.push("");
        }
        let joined = resolved.join("/");
        self.set_path(&joined)
    }

    /// Merge one key/value into the query data.
    pub fn add_data(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        if key.is_empty() {
            return self;
        }
        self.data.set(key, value);
        self
    }

    /// Merge a whole mapping into the query data. Empty input is a no-op.
    pub fn add_data_map(&mut self, map: &BTreeMap<String, Value>) -> &mut Self {
        for (k, v) in map {
            self.data.set(k.clone(), v.clone());
        }
        self
    }

    fn merge_data(&mut self, other: QueryData) {
        for (k, v) in other.entries {
            self.data.set(k, v);
        }
    }

    /// Replace the query data wholesale.
    pub fn set_data(&mut self, data: QueryData) -> &mut Self {
        self.data = data;
        self
    }

    /// Remove keys from the query data.
    pub fn remove_data<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for key in keys {
            self.data.remove(key);
        }
        self
    }

    /// Borrow the query data.
    pub fn data(&self) -> &QueryData {
        &self.data
    }

    /// True when any query data is present.
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// Set the scheme.
    pub fn set_scheme(&mut self, scheme: impl Into<String>) -> &mut Self {
        self.scheme = scheme.into();
        self
    }

    /// The scheme, `"http"` by default.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// True when the scheme is `https`.
    pub fn is_ssl(&self) -> bool {
        self.scheme == "https"
    }

    /// Set the host. A `host:port` value also sets the port.
    pub fn set_host(&mut self, host: &str) -> &mut Self {
        match host.split_once(':') {
            Some((name, port)) => {
                self.host = name.to_string();
                if let Ok(port) = port.parse() {
                    self.port = port;
                }
            }
            None => self.host = host.to_string(),
        }
        self
    }

    /// The host, empty when no authority is set.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Set the port.
    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    /// The port, 80 by default.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Set the userinfo name.
    pub fn set_username(&mut self, username: impl Into<String>) -> &mut Self {
        self.username = username.into();
        self
    }

    /// The userinfo name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Set the userinfo password.
    pub fn set_password(&mut self, password: impl Into<String>) -> &mut Self {
        self.password = password.into();
        self
    }

    /// The userinfo password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Set the path directly. Backslashes are normalized to `/`.
    pub fn set_path(&mut self, path: &str) -> &mut Self {
        self.path = path.replace('\\', "/");
        self
    }

    /// The path as stored (no leading-slash guarantee; see [`Uri::encode`]).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Set the fragment.
    pub fn set_fragment(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.fragment = fragment.into();
        self
    }

    /// Append to the fragment, `&`-joined when one is already present.
    pub fn add_fragment(&mut self, fragment: &str) -> &mut Self {
        if self.fragment.is_empty() {
            self.fragment = fragment.to_string();
        } else {
            self.fragment.push('&');
            self.fragment.push_str(fragment);
        }
        self
    }

    /// The fragment.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Render the `scheme://[user:pass@]host[:port]` prefix.
    ///
    /// The default port 80 is omitted; userinfo is rendered only when both
    /// username and password are non-empty.
    pub fn root(&self) -> String {
        let mut out = format!("{}://", self.scheme);
        if !self.username.is_empty() && !self.password.is_empty() {
            out.push_str(&self.username);
            out.push(':');
            out.push_str(&self.password);
            out.push('@');
        }
        out.push_str(&self.host);
        if self.port != 80 && self.port != 0 {
            out.push(':');
            out.push_str(&self.port.to_string());
        }
        out
    }

    /// Render the URI to a string.
    ///
    /// The authority prefix is included only when `with_authority` is true
    /// and a host is set. The path always renders with a leading `/`; query
    /// data and fragment are appended when non-empty. Encoding is stable:
    /// two calls without intervening mutation produce identical output.
    pub fn encode(&self, with_authority: bool) -> String {
        let mut out = String::new();
        if with_authority && !self.host.is_empty() {
            out.push_str(&self.root());
        }
        out.push('/');
        out.push_str(self.path.trim_start_matches('/'));
        if !self.data.is_empty() {
            out.push('?');
            out.push_str(&self.data.encode());
        }
        if !self.fragment.is_empty() {
            out.push('#');
            out.push_str(&self.fragment);
        }
        out
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_url() {
        let uri = Uri::parse("https://user:pw@example.com:8443/a/b?x=1&y=2#frag");
        assert_eq!(uri.scheme(), "https");
        assert!(uri.is_ssl());
        assert_eq!(uri.host(), "example.com");
        assert_eq!(uri.port(), 8443);
        assert_eq!(uri.username(), "user");
        assert_eq!(uri.password(), "pw");
        assert_eq!(uri.path(), "/a/b");
        assert_eq!(uri.data().get("x"), Some(&json!("1")));
        assert_eq!(uri.fragment(), "frag");
    }

    #[test]
    fn test_encode_round_trip() {
        let source = "https://user:pw@example.com:8443/a/b?x=1&y=2#frag";
        let uri = Uri::parse(source);
        assert_eq!(uri.encode(true), source);
        let again = Uri::parse(&uri.encode(true));
        assert_eq!(again, uri);
    }

    #[test]
    fn test_encode_is_stable() {
        let uri = Uri::parse("http://example.com/a?b=c");
        assert_eq!(uri.encode(true), uri.encode(true));
    }

    #[test]
    fn test_default_port_omitted() {
        let uri = Uri::parse("http://example.com:80/a");
        assert_eq!(uri.encode(true), "http://example.com/a");
        // Round-trip restores the default.
        assert_eq!(Uri::parse(&uri.encode(true)).port(), 80);
    }

    #[test]
    fn test_encode_without_authority() {
        let uri = Uri::parse("http://example.com/a/b?x=1");
        assert_eq!(uri.encode(false), "/a/b?x=1");
    }

    #[test]
    fn test_decode_merges_into_existing() {
        let mut uri = Uri::parse("http://example.com/a?x=1");
        uri.decode("/b?y=2");
        // Host and scheme are untouched; path and query are replaced.
        assert_eq!(uri.host(), "example.com");
        assert_eq!(uri.path(), "/b");
        assert!(uri.data().get("x").is_none());
        assert_eq!(uri.data().get("y"), Some(&json!("2")));
    }

    #[test]
    fn test_merge_is_additive() {
        let mut uri = Uri::parse("http://example.com/a/b?x=1");
        uri.merge("c?y=2");
        assert_eq!(uri.path(), "/a/c");
        assert_eq!(uri.data().get("x"), Some(&json!("1")));
        assert_eq!(uri.data().get("y"), Some(&json!("2")));
        assert_eq!(uri.encode(true), "http://example.com/a/c?x=1&y=2");
    }

    #[test]
    fn test_add_path_relative() {
        let mut uri = Uri::parse("http://example.com/a/b/c");
        uri.add_path("d/e");
        assert_eq!(uri.path(), "/a/b/d/e");
    }

    #[test]
    fn test_add_path_parent() {
        let mut uri = Uri::parse("http://example.com/a/b/c");
        uri.add_path("../x");
        assert_eq!(uri.path(), "/a/x");
    }

    #[test]
    fn test_add_path_current_dir_and_query() {
        let mut uri = Uri::parse("http://example.com/a/b?k0=v0");
        uri.add_path("./x?k=v");
        assert_eq!(uri.path(), "/a/x");
        assert_eq!(uri.data().get("k0"), Some(&json!("v0")));
        assert_eq!(uri.data().get("k"), Some(&json!("v")));
    }

    #[test]
    fn test_add_path_root_relative_replaces() {
        let mut uri = Uri::parse("http://example.com/a/b");
        uri.add_path("/x/y");
        assert_eq!(uri.path(), "/x/y");
    }

    #[test]
    fn test_add_path_absolute_decodes() {
        let mut uri = Uri::parse("http://example.com/a");
        uri.add_path("https://other.test/b");
        assert_eq!(uri.host(), "other.test");
        assert_eq!(uri.scheme(), "https");
        assert_eq!(uri.path(), "/b");
    }

    #[test]
    fn test_add_path_trailing_slash_preserved() {
        let mut uri = Uri::parse("http://example.com/a/b");
        uri.add_path("c/");
        assert_eq!(uri.path(), "/a/c/");
    }

    #[test]
    fn test_excess_parent_segments_accumulate() {
        let mut uri = Uri::new();
        uri.set_path("a");
        uri.add_path("../../b");
        assert_eq!(uri.path(), "../../b");
    }

    #[test]
    fn test_parent_from_root_never_goes_negative() {
        let mut uri = Uri::parse("http://example.com/");
        uri.add_path("..");
        assert_eq!(uri.path(), "");
        assert_eq!(uri.encode(false), "/");
        uri.add_path("..");
        assert_eq!(uri.path(), "..");
        uri.add_path("..");
        assert_eq!(uri.path(), "..");
        assert!(uri.encode(false).starts_with('/'));
    }

    #[test]
    fn test_add_and_remove_data() {
        let mut uri = Uri::new();
        uri.add_data("a", "1").add_data("b", "2");
        assert!(uri.has_data());
        uri.remove_data(["a"]);
        assert!(uri.data().get("a").is_none());
        assert_eq!(uri.data().get("b"), Some(&json!("2")));
        // Empty key is a no-op.
        uri.add_data("", "x");
        assert_eq!(uri.data().len(), 1);
    }

    #[test]
    fn test_query_insertion_order_preserved() {
        let mut uri = Uri::new();
        uri.add_data("z", "1").add_data("a", "2").add_data("z", "3");
        assert_eq!(uri.data().encode(), "z=3&a=2");
    }

    #[test]
    fn test_query_array_flattened_with_brackets() {
        let mut uri = Uri::new();
        uri.add_data("tags", json!(["a", "b"]));
        assert_eq!(uri.data().encode(), "tags%5B0%5D=a&tags%5B1%5D=b");
    }

    #[test]
    fn test_query_nested_object_flattened() {
        let pairs = flatten("f", &json!({"a": 1, "b": {"c": true}}));
        assert_eq!(
            pairs,
            vec![
                ("f[a]".to_string(), "1".to_string()),
                ("f[b][c]".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_rebuilds_bracketed_arrays() {
        let data = QueryData::parse("tags[0]=a&tags[1]=b");
        assert_eq!(data.get("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_parse_rebuilds_nested_objects() {
        let data = QueryData::parse("f[a]=1&f[b][c]=2");
        assert_eq!(data.get("f"), Some(&json!({"a": "1", "b": {"c": "2"}})));
    }

    #[test]
    fn test_parse_empty_brackets_append() {
        let data = QueryData::parse("a[]=1&a[]=2");
        assert_eq!(data.get("a"), Some(&json!(["1", "2"])));
    }

    #[test]
    fn test_query_containers_survive_round_trip() {
        let mut uri = Uri::parse("http://example.com/");
        uri.add_data("tags", json!(["a", "b"]));
        let again = Uri::parse(&uri.encode(true));
        assert_eq!(again.data().get("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_set_host_with_port() {
        let mut uri = Uri::new();
        uri.set_host("example.com:9090");
        assert_eq!(uri.host(), "example.com");
        assert_eq!(uri.port(), 9090);
    }

    #[test]
    fn test_add_fragment() {
        let mut uri = Uri::new();
        uri.add_fragment("a");
        uri.add_fragment("b");
        assert_eq!(uri.fragment(), "a&b");
    }

    #[test]
    fn test_percent_encoding_in_query() {
        let mut uri = Uri::new();
        uri.add_data("q", "a b&c");
        assert_eq!(uri.data().encode(), "q=a+b%26c");
    }
}
