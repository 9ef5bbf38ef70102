//! Declarative parameter mapping.
//!
//! A [`MapSpec`] describes how a flat argument bag is turned into the final
//! parameter set of a request. The specification is an explicit tagged tree of
//! [`MapRule`] values built at configuration time and evaluated by a pure
//! recursive-descent resolver: resolving the same spec against the same bag is
//! deterministic and mutates neither.
//!
//! # Key syntax
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `key` | optional field |
//! | `#key` | required: unresolved is a hard error |
//! | `new:old` | rename: look up `old` in the bag, emit `new` |
//! | `#new:old` | required rename |
//!
//! # Examples
//!
//! ```
//! use quiver_http::{Args, MapSpec};
//! use serde_json::json;
//!
//! let spec = MapSpec::new()
//!     .field("#grant_type")
//!     .field("appid:client_id")
//!     .field_or("scope", "basic");
//!
//! let mut args = Args::new();
//! args.insert("grant_type".to_string(), json!("code"));
//! args.insert("client_id".to_string(), json!("abc"));
//!
//! let resolved = spec.resolve(&args).unwrap();
//! assert_eq!(resolved["grant_type"], json!("code"));
//! assert_eq!(resolved["appid"], json!("abc"));
//! assert_eq!(resolved["scope"], json!("basic"));
//! ```

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Flat argument bag mapped onto request fields.
pub type Args = BTreeMap<String, Value>;

/// Convert a JSON object into an [`Args`] bag. Non-object values give an
/// empty bag.
pub fn args_from(value: Value) -> Args {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => Args::new(),
    }
}

/// One node of a mapping specification.
#[derive(Debug, Clone)]
pub enum MapRule {
    /// A single field, optionally carrying a literal default value.
    Field {
        /// Rule key, using the `#`/`new:old` syntax.
        key: String,
        /// Literal fallback used when the bag has no non-empty value.
        default: Option<Value>,
    },
    /// A choice group: at least one child must resolve to a non-empty value.
    /// Child failures are swallowed; an entirely empty group is an error.
    /// On key collisions within the group, first-come values win.
    Choice(Vec<MapRule>),
    /// A nested spec resolved against the same bag, its result becoming the
    /// value for the outer key. Failures inside the nested resolution are
    /// treated as "no value"; only the outer `#` flag can still fail.
    Nested {
        /// Outer rule key, using the `#`/`new:old` syntax.
        key: String,
        /// Child specification.
        spec: MapSpec,
    },
}

/// An ordered list of mapping rules.
///
/// Rules are evaluated in order and merged left-to-right; later keys
/// overwrite earlier ones on collision.
#[derive(Debug, Clone, Default)]
pub struct MapSpec {
    rules: Vec<MapRule>,
}

impl MapSpec {
    /// Create an empty specification.
    pub fn new() -> Self {
        MapSpec::default()
    }

    /// Append a field rule.
    pub fn field(mut self, key: impl Into<String>) -> Self {
        self.rules.push(MapRule::Field {
            key: key.into(),
            default: None,
        });
        self
    }

    /// Append a field rule with a literal default value.
    pub fn field_or(mut self, key: impl Into<String>, default: impl Into<Value>) -> Self {
        self.rules.push(MapRule::Field {
            key: key.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Append a choice group built from the rules of `alternatives`.
    pub fn choice(mut self, alternatives: MapSpec) -> Self {
        self.rules.push(MapRule::Choice(alternatives.rules));
        self
    }

    /// Append a nested rule: `spec` resolves against the same bag and its
    /// result becomes the value for `key`.
    pub fn nested(mut self, key: impl Into<String>, spec: MapSpec) -> Self {
        self.rules.push(MapRule::Nested {
            key: key.into(),
            spec,
        });
        self
    }

    /// Append all rules of another spec.
    pub fn extend(mut self, other: MapSpec) -> Self {
        self.rules.extend(other.rules);
        self
    }

    /// Number of top-level rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when the spec holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Resolve the spec against an argument bag.
    ///
    /// Pure function: neither the spec nor the bag is mutated, and repeated
    /// calls yield identical output.
    ///
    /// # Errors
    ///
    /// [`Error::MissingParameter`] when a `#`-flagged rule stays unresolved,
    /// [`Error::ChoiceGroup`] when no alternative of a group resolves.
    pub fn resolve(&self, args: &Args) -> Result<Args> {
        let mut out = Args::new();
        for rule in &self.rules {
            // Later keys overwrite earlier ones.
            out.extend(resolve_rule(rule, args)?);
        }
        Ok(out)
    }
}

fn resolve_rule(rule: &MapRule, args: &Args) -> Result<Args> {
    match rule {
        MapRule::Choice(children) => {
            let mut out = Args::new();
            for child in children {
                // A failing alternative is simply not satisfied.
                if let Ok(part) = resolve_rule(child, args) {
                    for (k, v) in part {
                        out.entry(k).or_insert(v);
                    }
                }
            }
            if out.is_empty() {
                return Err(Error::ChoiceGroup);
            }
            Ok(out)
        }
        MapRule::Field { key, default } => {
            resolve_keyed(key, args, || Ok(default.clone()))
        }
        MapRule::Nested { key, spec } => resolve_keyed(key, args, || {
            // Inner failures are swallowed; only the outer flag can fail.
            match spec.resolve(args) {
                Ok(resolved) if !resolved.is_empty() => {
                    Ok(Some(Value::Object(resolved.into_iter().collect())))
                }
                _ => Ok(None),
            }
        }),
    }
}

fn resolve_keyed(
    raw_key: &str,
    args: &Args,
    fallback: impl FnOnce() -> Result<Option<Value>>,
) -> Result<Args> {
    let (required, new_key, old_key) = parse_key(raw_key);

    // Direct hit on the target key short-circuits rename and defaults.
    if let Some(value) = args.get(new_key) {
        return Ok(single(new_key, value.clone()));
    }
    if old_key != new_key {
        if let Some(value) = args.get(old_key) {
            if !is_empty(value) {
                return Ok(single(new_key, value.clone()));
            }
        }
    }
    if let Some(value) = fallback()? {
        if !is_empty(&value) {
            return Ok(single(new_key, value));
        }
    }
    if required {
        return Err(Error::MissingParameter(new_key.to_string()));
    }
    Ok(Args::new())
}

fn single(key: &str, value: Value) -> Args {
    let mut out = Args::new();
    out.insert(key.to_string(), value);
    out
}

/// Split a rule key into its required flag, target key, and lookup key.
///
/// A leading `#` marks the rule required; a colon past the first character
/// splits `new:old`. Without a rename both keys are the same.
fn parse_key(raw: &str) -> (bool, &str, &str) {
    let (required, rest) = match raw.strip_prefix('#') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    match rest.find(':') {
        Some(pos) if pos > 0 => (required, &rest[..pos], &rest[pos + 1..]),
        _ => (required, rest, rest),
    }
}

/// Emptiness as the generic "present and non-blank" validator sees it.
///
/// Null, `false`, the empty string, empty containers, and numeric zero are
/// empty; the string `"0"` is not.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(n) => {
            n.as_f64().map(|f| f == 0.0).unwrap_or(false)
        }
    }
}
