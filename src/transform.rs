//! Encode and decode transform stages.
//!
//! A [`Transform`] is a tagged capability over the named built-ins (`Json`,
//! `Xml`) and arbitrary user functions of shape `Value -> Result<Value>`.
//! Stages run in registration order both for encoding request bodies and for
//! decoding response bodies. When a response is decoded with no registered
//! stage, an implicit sniffing stage runs instead, matching the response
//! content type against the JSON and XML patterns.

use crate::error::{Error, Result};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Signature of a user-supplied transform stage.
pub type TransformFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// One stage of an encode or decode pipeline.
#[derive(Clone)]
pub enum Transform {
    /// JSON text via `serde_json`.
    Json,
    /// Flat `<xml>` element mapping via `quick-xml`.
    Xml,
    /// A user function applied to the current value.
    Custom(TransformFn),
}

impl Transform {
    /// Wrap a user function as a stage.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Transform::Custom(Arc::new(f))
    }

    /// Run the stage in the encode direction: value in, value out, where the
    /// named built-ins produce a string.
    pub fn encode(&self, value: Value) -> Result<Value> {
        match self {
            Transform::Json => {
                let text =
                    serde_json::to_string(&value).map_err(|e| Error::Encode(e.to_string()))?;
                Ok(Value::String(text))
            }
            Transform::Xml => Ok(Value::String(xml_encode(&value)?)),
            Transform::Custom(f) => f(value),
        }
    }

    /// Run the stage in the decode direction: the named built-ins parse the
    /// string form of the current value.
    pub fn decode(&self, value: Value) -> Result<Value> {
        match self {
            Transform::Json => {
                let text = value_text(&value);
                Ok(serde_json::from_str(&text)?)
            }
            Transform::Xml => xml_decode(&value_text(&value)),
            Transform::Custom(f) => f(value),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Json => f.write_str("Json"),
            Transform::Xml => f.write_str("Xml"),
            Transform::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Apply encode stages in registration order.
pub fn apply_encode(stages: &[Transform], mut value: Value) -> Result<Value> {
    for stage in stages {
        value = stage.encode(value)?;
    }
    Ok(value)
}

/// Apply decode stages in registration order.
///
/// With no registered stage the implicit sniffing fallback runs: a JSON
/// content type parses as JSON, an XML one as XML, anything else stays the
/// raw text.
pub fn apply_decode(stages: &[Transform], text: String, content_type: &str) -> Result<Value> {
    if stages.is_empty() {
        return sniff_decode(text, content_type);
    }
    let mut value = Value::String(text);
    for stage in stages {
        value = stage.decode(value)?;
    }
    Ok(value)
}

fn sniff_decode(text: String, content_type: &str) -> Result<Value> {
    if is_json_content_type(content_type) {
        return Transform::Json.decode(Value::String(text));
    }
    if is_xml_content_type(content_type) {
        return Transform::Xml.decode(Value::String(text));
    }
    Ok(Value::String(text))
}

/// True for JSON-flavored content types, including structured-syntax
/// suffixes such as `application/vnd.api+json`.
pub fn is_json_content_type(content_type: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:application|text)/(?:[a-z]+(?:[.\-][0-9a-z]+)*[+.]|x-)?json(?:-[a-z]+)?")
            .expect("json content-type pattern")
    });
    re.is_match(content_type)
}

/// True for XML-flavored content types, including atom and rss feeds.
pub fn is_xml_content_type(content_type: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:text/|application/(?:atom\+|rss\+)?)xml").expect("xml content-type pattern")
    });
    re.is_match(content_type)
}

/// Render a value as a flat XML document under an `<xml>` root.
///
/// Objects nest as elements, arrays repeat their element name, scalars
/// become text content.
pub fn xml_encode(value: &Value) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, "xml", value)?;
    String::from_utf8(writer.into_inner()).map_err(|e| Error::Encode(e.to_string()))
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<()> {
    let io_err = |e: std::io::Error| Error::Encode(e.to_string());
    match value {
        Value::Object(map) => {
            writer
                .write_event(Event::Start(BytesStart::new(name)))
                .map_err(io_err)?;
            for (key, item) in map {
                write_element(writer, key, item)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(io_err)?;
        }
        Value::Array(items) => {
            for item in items {
                write_element(writer, name, item)?;
            }
        }
        other => {
            writer
                .write_event(Event::Start(BytesStart::new(name)))
                .map_err(io_err)?;
            let text = match other {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                v => v.to_string(),
            };
            writer
                .write_event(Event::Text(BytesText::new(&text)))
                .map_err(io_err)?;
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(io_err)?;
        }
    }
    Ok(())
}

/// Parse an XML document into a value.
///
/// Elements with children become objects (a repeated child name keeps the
/// last occurrence); text-only elements become strings. The returned value
/// is the root element's content.
pub fn xml_decode(text: &str) -> Result<Value> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    // Element stack: name, child map, accumulated text.
    let mut stack: Vec<(String, Map<String, Value>, String)> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                stack.push((name, Map::new(), String::new()));
            }
            Ok(Event::Empty(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                match stack.last_mut() {
                    Some(parent) => {
                        parent.1.insert(name, Value::String(String::new()));
                    }
                    None => root = Some(Value::String(String::new())),
                }
            }
            Ok(Event::Text(t)) => {
                let raw = String::from_utf8_lossy(&t);
                let text = unescape(&raw).map_err(|e| Error::Decode(e.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.2.push_str(&text);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(top) = stack.last_mut() {
                    top.2.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::End(_)) => {
                let Some((name, children, text)) = stack.pop() else {
                    return Err(Error::Decode("unbalanced xml end tag".to_string()));
                };
                let value = if children.is_empty() {
                    Value::String(text)
                } else {
                    Value::Object(children)
                };
                match stack.last_mut() {
                    Some(parent) => {
                        parent.1.insert(name, value);
                    }
                    None => root = Some(value),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Decode(e.to_string())),
        }
    }

    root.ok_or_else(|| Error::Decode("xml document has no root element".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_encode_stage() {
        let out = Transform::Json.encode(json!({"a": 1})).unwrap();
        assert_eq!(out, json!(r#"{"a":1}"#));
    }

    #[test]
    fn test_json_decode_stage() {
        let out = Transform::Json
            .decode(json!(r#"{"a": 1, "b": [true]}"#))
            .unwrap();
        assert_eq!(out, json!({"a": 1, "b": [true]}));
    }

    #[test]
    fn test_xml_round_trip() {
        let encoded = xml_encode(&json!({"code": "0", "msg": "ok"})).unwrap();
        assert_eq!(encoded, "<xml><code>0</code><msg>ok</msg></xml>");
        let decoded = xml_decode(&encoded).unwrap();
        assert_eq!(decoded, json!({"code": "0", "msg": "ok"}));
    }

    #[test]
    fn test_xml_decode_nested() {
        let decoded = xml_decode("<xml><a><b>1</b></a><c>2</c></xml>").unwrap();
        assert_eq!(decoded, json!({"a": {"b": "1"}, "c": "2"}));
    }

    #[test]
    fn test_xml_encode_array_repeats_element() {
        let encoded = xml_encode(&json!({"item": ["a", "b"]})).unwrap();
        assert_eq!(encoded, "<xml><item>a</item><item>b</item></xml>");
    }

    #[test]
    fn test_xml_decode_unescapes_entities() {
        let decoded = xml_decode("<xml><msg>a &amp; b &lt;ok&gt;</msg></xml>").unwrap();
        assert_eq!(decoded, json!({"msg": "a & b <ok>"}));
    }

    #[test]
    fn test_xml_decode_malformed_fails() {
        assert!(xml_decode("<xml><a>1</b></xml>").is_err());
    }

    #[test]
    fn test_custom_stage() {
        let stage = Transform::custom(|v| Ok(json!({"wrapped": v})));
        let out = stage.encode(json!(1)).unwrap();
        assert_eq!(out, json!({"wrapped": 1}));
    }

    #[test]
    fn test_stages_run_in_order() {
        let stages = vec![
            Transform::custom(|v| Ok(json!({"inner": v}))),
            Transform::Json,
        ];
        let out = apply_encode(&stages, json!(2)).unwrap();
        assert_eq!(out, json!(r#"{"inner":2}"#));
    }

    #[test]
    fn test_sniff_decode_json() {
        let out = apply_decode(&[], r#"{"ok":true}"#.to_string(), "application/json").unwrap();
        assert_eq!(out, json!({"ok": true}));
    }

    #[test]
    fn test_sniff_decode_xml() {
        let out = apply_decode(&[], "<xml><ok>1</ok></xml>".to_string(), "text/xml").unwrap();
        assert_eq!(out, json!({"ok": "1"}));
    }

    #[test]
    fn test_sniff_decode_plain_text_passthrough() {
        let out = apply_decode(&[], "hello".to_string(), "text/plain").unwrap();
        assert_eq!(out, json!("hello"));
    }

    #[test]
    fn test_json_content_type_pattern() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("application/vnd.api+json"));
        assert!(is_json_content_type("text/x-json"));
        assert!(!is_json_content_type("text/html"));
    }

    #[test]
    fn test_xml_content_type_pattern() {
        assert!(is_xml_content_type("text/xml"));
        assert!(is_xml_content_type("application/xml"));
        assert!(is_xml_content_type("application/atom+xml"));
        assert!(is_xml_content_type("application/rss+xml"));
        assert!(!is_xml_content_type("application/json"));
    }
}
