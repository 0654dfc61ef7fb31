//! Canonical query strings
//!
//! Query parameters may appear in any order in a URL without changing the
//! meaning of the request, and HTTP stacks disagree about which characters
//! need escaping. Both ends of a signed request only arrive at the same
//! signature when the parameters are brought into one repeatable shape:
//! every pair is escaped against the RFC 3986 unreserved set, the
//! `name=value` strings are sorted bytewise and joined with `&`.

use crate::{AuthError, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Bytes passed through unescaped: `A-Z a-z 0-9 - . _ ~`.
///
/// Everything else becomes `%XX` with uppercase hex digits.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Value of a single named parameter: one string or an ordered list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Parameter appears once
    Single(String),

    /// Parameter appears once per entry, in order
    Multi(Vec<String>),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::Multi(values)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// Ordered multimap of query parameters
///
/// Keeps every occurrence of every name. The order of pairs is preserved
/// for callers but has no influence on [`QueryParams::canonicalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Create an empty parameter collection
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append one `(name, value)` pair
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    /// Append one pair, builder style
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// Append a single or multi-valued parameter
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        let name = name.into();
        match value.into() {
            ParamValue::Single(value) => self.pairs.push((name, value)),
            ParamValue::Multi(values) => {
                for value in values {
                    self.pairs.push((name.clone(), value));
                }
            }
        }
        self
    }

    /// Parse a raw query string such as `e=y&a=b&e=x`
    ///
    /// A leading `?` is ignored and `+` stands for a space. Escapes must
    /// decode to UTF-8; anything else would be replaced lossily and could
    /// collide with a different request, so it is rejected.
    pub fn parse(query: &str) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::new();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.append(decode_component(name)?, decode_component(value)?);
        }
        Ok(params)
    }

    /// Build from a JSON object
    ///
    /// Strings are taken as-is, numbers and booleans as their JSON text and
    /// arrays of those as repeated parameters. `null` stands for "no
    /// parameters" at the root; anywhere else it cannot be coerced.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = match value {
            Value::Object(object) => object,
            Value::Null => return Ok(Self::new()),
            other => {
                return Err(AuthError::Canonicalization(format!(
                    "expected an object of parameters, got {}",
                    json_kind(other)
                )));
            }
        };

        let mut params = Self::new();
        for (name, value) in object {
            match value {
                Value::Array(items) => {
                    for item in items {
                        params.append(name.as_str(), coerce_scalar(name, item)?);
                    }
                }
                other => {
                    params.append(name.as_str(), coerce_scalar(name, other)?);
                }
            }
        }
        Ok(params)
    }

    /// Build from any serializable struct or map
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value)
            .map_err(|e| AuthError::Canonicalization(e.to_string()))?;
        Self::from_json(&value)
    }

    /// All pairs in insertion order
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no pairs at all
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Canonical form of the whole collection
    pub fn canonicalize(&self) -> String {
        canonicalize(self)
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for QueryParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from(entries: [(K, V); N]) -> Self {
        let mut params = Self::new();
        for (name, value) in entries {
            params.insert(name, value);
        }
        params
    }
}

impl<K, V> From<HashMap<K, V>> for QueryParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from(map: HashMap<K, V>) -> Self {
        let mut params = Self::new();
        for (name, value) in map {
            params.insert(name, value);
        }
        params
    }
}

impl<K, V> From<BTreeMap<K, V>> for QueryParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from(map: BTreeMap<K, V>) -> Self {
        let mut params = Self::new();
        for (name, value) in map {
            params.insert(name, value);
        }
        params
    }
}

/// Escape one name or value over its UTF-8 bytes
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

/// Undo form encoding of one name or value
fn decode_component(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| {
            AuthError::Canonicalization(format!("`{raw}` does not decode to UTF-8"))
        })
}

/// Canonicalize a parameter collection
///
/// The result only depends on the multiset of pairs. An empty collection
/// yields the empty string.
pub fn canonicalize(params: &QueryParams) -> String {
    let mut encoded: Vec<String> = params
        .pairs
        .iter()
        .map(|(name, value)| format!("{}={}", encode_component(name), encode_component(value)))
        .collect();

    // Encoded output is pure ASCII, so `str` ordering is unsigned byte order.
    encoded.sort_unstable();
    encoded.join("&")
}

fn coerce_scalar(name: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(AuthError::Canonicalization(format!(
            "parameter '{}' has a {} value",
            name,
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
