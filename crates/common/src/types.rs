//! Core request/response types for apiverify

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// HTTP method of a request descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Value bound to a query parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    /// Encoded as repeated `key=value` pairs in list order
    Many(Vec<String>),
}

impl QueryValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(v) => vec![v.as_str()],
            QueryValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::Single(v.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        QueryValue::Single(v)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(vs: Vec<String>) -> Self {
        QueryValue::Many(vs)
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(vs: Vec<&str>) -> Self {
        QueryValue::Many(vs.into_iter().map(str::to_string).collect())
    }
}

/// Request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Body {
    /// Sent verbatim
    Raw(String),
    /// Serialized as JSON text
    Json(serde_json::Value),
}

impl Body {
    pub fn to_text(&self) -> Result<String> {
        match self {
            Body::Raw(text) => Ok(text.clone()),
            Body::Json(value) => Ok(serde_json::to_string(value)?),
        }
    }
}

/// Description of one HTTP call, relative to the configured endpoint.
///
/// Built once through the `with_*` methods and read through accessors; nothing
/// in the engine mutates a descriptor after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    method: HttpMethod,
    path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    path_params: BTreeMap<String, String>,
    #[serde(default, with = "ordered_query", skip_serializing_if = "Vec::is_empty")]
    query: Vec<(String, QueryValue)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<Body>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: BTreeMap::new(),
            query: Vec::new(),
            body: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Append a query parameter. Repeated names are kept in insertion order.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_raw_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(Body::Raw(body.into()));
        self
    }

    pub fn with_json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn path_params(&self) -> &BTreeMap<String, String> {
        &self.path_params
    }

    pub fn query(&self) -> &[(String, QueryValue)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Substitute every `{name}` placeholder in the path.
    ///
    /// An unterminated `{` is kept as literal text.
    pub fn resolve_path(&self) -> Result<String> {
        let mut resolved = String::with_capacity(self.path.len());
        let mut rest = self.path.as_str();

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                break;
            };
            let name = &rest[open + 1..open + close];
            let value = self.path_params.get(name).ok_or_else(|| Error::MissingPathParameter {
                name: name.to_string(),
                path: self.path.clone(),
            })?;
            resolved.push_str(&rest[..open]);
            resolved.push_str(value);
            rest = &rest[open + close + 1..];
        }
        resolved.push_str(rest);

        Ok(resolved)
    }

    /// Copy of this descriptor with `f` applied to every string it carries:
    /// path, path params, query values, headers and string leaves of the body.
    pub fn map_strings(&self, f: &dyn Fn(&str) -> String) -> Self {
        Self {
            method: self.method,
            path: f(&self.path),
            path_params: self
                .path_params
                .iter()
                .map(|(k, v)| (k.clone(), f(v)))
                .collect(),
            query: self
                .query
                .iter()
                .map(|(k, v)| {
                    let v = match v {
                        QueryValue::Single(s) => QueryValue::Single(f(s)),
                        QueryValue::Many(vs) => QueryValue::Many(vs.iter().map(|s| f(s)).collect()),
                    };
                    (k.clone(), v)
                })
                .collect(),
            body: self.body.as_ref().map(|body| match body {
                Body::Raw(text) => Body::Raw(f(text)),
                Body::Json(value) => Body::Json(map_json_strings(value, f)),
            }),
            headers: self
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), f(v)))
                .collect(),
        }
    }
}

/// Apply `f` to every string leaf of a JSON value
pub fn map_json_strings(value: &serde_json::Value, f: &dyn Fn(&str) -> String) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::String(s) => Value::String(f(s)),
        Value::Array(items) => Value::Array(items.iter().map(|v| map_json_strings(v, f)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), map_json_strings(v, f)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Serde adapter keeping query parameters as an ordered map in YAML/JSON
mod ordered_query {
    use super::*;

    pub fn serialize<S: Serializer>(
        query: &[(String, QueryValue)],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(query.len()))?;
        for (name, value) in query {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<(String, QueryValue)>, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = Vec<(String, QueryValue)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of query parameter names to a string or list of strings")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, QueryValue>()? {
                    pairs.push((name, value));
                }
                Ok(pairs)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// What came back from one HTTP exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseResult {
    pub status_code: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub raw_body: String,
    /// `None` when the body is empty or not valid JSON
    #[serde(default)]
    pub parsed_body: Option<serde_json::Value>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl ResponseResult {
    /// Build a result from a status and body text, parsing the body as JSON when possible
    pub fn new(status_code: u16, raw_body: impl Into<String>) -> Self {
        let raw_body = raw_body.into();
        let parsed_body = parse_body(&raw_body);
        Self {
            status_code,
            headers: BTreeMap::new(),
            raw_body,
            parsed_body,
            duration_ms: 0,
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

fn parse_body(raw: &str) -> Option<serde_json::Value> {
    if raw.trim().is_empty() {
        return None;
    }
    serde_json::from_str(raw).ok()
}
