//! Minimal JSON-path expressions for response assertions
//!
//! Supports an optional `$` root, dotted keys, numeric array indexes and
//! quoted keys in brackets: `id`, `category.name`, `tags[0].name`,
//! `$.photoUrls[0]`, `$['odd key']`.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use apiverify_common::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(expr: &str) -> Result<Self> {
        let malformed =
            |reason: &str| Error::MalformedExpectation(format!("invalid JSON path `{expr}`: {reason}"));

        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(malformed("empty path"));
        }

        let (rooted, rest) = match trimmed.strip_prefix('$') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        if rooted && !(rest.is_empty() || rest.starts_with('.') || rest.starts_with('[')) {
            return Err(malformed("`$` must be followed by `.` or `[`"));
        }
        let chars: Vec<char> = rest.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;
        let mut expect_key = false;

        if rooted && chars.first() == Some(&'.') {
            i = 1;
            expect_key = true;
        }

        while i < chars.len() {
            match chars[i] {
                '[' => {
                    if expect_key {
                        return Err(malformed("expected a key after `.`"));
                    }
                    let close = chars[i..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|offset| i + offset)
                        .ok_or_else(|| malformed("unterminated `[`"))?;
                    let inner: String = chars[i + 1..close].iter().collect();
                    let segment = parse_bracket(&inner)
                        .ok_or_else(|| malformed("brackets must hold an index or a quoted key"))?;
                    segments.push(segment);
                    i = close + 1;
                }
                '.' => {
                    if expect_key || segments.is_empty() {
                        return Err(malformed("empty key"));
                    }
                    expect_key = true;
                    i += 1;
                }
                _ => {
                    if !segments.is_empty() && !expect_key {
                        return Err(malformed("expected `.` or `[` between segments"));
                    }
                    let start = i;
                    while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        i += 1;
                    }
                    segments.push(Segment::Key(chars[start..i].iter().collect()));
                    expect_key = false;
                }
            }
        }

        if expect_key {
            return Err(malformed("path ends with `.`"));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Walk `root` along this path. `None` when any segment is missing or
    /// indexes into the wrong kind of value.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| match segment {
                Segment::Key(key) => current.as_object()?.get(key),
                Segment::Index(index) => current.as_array()?.get(*index),
            })
    }
}

fn parse_bracket(inner: &str) -> Option<Segment> {
    let inner = inner.trim();
    for quote in ['\'', '"'] {
        if inner.len() >= 2 && inner.starts_with(quote) && inner.ends_with(quote) {
            return Some(Segment::Key(inner[1..inner.len() - 1].to_string()));
        }
    }
    inner.parse().ok().map(Segment::Index)
}

impl FromStr for JsonPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
