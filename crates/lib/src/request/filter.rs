//! Search filter predicate trees.
//!
//! Filters are parsed from the usual string representation
//! (`(&(objectClass=user)(mail=*@example.com))`). The read filter only asks a
//! tree which attributes it mentions; full evaluation against an entry is
//! provided for backends that execute searches in memory.

use std::cmp::Ordering;
use std::fmt;

use super::errors::RequestError;
use crate::entry::{Entry, Value};

/// A filter predicate tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equality {
        attribute: String,
        value: Value,
    },
    Substrings {
        attribute: String,
        initial: Option<Value>,
        any: Vec<Value>,
        final_value: Option<Value>,
    },
    GreaterOrEqual {
        attribute: String,
        value: Value,
    },
    LessOrEqual {
        attribute: String,
        value: Value,
    },
    Present {
        attribute: String,
    },
    Approx {
        attribute: String,
        value: Value,
    },
}

impl Filter {
    /// Parse the string representation of a filter.
    pub fn parse(input: &str) -> Result<Self, RequestError> {
        let mut parser = Parser {
            input,
            bytes: input.trim().as_bytes(),
            pos: 0,
        };
        let filter = parser.filter()?;
        if parser.pos != parser.bytes.len() {
            return Err(parser.error("trailing characters after filter"));
        }
        Ok(filter)
    }

    /// `(attribute=value)`
    pub fn equality(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Equality {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// `(attribute=*)`
    pub fn present(attribute: impl Into<String>) -> Self {
        Filter::Present {
            attribute: attribute.into(),
        }
    }

    /// Returns true when `attribute` appears anywhere in the tree.
    pub fn references(&self, attribute: &str) -> bool {
        match self {
            Filter::And(filters) | Filter::Or(filters) => {
                filters.iter().any(|f| f.references(attribute))
            }
            Filter::Not(inner) => inner.references(attribute),
            Filter::Equality { attribute: a, .. }
            | Filter::Substrings { attribute: a, .. }
            | Filter::GreaterOrEqual { attribute: a, .. }
            | Filter::LessOrEqual { attribute: a, .. }
            | Filter::Present { attribute: a }
            | Filter::Approx { attribute: a, .. } => a.eq_ignore_ascii_case(attribute),
        }
    }

    /// Evaluate the filter against an entry.
    ///
    /// Text values compare case-insensitively; ordering comparisons are
    /// numeric when both sides are integers.
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Filter::Not(inner) => !inner.matches(entry),
            Filter::Present { attribute } => entry.has_attribute(attribute),
            Filter::Equality { attribute, value } | Filter::Approx { attribute, value } => {
                any_value(entry, attribute, |v| compare(v, value) == Ordering::Equal)
            }
            Filter::GreaterOrEqual { attribute, value } => {
                any_value(entry, attribute, |v| compare(v, value) != Ordering::Less)
            }
            Filter::LessOrEqual { attribute, value } => {
                any_value(entry, attribute, |v| compare(v, value) != Ordering::Greater)
            }
            Filter::Substrings {
                attribute,
                initial,
                any,
                final_value,
            } => any_value(entry, attribute, |v| {
                substring_match(v, initial.as_ref(), any, final_value.as_ref())
            }),
        }
    }
}

fn any_value(entry: &Entry, attribute: &str, pred: impl Fn(&Value) -> bool) -> bool {
    entry
        .attribute(attribute)
        .is_some_and(|a| a.values().iter().any(pred))
}

fn folded(value: &Value) -> Option<String> {
    value.as_str().map(str::to_lowercase)
}

fn compare(left: &Value, right: &Value) -> Ordering {
    match (left.as_str(), right.as_str()) {
        (Some(l), Some(r)) => match (l.trim().parse::<i64>(), r.trim().parse::<i64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => l.to_lowercase().cmp(&r.to_lowercase()),
        },
        _ => left.as_bytes().cmp(right.as_bytes()),
    }
}

fn substring_match(
    value: &Value,
    initial: Option<&Value>,
    any: &[Value],
    final_value: Option<&Value>,
) -> bool {
    let Some(haystack) = folded(value) else {
        return false;
    };
    let mut rest = haystack.as_str();
    if let Some(initial) = initial {
        let Some(prefix) = folded(initial) else {
            return false;
        };
        match rest.strip_prefix(prefix.as_str()) {
            Some(r) => rest = r,
            None => return false,
        }
    }
    for piece in any {
        let Some(piece) = folded(piece) else {
            return false;
        };
        match rest.find(piece.as_str()) {
            Some(i) => rest = &rest[i + piece.len()..],
            None => return false,
        }
    }
    match final_value {
        Some(suffix) => folded(suffix).is_some_and(|s| rest.ends_with(s.as_str())),
        None => true,
    }
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> RequestError {
        RequestError::InvalidFilter {
            filter: self.input.to_string(),
            reason: format!("{reason} at offset {}", self.pos),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<(), RequestError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn filter(&mut self) -> Result<Filter, RequestError> {
        self.expect(b'(')?;
        let filter = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                Filter::And(self.list()?)
            }
            Some(b'|') => {
                self.pos += 1;
                Filter::Or(self.list()?)
            }
            Some(b'!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.expect(b')')?;
        Ok(filter)
    }

    fn list(&mut self) -> Result<Vec<Filter>, RequestError> {
        let mut filters = Vec::new();
        while self.peek() == Some(b'(') {
            filters.push(self.filter()?);
        }
        Ok(filters)
    }

    fn item(&mut self) -> Result<Filter, RequestError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'=' | b'~' | b'>' | b'<' | b':' | b'(' | b')') {
                break;
            }
            self.pos += 1;
        }
        let attribute = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| self.error("attribute is not UTF-8"))?
            .trim()
            .to_string();
        if attribute.is_empty() {
            return Err(self.error("missing attribute"));
        }

        let op = match self.peek() {
            Some(b'=') => b'=',
            Some(b':') => {
                return Err(RequestError::UnsupportedFilter {
                    filter: self.input.to_string(),
                    reason: "extensible match".to_string(),
                });
            }
            Some(b @ (b'~' | b'>' | b'<')) => {
                self.pos += 1;
                if self.peek() != Some(b'=') {
                    return Err(self.error("expected '=' after comparison operator"));
                }
                b
            }
            _ => return Err(self.error("missing operator")),
        };
        self.pos += 1;

        let value_start = self.pos;
        while let Some(b) = self.peek() {
            if b == b')' {
                break;
            }
            if b == b'(' {
                return Err(self.error("unescaped '(' in value"));
            }
            self.pos += 1;
        }
        let raw = &self.bytes[value_start..self.pos];

        match op {
            b'~' => Ok(Filter::Approx {
                attribute,
                value: self.unescape(raw)?,
            }),
            b'>' => Ok(Filter::GreaterOrEqual {
                attribute,
                value: self.unescape(raw)?,
            }),
            b'<' => Ok(Filter::LessOrEqual {
                attribute,
                value: self.unescape(raw)?,
            }),
            _ if raw == b"*" => Ok(Filter::Present { attribute }),
            _ if raw.contains(&b'*') => self.substrings(attribute, raw),
            _ => Ok(Filter::Equality {
                attribute,
                value: self.unescape(raw)?,
            }),
        }
    }

    fn substrings(&self, attribute: String, raw: &[u8]) -> Result<Filter, RequestError> {
        let pieces: Vec<&[u8]> = raw.split(|b| *b == b'*').collect();
        let last = pieces.len() - 1;
        let mut initial = None;
        let mut any = Vec::new();
        let mut final_value = None;
        for (i, piece) in pieces.iter().enumerate() {
            if piece.is_empty() {
                continue;
            }
            let value = self.unescape(piece)?;
            if i == 0 {
                initial = Some(value);
            } else if i == last {
                final_value = Some(value);
            } else {
                any.push(value);
            }
        }
        Ok(Filter::Substrings {
            attribute,
            initial,
            any,
            final_value,
        })
    }

    fn unescape(&self, raw: &[u8]) -> Result<Value, RequestError> {
        let mut out = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'\\' {
                let pair = raw
                    .get(i + 1..i + 3)
                    .ok_or_else(|| self.error("truncated escape"))?;
                let decoded = hex::decode(pair).map_err(|_| self.error("invalid hex escape"))?;
                out.extend_from_slice(&decoded);
                i += 3;
            } else {
                out.push(raw[i]);
                i += 1;
            }
        }
        Ok(Value::new(out))
    }
}

fn escape(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for b in value.as_bytes() {
        match b {
            b'*' | b'(' | b')' | b'\\' | 0 => write!(f, "\\{:02x}", b)?,
            b if b.is_ascii() && !b.is_ascii_control() => write!(f, "{}", *b as char)?,
            b => write!(f, "\\{:02x}", b)?,
        }
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(filters) | Filter::Or(filters) => {
                f.write_str(if matches!(self, Filter::And(_)) { "(&" } else { "(|" })?;
                for filter in filters {
                    write!(f, "{filter}")?;
                }
                f.write_str(")")
            }
            Filter::Not(inner) => write!(f, "(!{inner})"),
            Filter::Present { attribute } => write!(f, "({attribute}=*)"),
            Filter::Equality { attribute, value } => {
                write!(f, "({attribute}=")?;
                escape(value, f)?;
                f.write_str(")")
            }
            Filter::Approx { attribute, value } => {
                write!(f, "({attribute}~=")?;
                escape(value, f)?;
                f.write_str(")")
            }
            Filter::GreaterOrEqual { attribute, value } => {
                write!(f, "({attribute}>=")?;
                escape(value, f)?;
                f.write_str(")")
            }
            Filter::LessOrEqual { attribute, value } => {
                write!(f, "({attribute}<=")?;
                escape(value, f)?;
                f.write_str(")")
            }
            Filter::Substrings {
                attribute,
                initial,
                any,
                final_value,
            } => {
                write!(f, "({attribute}=")?;
                if let Some(initial) = initial {
                    escape(initial, f)?;
                }
                f.write_str("*")?;
                for piece in any {
                    escape(piece, f)?;
                    f.write_str("*")?;
                }
                if let Some(final_value) = final_value {
                    escape(final_value, f)?;
                }
                f.write_str(")")
            }
        }
    }
}
