//! Distinguished names.
//!
//! A [`Dn`] is an ordered list of relative components, most specific first
//! (`cn=alice,ou=people,dc=example,dc=com`). Comparison is case-insensitive on
//! both attribute types and values. Two shapes get special treatment:
//!
//! * the null DN (empty string) names the root of the whole tree;
//! * special DNs start with `@` and name synthetic backend records that are
//!   never subject to read filtering.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error as ThisError;

use crate::Error;

/// One `attribute=value` component of a distinguished name.
#[derive(Debug, Clone)]
pub struct Rdn {
    attribute: String,
    value: String,
    folded: String,
}

impl Rdn {
    /// Create a component from an attribute type and an unescaped value.
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Result<Self, DnError> {
        let attribute = attribute.into();
        let value = value.into();
        if attribute.is_empty()
            || !attribute
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        {
            return Err(DnError::InvalidAttributeType { attribute });
        }
        let folded = format!("{}={}", attribute.to_ascii_lowercase(), value.to_lowercase());
        Ok(Self {
            attribute,
            value,
            folded,
        })
    }

    /// The attribute type, as written.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// The unescaped value, as written.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl PartialEq for Rdn {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for Rdn {}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attribute, escape_value(&self.value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Regular,
    Special(String),
}

/// A distinguished name.
#[derive(Debug, Clone)]
pub struct Dn {
    kind: Kind,
    rdns: Vec<Rdn>,
}

impl Dn {
    /// The null DN, naming the root of the tree.
    pub fn null() -> Self {
        Self {
            kind: Kind::Regular,
            rdns: Vec::new(),
        }
    }

    /// Parse a string representation.
    ///
    /// Handles backslash escapes, including two-digit hex escapes (`\2C`).
    pub fn parse(input: &str) -> Result<Self, DnError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::null());
        }
        if trimmed.starts_with('@') {
            return Ok(Self {
                kind: Kind::Special(trimmed.to_string()),
                rdns: Vec::new(),
            });
        }
        let rdns = parse_rdns(trimmed)?;
        Ok(Self {
            kind: Kind::Regular,
            rdns,
        })
    }

    /// Build a DN from components, most specific first.
    pub fn from_rdns(rdns: Vec<Rdn>) -> Self {
        Self {
            kind: Kind::Regular,
            rdns,
        }
    }

    /// Returns true for the null DN.
    pub fn is_null(&self) -> bool {
        self.kind == Kind::Regular && self.rdns.is_empty()
    }

    /// Returns true for synthetic `@` names.
    pub fn is_special(&self) -> bool {
        matches!(self.kind, Kind::Special(_))
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    /// Returns true when the DN has no components (null or special).
    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Components, most specific first.
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// The DN with its most specific component removed.
    ///
    /// A single-component DN has the null DN as parent. The null DN and special
    /// DNs have no parent.
    pub fn parent(&self) -> Option<Dn> {
        if self.is_special() || self.rdns.is_empty() {
            return None;
        }
        Some(Self::from_rdns(self.rdns[1..].to_vec()))
    }

    /// A child of this DN with one more component.
    pub fn child(&self, attribute: &str, value: &str) -> Result<Dn, DnError> {
        if self.is_special() {
            return Err(DnError::SpecialHasNoChildren {
                dn: self.to_string(),
            });
        }
        let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
        rdns.push(Rdn::new(attribute, value)?);
        rdns.extend(self.rdns.iter().cloned());
        Ok(Self::from_rdns(rdns))
    }

    /// Returns true when `self` equals `base` or lies anywhere below it.
    ///
    /// This cannot tell a child from a grandchild; compare against
    /// [`Dn::parent`] for that.
    pub fn is_descendant_of(&self, base: &Dn) -> bool {
        if self.is_special() || base.is_special() {
            return self == base;
        }
        if base.rdns.len() > self.rdns.len() {
            return false;
        }
        let offset = self.rdns.len() - base.rdns.len();
        self.rdns[offset..]
            .iter()
            .zip(base.rdns.iter())
            .all(|(a, b)| a == b)
    }
}

impl Default for Dn {
    fn default() -> Self {
        Self::null()
    }
}

impl PartialEq for Dn {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.rdns == other.rdns
    }
}

impl Eq for Dn {}

impl Hash for Dn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Kind::Special(name) = &self.kind {
            name.hash(state);
        }
        for rdn in &self.rdns {
            rdn.folded.hash(state);
        }
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Kind::Special(name) = &self.kind {
            return f.write_str(name);
        }
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{rdn}")?;
        }
        Ok(())
    }
}

impl FromStr for Dn {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dn::parse(s)
    }
}

fn parse_rdns(input: &str) -> Result<Vec<Rdn>, DnError> {
    let bytes = input.as_bytes();
    let mut rdns = Vec::new();
    let mut attribute: Option<String> = None;
    let mut buf: Vec<u8> = Vec::new();
    // Length of `buf` that must survive trailing-space trimming (escaped bytes).
    let mut protected = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let next = *bytes.get(i + 1).ok_or_else(|| DnError::InvalidEscape {
                    dn: input.to_string(),
                })?;
                if next.is_ascii_hexdigit() {
                    let pair = bytes.get(i + 1..i + 3).ok_or_else(|| DnError::InvalidEscape {
                        dn: input.to_string(),
                    })?;
                    let decoded = hex::decode(pair).map_err(|_| DnError::InvalidEscape {
                        dn: input.to_string(),
                    })?;
                    buf.extend_from_slice(&decoded);
                    i += 3;
                } else {
                    buf.push(next);
                    i += 2;
                }
                protected = buf.len();
            }
            b'=' if attribute.is_none() => {
                let name = String::from_utf8(std::mem::take(&mut buf)).map_err(|_| {
                    DnError::InvalidEncoding {
                        dn: input.to_string(),
                    }
                })?;
                attribute = Some(name.trim().to_string());
                protected = 0;
                i += 1;
            }
            b',' => {
                rdns.push(finish_rdn(input, attribute.take(), &mut buf, protected)?);
                protected = 0;
                i += 1;
            }
            b' ' if buf.is_empty() => {
                i += 1;
            }
            b => {
                buf.push(b);
                i += 1;
            }
        }
    }
    rdns.push(finish_rdn(input, attribute.take(), &mut buf, protected)?);
    Ok(rdns)
}

fn finish_rdn(
    input: &str,
    attribute: Option<String>,
    buf: &mut Vec<u8>,
    protected: usize,
) -> Result<Rdn, DnError> {
    let attribute = attribute.ok_or_else(|| DnError::MissingSeparator {
        dn: input.to_string(),
    })?;
    while buf.len() > protected && buf.last() == Some(&b' ') {
        buf.pop();
    }
    let value = String::from_utf8(std::mem::take(buf)).map_err(|_| DnError::InvalidEncoding {
        dn: input.to_string(),
    })?;
    Rdn::new(attribute, value)
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            c if c.is_ascii_control() => {
                out.push('\\');
                out.push_str(&hex::encode_upper([c as u8]));
            }
            c => out.push(c),
        }
    }
    out
}

/// Errors that can occur while handling distinguished names.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum DnError {
    /// A component has no `=` separator.
    #[error("Missing '=' in distinguished name: {dn}")]
    MissingSeparator {
        /// The rejected input
        dn: String,
    },

    /// A backslash escape is truncated or not valid hex.
    #[error("Invalid escape sequence in distinguished name: {dn}")]
    InvalidEscape {
        /// The rejected input
        dn: String,
    },

    /// Escaped bytes do not form valid UTF-8.
    #[error("Invalid UTF-8 in distinguished name: {dn}")]
    InvalidEncoding {
        /// The rejected input
        dn: String,
    },

    /// The attribute type of a component is empty or has illegal characters.
    #[error("Invalid attribute type in distinguished name component: {attribute:?}")]
    InvalidAttributeType {
        /// The rejected attribute type
        attribute: String,
    },

    /// Special DNs cannot be extended.
    #[error("Special distinguished name {dn} cannot have children")]
    SpecialHasNoChildren {
        /// The special DN
        dn: String,
    },
}

impl From<DnError> for Error {
    fn from(err: DnError) -> Self {
        Error::Dn(err)
    }
}
