//! Directory entries as streamed by a backend.
//!
//! An [`Entry`] is a distinguished name plus an ordered list of attributes.
//! Attribute values are reference-counted byte buffers, so handing a value
//! from a backend-produced entry to a longer-lived cache shares the buffer
//! instead of copying it.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::constants::{INSTANCE_TYPE, OBJECT_CLASS, OBJECT_SID};
use crate::dn::Dn;
use crate::security::Sid;

/// A single attribute value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Value(Arc<[u8]>);

impl Value {
    /// Create a value from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The value as UTF-8 text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for a zero-length value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true when both values share one underlying buffer.
    pub fn shares_buffer(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "{s:?}"),
            None => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

/// A named attribute with its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    values: Vec<Value>,
}

impl Attribute {
    /// Create an attribute.
    pub fn new<V: Into<Value>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The attribute name, as the backend spelled it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// All values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The first value, if any.
    pub fn first(&self) -> Option<&Value> {
        self.values.first()
    }

    /// Take ownership of the values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// A directory object: its name and its attributes in backend order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    dn: Dn,
    attributes: Vec<Attribute>,
}

impl Entry {
    /// Create an entry with no attributes.
    pub fn new(dn: Dn) -> Self {
        Self {
            dn,
            attributes: Vec::new(),
        }
    }

    /// Reassemble an entry from its parts.
    pub fn from_parts(dn: Dn, attributes: Vec<Attribute>) -> Self {
        Self { dn, attributes }
    }

    /// Split the entry into its name and attributes.
    pub fn into_parts(self) -> (Dn, Vec<Attribute>) {
        (self.dn, self.attributes)
    }

    /// Builder-style [`Entry::set`].
    pub fn with_attribute<V: Into<Value>>(
        mut self,
        name: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.set(name, values);
        self
    }

    /// Replace the values of `name`, appending the attribute if it is new.
    pub fn set<V: Into<Value>>(&mut self, name: &str, values: impl IntoIterator<Item = V>) {
        let attribute = Attribute::new(name, values);
        match self.attributes.iter_mut().find(|a| a.is_named(name)) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    /// The entry's distinguished name.
    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    /// Attributes in backend order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attribute names in backend order.
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(Attribute::name).collect()
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true when the entry carries no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Case-insensitive attribute lookup.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.is_named(name))
    }

    /// Returns true when the entry carries `name`.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Remove `name` from the entry, returning it.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        let index = self.attributes.iter().position(|a| a.is_named(name))?;
        Some(self.attributes.remove(index))
    }

    /// The `instanceType` bits, or 0 when absent or unparsable.
    pub fn instance_type(&self) -> u32 {
        self.attribute(INSTANCE_TYPE)
            .and_then(Attribute::first)
            .and_then(Value::as_str)
            .and_then(|s| {
                let s = s.trim();
                s.parse::<u32>()
                    .ok()
                    .or_else(|| s.parse::<i32>().ok().map(|v| v as u32))
            })
            .unwrap_or(0)
    }

    /// The object's security identifier, when present and well formed.
    pub fn object_sid(&self) -> Option<Sid> {
        let value = self.attribute(OBJECT_SID)?.first()?;
        match Sid::from_bytes(value.as_bytes()) {
            Ok(sid) => Some(sid),
            Err(e) => {
                debug!(dn = %self.dn, error = %e, "ignoring malformed objectSid");
                None
            }
        }
    }

    /// All `objectClass` values that are valid text.
    pub fn object_classes(&self) -> Vec<&str> {
        self.attribute(OBJECT_CLASS)
            .map(|a| a.values().iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}
