//! Schema catalog boundary.
//!
//! The read filter needs two things from the schema: the definition of every
//! attribute it is asked to disclose, and the most specific structural class
//! of every entry it filters. Both come through the [`Schema`] trait.

pub mod errors;
pub mod in_memory;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::SEARCH_FLAG_CONFIDENTIAL;

pub use errors::SchemaError;
pub use in_memory::InMemorySchema;

/// Definition of one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub ldap_display_name: String,
    pub schema_id_guid: Uuid,
    /// Property set the attribute belongs to, if any.
    #[serde(default)]
    pub attribute_security_guid: Option<Uuid>,
    #[serde(default)]
    pub search_flags: u32,
}

impl AttributeDefinition {
    /// A definition with a fresh schema GUID and no flags.
    pub fn new(ldap_display_name: impl Into<String>) -> Self {
        Self {
            ldap_display_name: ldap_display_name.into(),
            schema_id_guid: Uuid::new_v4(),
            attribute_security_guid: None,
            search_flags: 0,
        }
    }

    /// Builder-style setter marking the attribute confidential.
    pub fn confidential(mut self) -> Self {
        self.search_flags |= SEARCH_FLAG_CONFIDENTIAL;
        self
    }

    /// Reading a confidential attribute needs `CONTROL_ACCESS` on top of `READ_PROP`.
    pub fn is_confidential(&self) -> bool {
        self.search_flags & SEARCH_FLAG_CONFIDENTIAL != 0
    }
}

/// Category of an object class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    Structural,
    Abstract,
    Auxiliary,
}

/// Definition of one object class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub ldap_display_name: String,
    pub schema_id_guid: Uuid,
    pub kind: ClassKind,
    /// Direct superclass; `None` only for `top`.
    #[serde(default)]
    pub subclass_of: Option<String>,
}

impl ClassDefinition {
    /// A class with a fresh schema GUID.
    pub fn new(
        ldap_display_name: impl Into<String>,
        kind: ClassKind,
        subclass_of: Option<&str>,
    ) -> Self {
        Self {
            ldap_display_name: ldap_display_name.into(),
            schema_id_guid: Uuid::new_v4(),
            kind,
            subclass_of: subclass_of.map(str::to_string),
        }
    }
}

/// Read access to the schema catalog.
pub trait Schema: Send + Sync {
    /// Case-insensitive attribute lookup by LDAP display name.
    fn attribute_by_name(&self, name: &str) -> Option<&AttributeDefinition>;

    /// Case-insensitive class lookup by LDAP display name.
    fn class_by_name(&self, name: &str) -> Option<&ClassDefinition>;

    /// The most specific structural class among `object_classes`.
    ///
    /// Specificity is the depth of the class below `top`. Unknown and
    /// non-structural classes are ignored; ties keep the first candidate.
    fn structural_class(&self, object_classes: &[&str]) -> Option<&ClassDefinition> {
        let mut best: Option<(&ClassDefinition, usize)> = None;
        for name in object_classes {
            let Some(class) = self.class_by_name(name) else {
                continue;
            };
            if class.kind != ClassKind::Structural {
                continue;
            }
            let depth = self.class_depth(class);
            if best.is_none_or(|(_, d)| depth > d) {
                best = Some((class, depth));
            }
        }
        best.map(|(class, _)| class)
    }

    /// Number of superclass links between `class` and the root.
    fn class_depth(&self, class: &ClassDefinition) -> usize {
        // Bounded walk so a cyclic catalog cannot hang a search.
        const MAX_DEPTH: usize = 64;
        let mut depth = 0;
        let mut current = class;
        while let Some(parent) = current.subclass_of.as_deref() {
            if depth >= MAX_DEPTH || parent.eq_ignore_ascii_case(&current.ldap_display_name) {
                break;
            }
            match self.class_by_name(parent) {
                Some(next) => {
                    depth += 1;
                    current = next;
                }
                None => break,
            }
        }
        depth
    }
}
