//! In-memory schema catalog.

use std::collections::HashMap;

use serde::Deserialize;

use super::{AttributeDefinition, ClassDefinition, ClassKind, Schema, SchemaError};
use crate::Result;
use crate::constants::{
    INSTANCE_TYPE, NT_SECURITY_DESCRIPTOR, OBJECT_CLASS, OBJECT_SID, REPL_PROPERTY_META_DATA,
};

/// A schema catalog held in hash maps keyed by lowercased display name.
#[derive(Debug, Clone, Default)]
pub struct InMemorySchema {
    attributes: HashMap<String, AttributeDefinition>,
    classes: HashMap<String, ClassDefinition>,
}

#[derive(Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    attributes: Vec<AttributeDefinition>,
    #[serde(default)]
    classes: Vec<ClassDefinition>,
}

impl InMemorySchema {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the attributes every filtered search touches, plus
    /// the `top` class.
    pub fn core() -> Self {
        let mut schema = Self::new();
        for name in [
            OBJECT_CLASS,
            INSTANCE_TYPE,
            OBJECT_SID,
            NT_SECURITY_DESCRIPTOR,
            REPL_PROPERTY_META_DATA,
            "objectGUID",
            "name",
            "cn",
            "distinguishedName",
            "whenCreated",
            "whenChanged",
        ] {
            schema
                .attributes
                .insert(name.to_ascii_lowercase(), AttributeDefinition::new(name));
        }
        schema.classes.insert(
            "top".to_string(),
            ClassDefinition::new("top", ClassKind::Abstract, None),
        );
        schema
    }

    /// Build a catalog from a JSON document with `attributes` and `classes` arrays.
    ///
    /// Classes must be listed after their superclasses.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: SchemaDocument = serde_json::from_str(json)?;
        let mut schema = Self::new();
        for attribute in document.attributes {
            schema.add_attribute(attribute)?;
        }
        for class in document.classes {
            schema.add_class(class)?;
        }
        Ok(schema)
    }

    /// Register an attribute.
    pub fn add_attribute(&mut self, attribute: AttributeDefinition) -> Result<()> {
        let key = attribute.ldap_display_name.to_ascii_lowercase();
        if self.attributes.contains_key(&key) {
            return Err(SchemaError::DuplicateAttribute {
                name: attribute.ldap_display_name,
            }
            .into());
        }
        self.attributes.insert(key, attribute);
        Ok(())
    }

    /// Register a class. Its superclass must already be registered.
    pub fn add_class(&mut self, class: ClassDefinition) -> Result<()> {
        let key = class.ldap_display_name.to_ascii_lowercase();
        if self.classes.contains_key(&key) {
            return Err(SchemaError::DuplicateClass {
                name: class.ldap_display_name,
            }
            .into());
        }
        if let Some(superclass) = &class.subclass_of
            && !self.classes.contains_key(&superclass.to_ascii_lowercase())
        {
            return Err(SchemaError::UnknownSuperclass {
                name: class.ldap_display_name.clone(),
                superclass: superclass.clone(),
            }
            .into());
        }
        self.classes.insert(key, class);
        Ok(())
    }

    /// Builder-style [`InMemorySchema::add_attribute`].
    pub fn with_attribute(mut self, attribute: AttributeDefinition) -> Result<Self> {
        self.add_attribute(attribute)?;
        Ok(self)
    }

    /// Builder-style [`InMemorySchema::add_class`].
    pub fn with_class(mut self, class: ClassDefinition) -> Result<Self> {
        self.add_class(class)?;
        Ok(self)
    }
}

impl Schema for InMemorySchema {
    fn attribute_by_name(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.get(&name.to_ascii_lowercase())
    }

    fn class_by_name(&self, name: &str) -> Option<&ClassDefinition> {
        self.classes.get(&name.to_ascii_lowercase())
    }
}
