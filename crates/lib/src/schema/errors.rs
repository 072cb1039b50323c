//! Schema error types for the aclread library.

use thiserror::Error as ThisError;

use crate::Error;

/// Errors that can occur while building a schema catalog.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum SchemaError {
    /// An attribute with the same name is already registered.
    #[error("Attribute already defined: {name}")]
    DuplicateAttribute {
        /// The conflicting attribute name
        name: String,
    },

    /// A class with the same name is already registered.
    #[error("Class already defined: {name}")]
    DuplicateClass {
        /// The conflicting class name
        name: String,
    },

    /// A class names a superclass that is not registered.
    #[error("Class {name} derives from unknown class {superclass}")]
    UnknownSuperclass {
        /// The class being registered
        name: String,
        /// The missing superclass
        superclass: String,
    },
}

impl SchemaError {
    /// Check if this error is a duplicate registration.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            SchemaError::DuplicateAttribute { .. } | SchemaError::DuplicateClass { .. }
        )
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}
