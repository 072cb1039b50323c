//! Read-filter error types for the aclread library.
//!
//! Access denial is never an error here: it becomes a suppressed entry, a
//! redacted attribute, or `NoSuchObject` for the search base. Every other
//! variant is fatal to the search that raised it.

use thiserror::Error as ThisError;

use crate::Error;
use crate::security::SecurityError;

/// Errors that can occur while filtering a search.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Field additions/changes require a major version bump
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum AclReadError {
    /// The search base does not exist or is not visible to the caller.
    #[error("No such object: {dn}")]
    NoSuchObject {
        /// The search base as the caller sent it
        dn: String,
    },

    /// Generic failure reported to the caller; details are only logged.
    #[error("Operations error")]
    Operations,

    /// A returned entry carries no security descriptor.
    #[error("Entry {dn} has no nTSecurityDescriptor")]
    MissingDescriptor {
        /// The offending entry
        dn: String,
    },

    /// A returned entry carries more than one security descriptor value.
    #[error("Entry {dn} has {count} nTSecurityDescriptor values")]
    MultiValuedDescriptor {
        /// The offending entry
        dn: String,
        /// Number of values found
        count: usize,
    },

    /// The descriptor blob could not be decoded.
    #[error("Entry {dn} has a malformed security descriptor")]
    MalformedDescriptor {
        /// The offending entry
        dn: String,
        /// The decoder failure
        #[source]
        source: SecurityError,
    },

    /// None of the entry's object classes is a known structural class.
    #[error("Entry {dn} has no structural object class")]
    NoStructuralClass {
        /// The offending entry
        dn: String,
    },

    /// A returned attribute is missing from the schema.
    #[error("Attribute {attribute} of {dn} is not in the schema")]
    UnknownAttribute {
        /// The offending entry
        dn: String,
        /// The attribute name as the backend returned it
        attribute: String,
    },

    /// A non-root entry has no parent DN.
    #[error("Entry {dn} has no parent")]
    NoParent {
        /// The offending entry
        dn: String,
    },

    /// The access checker failed instead of deciding.
    #[error("Access check failed on {dn}")]
    AccessCheck {
        /// The object being checked
        dn: String,
        /// The attribute being checked, if any
        attribute: Option<String>,
        /// The checker's error
        #[source]
        source: Box<Error>,
    },
}

impl AclReadError {
    /// Check if this error hides the search base from the caller.
    pub fn is_no_such_object(&self) -> bool {
        matches!(self, AclReadError::NoSuchObject { .. })
    }

    /// Check if this error aborts the search as an operational failure.
    pub fn is_operational(&self) -> bool {
        !self.is_no_such_object()
    }

    /// Check if this error was raised while resolving a security descriptor.
    pub fn is_descriptor_error(&self) -> bool {
        matches!(
            self,
            AclReadError::MissingDescriptor { .. }
                | AclReadError::MultiValuedDescriptor { .. }
                | AclReadError::MalformedDescriptor { .. }
        )
    }

    /// Check if this error was raised by a schema lookup.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            AclReadError::NoStructuralClass { .. } | AclReadError::UnknownAttribute { .. }
        )
    }
}

impl From<AclReadError> for Error {
    fn from(err: AclReadError) -> Self {
        Error::AclRead(err)
    }
}
