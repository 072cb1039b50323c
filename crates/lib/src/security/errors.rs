//! Security error types for the aclread library.

use thiserror::Error as ThisError;

use crate::Error;

/// Errors that can occur while handling security identifiers and descriptors.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum SecurityError {
    /// A security identifier could not be decoded.
    #[error("Malformed SID: {reason}")]
    MalformedSid {
        /// Description of the defect
        reason: String,
    },

    /// A security descriptor blob could not be decoded.
    #[error("Malformed security descriptor: {reason}")]
    MalformedDescriptor {
        /// Description of the defect
        reason: String,
    },
}

impl SecurityError {
    /// Check if this error concerns a descriptor blob.
    pub fn is_malformed_descriptor(&self) -> bool {
        matches!(self, SecurityError::MalformedDescriptor { .. })
    }
}

impl From<SecurityError> for Error {
    fn from(err: SecurityError) -> Self {
        Error::Security(err)
    }
}
