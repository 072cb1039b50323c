//! Backend error types for the aclread library.
//!
//! This module defines structured error types for search execution,
//! providing better error context and type safety compared to string-based errors.

use thiserror::Error;

/// Errors that can occur while a backend executes a search.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Field additions/changes require a major version bump
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// The search base does not exist.
    #[error("No such object: {dn}")]
    NoSuchObject {
        /// The missing distinguished name
        dn: String,
    },

    /// The reply stream ended without a final `Done` reply.
    #[error("Reply stream closed before the search completed")]
    StreamClosed,

    /// The backend could not serve the request.
    #[error("Backend unavailable: {reason}")]
    Unavailable {
        /// Description of the failure
        reason: String,
    },
}

impl BackendError {
    /// Check if this error indicates a missing object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NoSuchObject { .. })
    }

    /// Check if this error is an operational failure.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            BackendError::StreamClosed | BackendError::Unavailable { .. }
        )
    }
}

impl From<BackendError> for crate::Error {
    fn from(err: BackendError) -> Self {
        crate::Error::Backend(err)
    }
}
