//! Request error types for the aclread library.

use thiserror::Error as ThisError;

use crate::Error;

/// Errors that can occur while building a search request.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum RequestError {
    /// The filter string is not well formed.
    #[error("Invalid filter {filter}: {reason}")]
    InvalidFilter {
        /// The rejected filter string
        filter: String,
        /// Where and why parsing failed
        reason: String,
    },

    /// The filter uses a construct this library does not evaluate.
    #[error("Unsupported filter {filter}: {reason}")]
    UnsupportedFilter {
        /// The rejected filter string
        filter: String,
        /// The unsupported construct
        reason: String,
    },
}

impl From<RequestError> for Error {
    fn from(err: RequestError) -> Self {
        Error::Request(err)
    }
}
