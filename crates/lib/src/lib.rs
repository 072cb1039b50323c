//!
//! aclread: read-path authorization filtering for directory searches.
//!
//! This library sits between a directory client's search request and the backend
//! that resolves it, and makes sure the caller only sees what it is allowed to see.
//!
//! ## Core Concepts
//!
//! * **Distinguished names (`dn::Dn`)**: Hierarchical object names with case-insensitive comparison.
//! * **Entries (`entry::Entry`)**: An object's name plus its ordered attribute list, as streamed by a backend.
//! * **Backends (`backend::Backend`)**: The store that executes searches and streams back replies.
//! * **Security descriptors (`security::SecurityDescriptor`)**: Parsed access-control data attached to each object.
//! * **Access checks (`access::AccessChecker`)**: The external allow/deny primitive the filter consults.
//! * **The read filter (`aclread::AclRead`)**: Rewrites searches, pre-checks base visibility and
//!   redacts every streamed entry down to the attributes the principal may read.

pub mod access;
pub mod aclread;
pub mod backend;
pub mod config;
pub mod constants;
pub mod dn;
pub mod entry;
pub mod request;
pub mod schema;
pub mod security;

pub use aclread::{AclRead, FilteredSearch};
pub use config::AclReadConfig;
pub use dn::Dn;
pub use entry::Entry;

/// Result type used throughout the aclread library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the aclread library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured read-filter errors from the aclread module
    #[error(transparent)]
    AclRead(aclread::AclReadError),

    /// Structured backend errors from the backend module
    #[error(transparent)]
    Backend(backend::BackendError),

    /// Structured configuration errors from the config module
    #[error(transparent)]
    Config(config::ConfigError),

    /// Structured distinguished name errors from the dn module
    #[error(transparent)]
    Dn(dn::DnError),

    /// Structured request errors from the request module
    #[error(transparent)]
    Request(request::RequestError),

    /// Structured schema errors from the schema module
    #[error(transparent)]
    Schema(schema::SchemaError),

    /// Structured security errors from the security module
    #[error(transparent)]
    Security(security::SecurityError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::AclRead(_) => "aclread",
            Error::Backend(_) => "backend",
            Error::Config(_) => "config",
            Error::Dn(_) => "dn",
            Error::Request(_) => "request",
            Error::Schema(_) => "schema",
            Error::Security(_) => "security",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates the searched object does not exist or is not visible.
    ///
    /// The two cases are deliberately reported the same way.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::AclRead(err) => err.is_no_such_object(),
            Error::Backend(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is a generic operational failure of the search.
    pub fn is_operational(&self) -> bool {
        match self {
            Error::AclRead(err) => err.is_operational(),
            Error::Backend(err) => err.is_operational(),
            Error::Security(_) | Error::Schema(_) => true,
            _ => false,
        }
    }

    /// Check if this error is configuration-related.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Check if this error is caused by malformed caller input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::Dn(_) | Error::Request(_))
    }
}
