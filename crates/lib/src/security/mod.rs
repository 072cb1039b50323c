//! Security identifiers, access rights and security descriptors.
//!
//! The binary descriptor format is not decoded here: callers plug in a
//! [`DescriptorDecoder`].

pub mod descriptor;
pub mod errors;
pub mod sid;

pub use descriptor::{
    AccessMask, Ace, AceType, Acl, DescriptorDecoder, SecurityDescriptor, SecurityInformation,
};
pub use errors::SecurityError;
pub use sid::Sid;
