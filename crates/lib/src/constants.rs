//! Constants used throughout the aclread library.
//!
//! Attribute names the read filter depends on, and well-known bit values
//! from the directory schema.

/// Attribute carrying the binary security descriptor of an object.
pub const NT_SECURITY_DESCRIPTOR: &str = "nTSecurityDescriptor";

/// Attribute carrying the instance type bits of an object.
pub const INSTANCE_TYPE: &str = "instanceType";

/// Attribute carrying the binary security identifier of an object.
pub const OBJECT_SID: &str = "objectSid";

/// Attribute listing every object class of an object.
pub const OBJECT_CLASS: &str = "objectClass";

/// Replication metadata consumed by directory synchronization.
pub const REPL_PROPERTY_META_DATA: &str = "replPropertyMetaData";

/// Wildcard selecting all user attributes in a search.
pub const ALL_ATTRIBUTES: &str = "*";

/// `instanceType` bit marking the head of a naming context.
pub const INSTANCE_TYPE_IS_NC_HEAD: u32 = 0x0000_0001;

/// `searchFlags` bit marking an attribute as confidential.
pub const SEARCH_FLAG_CONFIDENTIAL: u32 = 0x0000_0080;
