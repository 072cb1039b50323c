//! Parsed security descriptors and the rights they govern.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::SecurityError;
use super::sid::Sid;

/// A set of access rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessMask(u32);

impl AccessMask {
    /// No rights.
    pub const NONE: Self = Self(0);
    /// List the children of an object.
    pub const LIST: Self = Self(0x0000_0004);
    /// Read an attribute.
    pub const READ_PROP: Self = Self(0x0000_0010);
    /// Extended right, also gating confidential attributes.
    pub const CONTROL_ACCESS: Self = Self(0x0000_0100);
    /// Read the owner, group and DACL of a descriptor.
    pub const READ_CONTROL: Self = Self(0x0002_0000);
    /// Read or write the SACL of a descriptor.
    pub const SYSTEM_SECURITY: Self = Self(0x0100_0000);

    /// Wrap raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true when no right is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true when every right in `other` is also in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AccessMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AccessMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for AccessMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for AccessMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Which parts of a security descriptor a caller asks to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityInformation(u32);

impl SecurityInformation {
    /// The owner SID.
    pub const OWNER: Self = Self(0x1);
    /// The primary group SID.
    pub const GROUP: Self = Self(0x2);
    /// The discretionary ACL.
    pub const DACL: Self = Self(0x4);
    /// The system ACL.
    pub const SACL: Self = Self(0x8);
    /// All four parts.
    pub const ALL: Self = Self(0xf);

    /// Normalize raw control bits: only the four low bits count, and no bits
    /// at all means every part.
    pub const fn from_bits(bits: u32) -> Self {
        let bits = bits & Self::ALL.0;
        if bits == 0 { Self::ALL } else { Self(bits) }
    }

    /// The raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true when any part in `other` is requested.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// The rights needed to disclose the requested parts.
    ///
    /// Owner, group and DACL need `READ_CONTROL`; the SACL needs
    /// `SYSTEM_SECURITY`.
    pub fn required_access(self) -> AccessMask {
        let mut mask = AccessMask::NONE;
        if self.intersects(Self(Self::OWNER.0 | Self::GROUP.0)) {
            mask |= AccessMask::READ_CONTROL;
        }
        if self.intersects(Self::DACL) {
            mask |= AccessMask::READ_CONTROL;
        }
        if self.intersects(Self::SACL) {
            mask |= AccessMask::SYSTEM_SECURITY;
        }
        mask
    }
}

impl Default for SecurityInformation {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for SecurityInformation {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Kind of an access control entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AceType {
    AccessAllowed,
    AccessDenied,
    SystemAudit,
    AccessAllowedObject,
    AccessDeniedObject,
    SystemAuditObject,
}

impl AceType {
    /// Returns true for object ACEs that may carry an object type GUID.
    pub fn is_object(self) -> bool {
        matches!(
            self,
            AceType::AccessAllowedObject | AceType::AccessDeniedObject | AceType::SystemAuditObject
        )
    }
}

/// One access control entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ace {
    pub ace_type: AceType,
    #[serde(default)]
    pub flags: u8,
    pub mask: AccessMask,
    pub trustee: Sid,
    /// Attribute, property set or extended right the ACE is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<Uuid>,
    /// Class of child objects that inherit the ACE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_object_type: Option<Uuid>,
}

/// An access control list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Acl {
    #[serde(default = "default_acl_revision")]
    pub revision: u8,
    #[serde(default)]
    pub aces: Vec<Ace>,
}

fn default_acl_revision() -> u8 {
    4
}

/// A parsed security descriptor. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityDescriptor {
    #[serde(default = "default_sd_revision")]
    pub revision: u8,
    #[serde(default)]
    pub control: u16,
    #[serde(default)]
    pub owner: Option<Sid>,
    #[serde(default)]
    pub group: Option<Sid>,
    #[serde(default)]
    pub dacl: Option<Acl>,
    #[serde(default)]
    pub sacl: Option<Acl>,
}

fn default_sd_revision() -> u8 {
    1
}

/// Turns a raw `nTSecurityDescriptor` value into a [`SecurityDescriptor`].
///
/// Decoding is the most expensive step of filtering an entry, which is why
/// the filter puts a [`DescriptorCache`](crate::aclread::DescriptorCache)
/// in front of it.
pub trait DescriptorDecoder: Send + Sync {
    /// Decode one blob. A failure must not have side effects.
    fn decode(&self, blob: &[u8]) -> Result<SecurityDescriptor, SecurityError>;
}
