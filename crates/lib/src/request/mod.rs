//! Search requests as they reach the read filter.

pub mod errors;
pub mod filter;

use std::sync::Arc;

use crate::constants::ALL_ATTRIBUTES;
use crate::dn::Dn;
use crate::entry::Value;
use crate::security::{SecurityInformation, Sid};

pub use errors::RequestError;
pub use filter::Filter;

/// OID of the control asking the directory to run a request as the system.
pub const AS_SYSTEM_OID: &str = "1.3.6.1.4.1.7165.4.3.7";

/// OID of the control selecting which descriptor parts to return.
pub const SD_FLAGS_OID: &str = "1.2.840.113556.1.4.801";

/// How far below the base a search reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The base object only.
    Base,
    /// Direct children of the base.
    OneLevel,
    /// The base and everything below it.
    Subtree,
}

/// A request or reply control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Run the request with system privileges, skipping read filtering.
    AsSystem,
    /// Security descriptor disclosure flags.
    SdFlags { flags: u32 },
    /// Any other control; passed through untouched.
    Other {
        oid: String,
        critical: bool,
        value: Option<Value>,
    },
}

impl Control {
    /// The control's OID.
    pub fn oid(&self) -> &str {
        match self {
            Control::AsSystem => AS_SYSTEM_OID,
            Control::SdFlags { .. } => SD_FLAGS_OID,
            Control::Other { oid, .. } => oid,
        }
    }
}

/// Properties of the request that are not LDAP controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestFlags {
    /// The request arrived from an external client. Only these are filtered.
    pub untrusted: bool,
    /// The request is answering a directory synchronization (dirsync) query.
    pub dirsync: bool,
}

/// The identity a request runs as.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Principal {
    /// The user's SID; `None` for anonymous sessions.
    pub sid: Option<Sid>,
    /// Group memberships, already expanded.
    pub groups: Vec<Sid>,
    system: bool,
}

impl Principal {
    /// The directory's own system identity.
    pub fn system() -> Self {
        Self {
            sid: None,
            groups: Vec::new(),
            system: true,
        }
    }

    /// An unauthenticated session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated user with its groups.
    pub fn user(sid: Sid, groups: Vec<Sid>) -> Self {
        Self {
            sid: Some(sid),
            groups,
            system: false,
        }
    }

    /// Returns true for the system identity.
    pub fn is_system(&self) -> bool {
        self.system
    }

    /// The user SID followed by all group SIDs.
    pub fn token(&self) -> impl Iterator<Item = &Sid> {
        self.sid.iter().chain(self.groups.iter())
    }
}

/// A search operation.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub base: Dn,
    pub scope: Scope,
    pub filter: Filter,
    /// Requested attributes. Empty, or containing `*`, means all attributes.
    pub attributes: Vec<String>,
    pub controls: Vec<Control>,
    pub flags: RequestFlags,
    pub principal: Arc<Principal>,
}

impl SearchRequest {
    /// A trusted, anonymous request for all attributes.
    pub fn new(base: Dn, scope: Scope, filter: Filter) -> Self {
        Self {
            base,
            scope,
            filter,
            attributes: Vec::new(),
            controls: Vec::new(),
            flags: RequestFlags::default(),
            principal: Arc::new(Principal::anonymous()),
        }
    }

    /// Builder-style setter for the requested attributes.
    pub fn with_attributes<S: Into<String>>(mut self, attributes: impl IntoIterator<Item = S>) -> Self {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style setter appending a control.
    pub fn with_control(mut self, control: Control) -> Self {
        self.controls.push(control);
        self
    }

    /// Builder-style setter for the requesting identity.
    pub fn with_principal(mut self, principal: Arc<Principal>) -> Self {
        self.principal = principal;
        self
    }

    /// Mark the request as coming from an external client.
    pub fn untrusted(mut self) -> Self {
        self.flags.untrusted = true;
        self
    }

    /// Mark the request as part of a dirsync query.
    pub fn dirsync(mut self) -> Self {
        self.flags.dirsync = true;
        self
    }

    /// Returns true when the caller asked for every attribute.
    pub fn wants_all_attributes(&self) -> bool {
        self.attributes.is_empty() || self.attributes.iter().any(|a| a == ALL_ATTRIBUTES)
    }

    /// Case-insensitive membership test on the requested attribute list.
    pub fn requests_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// Returns true when a control with `oid` is attached.
    pub fn has_control(&self, oid: &str) -> bool {
        self.controls.iter().any(|c| c.oid() == oid)
    }

    /// Disclosure flags for the descriptor, and whether the caller set them
    /// explicitly through the SD-flags control.
    pub fn sd_flags(&self) -> (SecurityInformation, bool) {
        self.controls
            .iter()
            .find_map(|c| match c {
                Control::SdFlags { flags } => Some((SecurityInformation::from_bits(*flags), true)),
                _ => None,
            })
            .unwrap_or((SecurityInformation::ALL, false))
    }
}
