//! Access-decision boundary.
//!
//! The read filter never evaluates ACEs itself. It asks an [`AccessChecker`]
//! whether a principal holds a set of rights, either on one attribute of an
//! already-loaded object or on an object named by DN.

use async_trait::async_trait;

use crate::Result;
use crate::dn::Dn;
use crate::request::Principal;
use crate::schema::{AttributeDefinition, ClassDefinition};
use crate::security::{AccessMask, SecurityDescriptor, Sid};

/// Outcome of an access check that ran to completion.
///
/// Failures to evaluate are reported as errors, never as `Denied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessDecision {
    Granted,
    Denied,
}

impl AccessDecision {
    pub fn is_granted(self) -> bool {
        matches!(self, AccessDecision::Granted)
    }
}

/// Everything needed to decide whether one attribute of one object may be read.
#[derive(Debug, Clone, Copy)]
pub struct AttributeAccess<'a> {
    pub principal: &'a Principal,
    pub descriptor: &'a SecurityDescriptor,
    /// The object's own SID, substituted for the principal-self trustee.
    pub object_sid: Option<&'a Sid>,
    pub access: AccessMask,
    pub attribute: &'a AttributeDefinition,
    /// The object's most specific structural class.
    pub class: &'a ClassDefinition,
}

/// Evaluates access rights for a principal.
///
/// Implementations must be `Send` and `Sync`; one checker serves every
/// concurrent search of a module.
#[async_trait]
pub trait AccessChecker: Send + Sync {
    /// Check `access.access` on one attribute against an in-hand descriptor.
    fn check_attribute(&self, access: AttributeAccess<'_>) -> Result<AccessDecision>;

    /// Check `access` on the object named `dn`, loading its descriptor as needed.
    ///
    /// # Errors
    /// Any failure other than a plain denial, including a missing object.
    async fn check_dn(
        &self,
        principal: &Principal,
        dn: &Dn,
        access: AccessMask,
    ) -> Result<AccessDecision>;
}
