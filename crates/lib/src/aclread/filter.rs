//! Per-entry attribute filtering.
//!
//! [`EntryFilter::filter`] turns one backend entry into zero or one entries
//! for the caller. It never mutates the input in place: it decides which
//! attributes to keep, then rebuilds the entry from the kept ones in their
//! original order.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::cache::{DescriptorCache, ParentLookup};
use super::context::SearchContext;
use super::errors::AclReadError;
use crate::Result;
use crate::access::{AccessChecker, AccessDecision, AttributeAccess};
use crate::constants::{INSTANCE_TYPE_IS_NC_HEAD, NT_SECURITY_DESCRIPTOR, REPL_PROPERTY_META_DATA};
use crate::entry::Entry;
use crate::security::{AccessMask, DescriptorDecoder, SecurityDescriptor};

/// Why an entry was withheld from the caller entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suppression {
    /// The caller may not list the children of the entry's parent.
    ParentNotVisible,
    /// An attribute used in the search filter is not readable, so returning
    /// the entry would reveal its value.
    FilterAttributeHidden { attribute: String },
}

/// Result of filtering one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// The entry, reduced to its readable attributes. May have none left.
    Emit(Entry),
    Suppressed(Suppression),
}

impl FilterOutcome {
    /// The emitted entry, if any.
    pub fn into_entry(self) -> Option<Entry> {
        match self {
            FilterOutcome::Emit(entry) => Some(entry),
            FilterOutcome::Suppressed(_) => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, FilterOutcome::Suppressed(_))
    }
}

/// Redacts entries to what a principal may read.
///
/// Cloning is cheap and every clone shares one [`DescriptorCache`].
#[derive(Clone)]
pub struct EntryFilter {
    descriptors: Arc<DescriptorCache>,
    decoder: Arc<dyn DescriptorDecoder>,
    checker: Arc<dyn AccessChecker>,
}

impl EntryFilter {
    pub fn new(decoder: Arc<dyn DescriptorDecoder>, checker: Arc<dyn AccessChecker>) -> Self {
        Self {
            descriptors: Arc::new(DescriptorCache::new()),
            decoder,
            checker,
        }
    }

    /// The descriptor cache shared by all clones of this filter.
    pub fn descriptor_cache(&self) -> &Arc<DescriptorCache> {
        &self.descriptors
    }

    pub fn checker(&self) -> &Arc<dyn AccessChecker> {
        &self.checker
    }

    /// Filter one entry returned by the backend for `ctx`'s search.
    ///
    /// The rights checked for `nTSecurityDescriptor` come only from the
    /// disclosure flags; a confidential search flag on it in the schema adds
    /// no `CONTROL_ACCESS` requirement.
    ///
    /// # Errors
    /// Missing, multi-valued or undecodable descriptors, schema misses and
    /// access checker failures. Each of them is fatal to the search.
    pub async fn filter(&self, ctx: &mut SearchContext, entry: Entry) -> Result<FilterOutcome> {
        let descriptor = self.descriptor(&entry)?;

        let schema = Arc::clone(ctx.schema());
        let class = schema
            .structural_class(&entry.object_classes())
            .ok_or_else(|| AclReadError::NoStructuralClass {
                dn: entry.dn().to_string(),
            })?;

        let object_sid = entry.object_sid();

        if !entry.dn().is_null() && entry.instance_type() & INSTANCE_TYPE_IS_NC_HEAD == 0 {
            let decision = self.parent_visibility(ctx, &entry).await?;
            if !decision.is_granted() {
                debug!(dn = %entry.dn(), "parent not visible, suppressing entry");
                return Ok(FilterOutcome::Suppressed(Suppression::ParentNotVisible));
            }
        }

        let principal = Arc::clone(&ctx.request().principal);
        let sd_flags = ctx.sd_flags();
        let attributes = entry.attributes();
        let mut keep = vec![true; attributes.len()];
        let mut stopped_at = None;

        for (index, attribute) in attributes.iter().enumerate() {
            let name = attribute.name();
            if ctx.is_synthetic(name) {
                keep[index] = false;
                continue;
            }

            let definition =
                schema
                    .attribute_by_name(name)
                    .ok_or_else(|| AclReadError::UnknownAttribute {
                        dn: entry.dn().to_string(),
                        attribute: name.to_string(),
                    })?;

            let access = if attribute.is_named(NT_SECURITY_DESCRIPTOR) {
                sd_flags.required_access()
            } else if definition.is_confidential() {
                AccessMask::READ_PROP | AccessMask::CONTROL_ACCESS
            } else {
                AccessMask::READ_PROP
            };
            if access.is_empty() {
                keep[index] = false;
                continue;
            }

            let decision = self
                .checker
                .check_attribute(AttributeAccess {
                    principal: &principal,
                    descriptor: &descriptor,
                    object_sid: object_sid.as_ref(),
                    access,
                    attribute: definition,
                    class,
                })
                .map_err(|e| AclReadError::AccessCheck {
                    dn: entry.dn().to_string(),
                    attribute: Some(name.to_string()),
                    source: Box::new(e),
                })?;
            trace!(dn = %entry.dn(), attribute = name, %access, ?decision, "attribute access");

            if decision.is_granted() {
                continue;
            }
            keep[index] = false;

            if ctx.request().filter.references(name) {
                if !ctx.dirsync() {
                    warn!(
                        dn = %entry.dn(),
                        attribute = name,
                        "filter attribute not readable, suppressing entry"
                    );
                    return Ok(FilterOutcome::Suppressed(
                        Suppression::FilterAttributeHidden {
                            attribute: name.to_string(),
                        },
                    ));
                }
                debug!(
                    dn = %entry.dn(),
                    attribute = name,
                    "filter attribute not readable in dirsync, dropping replication metadata"
                );
                stopped_at = Some(index);
                break;
            }
        }

        if let Some(stop) = stopped_at {
            for (index, attribute) in attributes.iter().enumerate() {
                if attribute.is_named(REPL_PROPERTY_META_DATA)
                    || (index > stop && ctx.is_synthetic(attribute.name()))
                {
                    keep[index] = false;
                }
            }
        }

        let (dn, attributes) = entry.into_parts();
        let kept = attributes
            .into_iter()
            .zip(keep)
            .filter_map(|(attribute, keep)| keep.then_some(attribute))
            .collect();
        Ok(FilterOutcome::Emit(Entry::from_parts(dn, kept)))
    }

    fn descriptor(&self, entry: &Entry) -> Result<Arc<SecurityDescriptor>> {
        let attribute =
            entry
                .attribute(NT_SECURITY_DESCRIPTOR)
                .ok_or_else(|| AclReadError::MissingDescriptor {
                    dn: entry.dn().to_string(),
                })?;
        let [blob] = attribute.values() else {
            return Err(AclReadError::MultiValuedDescriptor {
                dn: entry.dn().to_string(),
                count: attribute.values().len(),
            }
            .into());
        };
        self.descriptors
            .resolve(blob, self.decoder.as_ref())
            .map_err(|source| {
                AclReadError::MalformedDescriptor {
                    dn: entry.dn().to_string(),
                    source,
                }
                .into()
            })
    }

    async fn parent_visibility(
        &self,
        ctx: &mut SearchContext,
        entry: &Entry,
    ) -> Result<AccessDecision> {
        let parent = match ctx.parent_cache.lookup(entry.dn()) {
            Some(ParentLookup::Cached(decision)) => {
                trace!(dn = %entry.dn(), ?decision, "parent visibility cache hit");
                return Ok(decision);
            }
            Some(ParentLookup::Uncached(parent)) => parent,
            None => {
                return Err(AclReadError::NoParent {
                    dn: entry.dn().to_string(),
                }
                .into());
            }
        };

        let principal = Arc::clone(&ctx.request().principal);
        let decision = self
            .checker
            .check_dn(&principal, &parent, AccessMask::LIST)
            .await
            .map_err(|e| AclReadError::AccessCheck {
                dn: parent.to_string(),
                attribute: None,
                source: Box::new(e),
            })?;
        ctx.parent_cache.record(parent, decision);
        Ok(decision)
    }
}

impl std::fmt::Debug for EntryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryFilter")
            .field("descriptors", &self.descriptors)
            .finish_non_exhaustive()
    }
}
