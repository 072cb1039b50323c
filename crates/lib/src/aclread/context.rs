//! Per-search state of the read filter.

use std::sync::Arc;

use super::cache::ParentVisibilityCache;
use crate::constants::{
    ALL_ATTRIBUTES, INSTANCE_TYPE, NT_SECURITY_DESCRIPTOR, OBJECT_CLASS, OBJECT_SID,
};
use crate::request::SearchRequest;
use crate::schema::Schema;
use crate::security::SecurityInformation;

/// Which bookkeeping attributes were added to the backend request.
///
/// Added attributes are always stripped from filtered entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyntheticAttributes {
    pub descriptor: bool,
    pub instance_type: bool,
    pub object_sid: bool,
    pub object_class: bool,
}

/// State owned by one filtered search.
///
/// Built from the caller's request, it records how the request was rewritten
/// for the backend and holds the search's parent visibility cache.
pub struct SearchContext {
    request: SearchRequest,
    schema: Arc<dyn Schema>,
    sd_flags: SecurityInformation,
    added: SyntheticAttributes,
    backend_attributes: Vec<String>,
    pub(crate) parent_cache: ParentVisibilityCache,
}

impl SearchContext {
    /// Plan the backend request for `request`.
    ///
    /// A finite attribute list gains `instanceType`, `objectSid` and
    /// `objectClass`. The descriptor is added unless the caller asked for it
    /// by name, or asked for everything with explicit SD flags, in which case
    /// the backend returns it anyway.
    pub fn new(request: SearchRequest, schema: Arc<dyn Schema>) -> Self {
        let all = request.wants_all_attributes();
        let (sd_flags, explicit_sd_flags) = request.sd_flags();

        let mut attributes = request.attributes.clone();
        if attributes.is_empty() {
            attributes.push(ALL_ATTRIBUTES.to_string());
        }

        let mut added = SyntheticAttributes::default();
        if !all {
            added.instance_type = ensure(INSTANCE_TYPE, &mut attributes);
            added.object_sid = ensure(OBJECT_SID, &mut attributes);
            added.object_class = ensure(OBJECT_CLASS, &mut attributes);
        }

        let need_descriptor =
            !request.requests_attribute(NT_SECURITY_DESCRIPTOR) && !(explicit_sd_flags && all);
        if need_descriptor {
            added.descriptor = ensure(NT_SECURITY_DESCRIPTOR, &mut attributes);
        }

        Self {
            request,
            schema,
            sd_flags,
            added,
            backend_attributes: attributes,
            parent_cache: ParentVisibilityCache::new(),
        }
    }

    /// The request to send to the backend: the caller's request with the
    /// augmented attribute list.
    pub fn backend_request(&self) -> SearchRequest {
        let mut request = self.request.clone();
        request.attributes = self.backend_attributes.clone();
        request
    }

    /// Returns true when `name` was added to the backend request by the filter.
    pub fn is_synthetic(&self, name: &str) -> bool {
        let added = &self.added;
        (added.descriptor && name.eq_ignore_ascii_case(NT_SECURITY_DESCRIPTOR))
            || (added.instance_type && name.eq_ignore_ascii_case(INSTANCE_TYPE))
            || (added.object_sid && name.eq_ignore_ascii_case(OBJECT_SID))
            || (added.object_class && name.eq_ignore_ascii_case(OBJECT_CLASS))
    }

    /// The caller's original request.
    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    pub fn schema(&self) -> &Arc<dyn Schema> {
        &self.schema
    }

    /// Normalized descriptor disclosure flags.
    pub fn sd_flags(&self) -> SecurityInformation {
        self.sd_flags
    }

    pub fn added(&self) -> SyntheticAttributes {
        self.added
    }

    /// Returns true for dirsync searches.
    pub fn dirsync(&self) -> bool {
        self.request.flags.dirsync
    }

    /// The attribute list sent to the backend.
    pub fn backend_attributes(&self) -> &[String] {
        &self.backend_attributes
    }

    pub fn parent_cache(&self) -> &ParentVisibilityCache {
        &self.parent_cache
    }
}

impl std::fmt::Debug for SearchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchContext")
            .field("base", &self.request.base)
            .field("sd_flags", &self.sd_flags)
            .field("added", &self.added)
            .field("backend_attributes", &self.backend_attributes)
            .field("parent_cache", &self.parent_cache)
            .finish_non_exhaustive()
    }
}

/// Append `name` unless already listed. Returns true when it was appended.
fn ensure(name: &str, attributes: &mut Vec<String>) -> bool {
    if attributes.iter().any(|a| a.eq_ignore_ascii_case(name)) {
        return false;
    }
    attributes.push(name.to_string());
    true
}
