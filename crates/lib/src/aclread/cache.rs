//! Single-slot caches used while filtering.
//!
//! [`DescriptorCache`] lives as long as the module and is shared by every
//! search. [`ParentVisibilityCache`] lives inside one search context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::access::AccessDecision;
use crate::dn::Dn;
use crate::entry::Value;
use crate::security::{DescriptorDecoder, SecurityDescriptor, SecurityError};

/// Hit and miss counters of a [`DescriptorCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Remembers the most recently decoded descriptor blob.
///
/// A cached parse is only returned when the stored blob is byte-identical to
/// the one being resolved; every lookup re-validates. The slot holds its own
/// reference to the blob, so it never depends on the entry it came from.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    slot: Mutex<Option<(Value, Arc<SecurityDescriptor>)>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parsed form of `blob`, decoding it only when the slot holds a
    /// different blob.
    ///
    /// A decode failure leaves the slot as it was.
    pub fn resolve(
        &self,
        blob: &Value,
        decoder: &dyn DescriptorDecoder,
    ) -> Result<Arc<SecurityDescriptor>, SecurityError> {
        {
            let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some((cached, descriptor)) = slot.as_ref()
                && (cached.shares_buffer(blob) || cached.as_bytes() == blob.as_bytes())
            {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(len = blob.len(), "descriptor cache hit");
                return Ok(Arc::clone(descriptor));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let descriptor = Arc::new(decoder.decode(blob.as_bytes())?);
        trace!(len = blob.len(), "descriptor cache miss");

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some((blob.clone(), Arc::clone(&descriptor)));
        Ok(descriptor)
    }

    /// Drop the cached blob and descriptor.
    pub fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits(),
            misses: self.misses(),
        }
    }
}

/// Result of looking up an entry's parent in a [`ParentVisibilityCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentLookup {
    /// The parent was checked earlier in this search.
    Cached(AccessDecision),
    /// The parent must be checked and the outcome recorded.
    Uncached(Dn),
}

/// Remembers the last parent whose children were checked for visibility.
///
/// Only valid for one search by one principal against a stable view of the
/// backend.
#[derive(Debug, Clone, Default)]
pub struct ParentVisibilityCache {
    last: Option<(Dn, AccessDecision)>,
    hits: u64,
}

impl ParentVisibilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the parent of `dn`. Returns `None` when `dn` has no parent.
    pub fn lookup(&mut self, dn: &Dn) -> Option<ParentLookup> {
        if let Some((parent, decision)) = &self.last
            && dn.len() == parent.len() + 1
            && dn.is_descendant_of(parent)
        {
            self.hits += 1;
            return Some(ParentLookup::Cached(*decision));
        }
        dn.parent().map(ParentLookup::Uncached)
    }

    /// Remember the decision for `parent`.
    pub fn record(&mut self, parent: Dn, decision: AccessDecision) {
        self.last = Some((parent, decision));
    }

    /// Number of lookups answered from the slot.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}
