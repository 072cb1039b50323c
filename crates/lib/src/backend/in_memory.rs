//! In-memory directory backend.
//!
//! This module provides an in-memory implementation of the Backend trait,
//! suitable for testing, development, or embedding small directories.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tracing::trace;

use super::{Backend, BackendError, ReplyStream, SearchReply};
use crate::Result;
use crate::constants::NT_SECURITY_DESCRIPTOR;
use crate::dn::Dn;
use crate::entry::Entry;
use crate::request::{Scope, SearchRequest};

/// A directory held in memory.
///
/// Entries are returned in insertion order. A search applies scope, filter
/// and attribute selection the way a directory does, including hiding
/// `nTSecurityDescriptor` from "all attributes" searches unless the caller
/// sent explicit SD flags. The whole search runs under one read lock, so a
/// search always sees a consistent view.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    entries: RwLock<Vec<Entry>>,
    referrals: RwLock<Vec<String>>,
    searches: AtomicUsize,
}

impl InMemoryDirectory {
    /// Creates a new, empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any entry with the same DN in place.
    pub fn insert(&self, entry: Entry) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter_mut().find(|e| e.dn() == entry.dn()) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    /// Remove the entry named `dn`.
    pub fn remove(&self, dn: &Dn) -> Option<Entry> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let index = entries.iter().position(|e| e.dn() == dn)?;
        Some(entries.remove(index))
    }

    /// A copy of the entry named `dn`.
    pub fn get(&self, dn: &Dn) -> Option<Entry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().find(|e| e.dn() == dn).cloned()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a referral URL returned after the entries of every search.
    pub fn add_referral(&self, url: impl Into<String>) {
        self.referrals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.into());
    }

    /// Number of searches executed so far.
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }
}

fn in_scope(dn: &Dn, base: &Dn, scope: Scope) -> bool {
    match scope {
        Scope::Base => dn == base,
        Scope::OneLevel => dn.parent().is_some_and(|p| &p == base),
        Scope::Subtree => dn.is_descendant_of(base),
    }
}

fn project(entry: &Entry, request: &SearchRequest) -> Entry {
    let all = request.wants_all_attributes();
    let (_, explicit_sd_flags) = request.sd_flags();
    let attributes = entry
        .attributes()
        .iter()
        .filter(|a| {
            if a.is_named(NT_SECURITY_DESCRIPTOR) {
                request.requests_attribute(NT_SECURITY_DESCRIPTOR) || (all && explicit_sd_flags)
            } else {
                all || request.requests_attribute(a.name())
            }
        })
        .cloned()
        .collect();
    Entry::from_parts(entry.dn().clone(), attributes)
}

#[async_trait]
impl Backend for InMemoryDirectory {
    async fn search(&self, request: SearchRequest) -> Result<ReplyStream> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        if !request.base.is_null() && !entries.iter().any(|e| e.dn() == &request.base) {
            return Err(BackendError::NoSuchObject {
                dn: request.base.to_string(),
            }
            .into());
        }

        let mut replies: Vec<SearchReply> = entries
            .iter()
            .filter(|e| in_scope(e.dn(), &request.base, request.scope))
            .filter(|e| request.filter.matches(e))
            .map(|e| SearchReply::Entry {
                entry: project(e, &request),
                controls: Vec::new(),
            })
            .collect();
        drop(entries);

        trace!(
            base = %request.base,
            matched = replies.len(),
            "in-memory search complete"
        );

        let referrals = self.referrals.read().unwrap_or_else(PoisonError::into_inner);
        replies.extend(referrals.iter().cloned().map(SearchReply::Referral));
        replies.push(SearchReply::Done {
            controls: Vec::new(),
        });
        Ok(ReplyStream::from_replies(replies))
    }
}
