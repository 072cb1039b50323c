//! Backend boundary for directory searches.
//!
//! This module provides the [`Backend`] trait the read filter wraps, the
//! [`SearchReply`] protocol a search streams back, and an in-memory backend.
//!
//! A search yields a sequence of entry and referral replies terminated by
//! exactly one [`SearchReply::Done`]. Replies are pulled one at a time from a
//! [`ReplyStream`], which is either pre-buffered or fed by a producer task
//! through a channel.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;
use crate::entry::Entry;
use crate::request::{Control, SearchRequest};

pub mod errors;
pub mod in_memory;

pub use errors::BackendError;
pub use in_memory::InMemoryDirectory;

/// One event of a search's reply stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchReply {
    /// A matching object, with any controls the backend attached to it.
    Entry { entry: Entry, controls: Vec<Control> },
    /// A continuation reference to another server.
    Referral(String),
    /// End of the search, with the final response controls.
    Done { controls: Vec<Control> },
}

/// Sending half of a channel-backed [`ReplyStream`].
pub type ReplySender = mpsc::Sender<Result<SearchReply>>;

enum Source {
    Buffered(VecDeque<Result<SearchReply>>),
    Channel(mpsc::Receiver<Result<SearchReply>>),
}

/// The replies of one search, in backend order.
pub struct ReplyStream {
    source: Source,
}

impl ReplyStream {
    /// A stream over replies that are already known.
    pub fn from_replies(replies: impl IntoIterator<Item = SearchReply>) -> Self {
        Self::from_results(replies.into_iter().map(Ok))
    }

    /// A stream over already-known results, which may include errors.
    pub fn from_results(results: impl IntoIterator<Item = Result<SearchReply>>) -> Self {
        Self {
            source: Source::Buffered(results.into_iter().collect()),
        }
    }

    /// A stream fed by a producer holding the returned sender.
    ///
    /// Dropping the sender before a `Done` reply is a protocol violation the
    /// consumer reports as [`BackendError::StreamClosed`].
    pub fn channel(buffer: usize) -> (ReplySender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            tx,
            Self {
                source: Source::Channel(rx),
            },
        )
    }

    /// The next reply, or `None` once the stream is exhausted.
    pub async fn next(&mut self) -> Option<Result<SearchReply>> {
        match &mut self.source {
            Source::Buffered(queue) => queue.pop_front(),
            Source::Channel(rx) => rx.recv().await,
        }
    }

    /// Drain the stream into a [`SearchResult`].
    pub async fn collect(mut self) -> Result<SearchResult> {
        let mut result = SearchResult::default();
        while let Some(reply) = self.next().await {
            if result.push(reply?) {
                return Ok(result);
            }
        }
        Err(BackendError::StreamClosed.into())
    }
}

impl std::fmt::Debug for ReplyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Source::Buffered(queue) => write!(f, "ReplyStream::Buffered({} pending)", queue.len()),
            Source::Channel(_) => f.write_str("ReplyStream::Channel"),
        }
    }
}

/// A fully drained search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub entries: Vec<Entry>,
    pub referrals: Vec<String>,
    /// Controls from the `Done` reply.
    pub controls: Vec<Control>,
}

impl SearchResult {
    /// Accumulate one reply. Returns true when the reply was `Done`.
    pub fn push(&mut self, reply: SearchReply) -> bool {
        match reply {
            SearchReply::Entry { entry, .. } => self.entries.push(entry),
            SearchReply::Referral(url) => self.referrals.push(url),
            SearchReply::Done { controls } => {
                self.controls = controls;
                return true;
            }
        }
        false
    }
}

/// A store that executes searches.
///
/// Implementations must be `Send` and `Sync` so one instance can serve many
/// concurrent searches. The read filter relies on a backend presenting a
/// stable view of the data for the full duration of one search.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Start a search.
    ///
    /// # Returns
    /// The reply stream, or an error when the search cannot start at all
    /// (for example [`BackendError::NoSuchObject`] for a missing base).
    async fn search(&self, request: SearchRequest) -> Result<ReplyStream>;
}
