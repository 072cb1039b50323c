//! The read filter.
//!
//! [`AclRead`] wraps a [`Backend`] and enforces read access on the searches
//! it forwards. For every filtered search it:
//!
//! 1. Hides the search base unless the caller may list the base's parent.
//! 2. Adds the bookkeeping attributes the filter depends on to the request.
//! 3. Runs every returned entry through an [`EntryFilter`], which redacts
//!    unreadable attributes or withholds the entry entirely.
//!
//! Replies are relayed in backend order through a [`FilteredSearch`].
//! Referrals and the final `Done` reply pass through untouched.

pub mod cache;
pub mod context;
pub mod errors;
pub mod filter;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Instrument, Span, debug, error, info_span};

use crate::Result;
use crate::access::{AccessChecker, AccessDecision};
use crate::backend::{Backend, BackendError, ReplyStream, SearchReply, SearchResult};
use crate::config::AclReadConfig;
use crate::constants::{INSTANCE_TYPE, INSTANCE_TYPE_IS_NC_HEAD, OBJECT_CLASS};
use crate::request::{AS_SYSTEM_OID, Filter, Principal, Scope, SearchRequest};
use crate::schema::Schema;
use crate::security::{AccessMask, DescriptorDecoder};

pub use cache::{CacheStats, DescriptorCache, ParentLookup, ParentVisibilityCache};
pub use context::{SearchContext, SyntheticAttributes};
pub use errors::AclReadError;
pub use filter::{EntryFilter, FilterOutcome, Suppression};

/// Replies buffered between the filtering task and the consumer of
/// [`FilteredSearch::into_stream`].
const REPLY_BUFFER: usize = 64;

/// The read filter module.
///
/// One instance serves any number of concurrent searches; share it through
/// an `Arc`. The configuration is fixed at construction.
pub struct AclRead {
    config: AclReadConfig,
    backend: Arc<dyn Backend>,
    schema: Arc<dyn Schema>,
    filter: EntryFilter,
}

impl AclRead {
    pub fn new(
        config: AclReadConfig,
        backend: Arc<dyn Backend>,
        schema: Arc<dyn Schema>,
        decoder: Arc<dyn DescriptorDecoder>,
        checker: Arc<dyn AccessChecker>,
    ) -> Self {
        debug!(enabled = config.enabled, "acl_read module initialised");
        Self {
            config,
            backend,
            schema,
            filter: EntryFilter::new(decoder, checker),
        }
    }

    pub fn config(&self) -> &AclReadConfig {
        &self.config
    }

    /// The module-wide descriptor cache.
    pub fn descriptor_cache(&self) -> &Arc<DescriptorCache> {
        self.filter.descriptor_cache()
    }

    pub fn entry_filter(&self) -> &EntryFilter {
        &self.filter
    }

    /// Start a search, filtering its results when the request calls for it.
    ///
    /// # Errors
    /// [`AclReadError::NoSuchObject`] when the base is missing or hidden,
    /// [`AclReadError::Operations`] when the base check fails, and any error
    /// the backend returns when starting the search.
    pub async fn search(&self, request: SearchRequest) -> Result<FilteredSearch> {
        let span = info_span!("acl_read_search", base = %request.base, scope = ?request.scope);
        async move {
            if let Some(reason) = self.bypass_reason(&request) {
                debug!(reason, "search not filtered");
                let stream = self.backend.search(request).await?;
                return Ok(FilteredSearch::passthrough(stream, Span::current()));
            }

            self.check_base(&request).await?;

            let ctx = SearchContext::new(request, Arc::clone(&self.schema));
            debug!(attributes = ?ctx.backend_attributes(), "forwarding filtered search");
            let stream = self.backend.search(ctx.backend_request()).await?;
            Ok(FilteredSearch::filtered(
                stream,
                ctx,
                self.filter.clone(),
                Span::current(),
            ))
        }
        .instrument(span)
        .await
    }

    fn bypass_reason(&self, request: &SearchRequest) -> Option<&'static str> {
        if !self.config.enabled {
            Some("filtering disabled")
        } else if request.principal.is_system() {
            Some("system principal")
        } else if request.has_control(AS_SYSTEM_OID) {
            Some("as-system control")
        } else if !request.flags.untrusted {
            Some("trusted caller")
        } else if request.base.is_special() {
            Some("special base")
        } else {
            None
        }
    }

    /// Fail with `NoSuchObject` unless the caller may see the search base.
    ///
    /// Only bases inside a naming context are checked, by asking for the
    /// right to list the parent's children.
    async fn check_base(&self, request: &SearchRequest) -> Result<()> {
        if request.base.is_null() {
            return Ok(());
        }
        let no_such_object = || -> crate::Error {
            AclReadError::NoSuchObject {
                dn: request.base.to_string(),
            }
            .into()
        };

        let lookup = SearchRequest::new(
            request.base.clone(),
            Scope::Base,
            Filter::present(OBJECT_CLASS),
        )
        .with_attributes([INSTANCE_TYPE])
        .with_principal(Arc::new(Principal::system()));

        let found = match self.backend.search(lookup).await {
            Ok(stream) => stream.collect().await,
            Err(e) => Err(e),
        };
        let base = match found {
            Ok(SearchResult { entries, .. }) => match entries.into_iter().next() {
                Some(entry) => entry,
                None => return Err(no_such_object()),
            },
            Err(e) if e.is_not_found() => return Err(no_such_object()),
            Err(e) => {
                error!(error = %e, "failed to look up search base");
                return Err(AclReadError::Operations.into());
            }
        };

        let instance_type = base.instance_type();
        if instance_type == 0 || instance_type & INSTANCE_TYPE_IS_NC_HEAD != 0 {
            return Ok(());
        }
        let Some(parent) = request.base.parent() else {
            return Ok(());
        };

        match self
            .filter
            .checker()
            .check_dn(&request.principal, &parent, AccessMask::LIST)
            .await
        {
            Ok(AccessDecision::Granted) => Ok(()),
            Ok(AccessDecision::Denied) => {
                debug!(parent = %parent, "search base hidden by its parent");
                Err(no_such_object())
            }
            Err(e) if e.is_not_found() => Err(no_such_object()),
            Err(e) => {
                error!(parent = %parent, error = %e, "access check on search base failed");
                Err(AclReadError::Operations.into())
            }
        }
    }
}

impl std::fmt::Debug for AclRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclRead")
            .field("config", &self.config)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for AclRead {
    async fn search(&self, request: SearchRequest) -> Result<ReplyStream> {
        Ok(AclRead::search(self, request).await?.into_stream())
    }
}

struct Filtering {
    ctx: SearchContext,
    filter: EntryFilter,
}

/// The reply stream of one search as the caller sees it.
///
/// Yields replies in backend order, skipping withheld entries. After an
/// error it yields nothing more.
pub struct FilteredSearch {
    stream: ReplyStream,
    filtering: Option<Filtering>,
    span: Span,
    finished: bool,
    suppressed: usize,
}

impl FilteredSearch {
    fn passthrough(stream: ReplyStream, span: Span) -> Self {
        Self {
            stream,
            filtering: None,
            span,
            finished: false,
            suppressed: 0,
        }
    }

    fn filtered(stream: ReplyStream, ctx: SearchContext, filter: EntryFilter, span: Span) -> Self {
        Self {
            stream,
            filtering: Some(Filtering { ctx, filter }),
            span,
            finished: false,
            suppressed: 0,
        }
    }

    /// Returns true when entries are being filtered.
    pub fn is_filtered(&self) -> bool {
        self.filtering.is_some()
    }

    /// Number of entries withheld so far.
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    /// The search context, for filtered searches.
    pub fn context(&self) -> Option<&SearchContext> {
        self.filtering.as_ref().map(|f| &f.ctx)
    }

    /// The next reply for the caller, or `None` once the search is over.
    pub async fn next(&mut self) -> Option<Result<SearchReply>> {
        if self.finished {
            return None;
        }
        let span = self.span.clone();
        self.advance().instrument(span).await
    }

    async fn advance(&mut self) -> Option<Result<SearchReply>> {
        loop {
            let reply = match self.stream.next().await {
                Some(Ok(reply)) => reply,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    return Some(Err(BackendError::StreamClosed.into()));
                }
            };

            let (entry, controls) = match (reply, self.filtering.as_mut()) {
                (SearchReply::Entry { entry, controls }, Some(filtering)) => {
                    match filtering.filter.filter(&mut filtering.ctx, entry).await {
                        Ok(FilterOutcome::Emit(entry)) => (entry, controls),
                        Ok(FilterOutcome::Suppressed(reason)) => {
                            debug!(?reason, "entry withheld");
                            self.suppressed += 1;
                            continue;
                        }
                        Err(e) => {
                            error!(error = %e, "aborting filtered search");
                            self.finished = true;
                            return Some(Err(AclReadError::Operations.into()));
                        }
                    }
                }
                (reply @ SearchReply::Done { .. }, _) => {
                    self.finished = true;
                    return Some(Ok(reply));
                }
                (reply, _) => return Some(Ok(reply)),
            };
            return Some(Ok(SearchReply::Entry { entry, controls }));
        }
    }

    /// Drain the search into a [`SearchResult`].
    pub async fn collect(mut self) -> Result<SearchResult> {
        let mut result = SearchResult::default();
        while let Some(reply) = self.next().await {
            if result.push(reply?) {
                return Ok(result);
            }
        }
        Err(BackendError::StreamClosed.into())
    }

    /// Move filtering onto a task and return the replies as a [`ReplyStream`].
    ///
    /// Must be called from within a tokio runtime. The task stops early when
    /// the returned stream is dropped.
    pub fn into_stream(mut self) -> ReplyStream {
        let (tx, stream) = ReplyStream::channel(REPLY_BUFFER);
        tokio::spawn(async move {
            while let Some(reply) = self.next().await {
                if tx.send(reply).await.is_err() {
                    debug!("reply receiver dropped, stopping search");
                    break;
                }
            }
        });
        stream
    }
}

impl std::fmt::Debug for FilteredSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredSearch")
            .field("stream", &self.stream)
            .field("filtered", &self.is_filtered())
            .field("finished", &self.finished)
            .field("suppressed", &self.suppressed)
            .finish_non_exhaustive()
    }
}
