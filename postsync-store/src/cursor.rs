//! Relay cursor: streams an unbounded relay set one bounded page at a time.
//!
//! The store side is stateless ([`RelayPageSource::fetch_page`] takes the
//! position as an argument). The position lives in [`RelayCursor`], owned by
//! whoever is consuming, so independent consumers never interfere.

use std::num::NonZeroU32;

use async_trait::async_trait;

use postsync_core::{RelayId, RelayRecord};

use crate::error::StoreError;
use crate::repository::Repository;

/// Anything that can serve relay pages by position.
#[async_trait]
pub trait RelayPageSource: Send + Sync {
    async fn fetch_page(
        &self,
        include_disabled: bool,
        after: RelayId,
        page_size: NonZeroU32,
    ) -> Result<Vec<RelayRecord>, StoreError>;
}

#[async_trait]
impl<R: Repository + ?Sized> RelayPageSource for R {
    async fn fetch_page(
        &self,
        include_disabled: bool,
        after: RelayId,
        page_size: NonZeroU32,
    ) -> Result<Vec<RelayRecord>, StoreError> {
        self.get_relays(include_disabled, after, page_size).await
    }
}

/// Consumer-side pagination state.
///
/// Every id handed out is strictly greater than the one before it; a page
/// that breaks this aborts with [`StoreError::DataIntegrity`].
pub struct RelayCursor<'a, S: ?Sized> {
    source: &'a S,
    after: RelayId,
    page_size: NonZeroU32,
    include_disabled: bool,
    calls: u32,
    exhausted: bool,
}

impl<'a, S: RelayPageSource + ?Sized> RelayCursor<'a, S> {
    pub fn new(source: &'a S, page_size: NonZeroU32, include_disabled: bool) -> Self {
        Self {
            source,
            after: RelayId::START,
            page_size,
            include_disabled,
            calls: 0,
            exhausted: false,
        }
    }

    /// Id of the last record returned (or [`RelayId::START`]).
    pub fn position(&self) -> RelayId {
        self.after
    }

    /// Store round trips made so far.
    pub fn calls(&self) -> u32 {
        self.calls
    }

    /// Fetch the next page. `Ok(None)` once the store returns an empty page;
    /// no further store calls are made after that.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RelayRecord>>, StoreError> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .source
            .fetch_page(self.include_disabled, self.after, self.page_size)
            .await?;
        self.calls += 1;

        if page.is_empty() {
            self.exhausted = true;
            tracing::debug!(calls = self.calls, last = %self.after, "relay cursor exhausted");
            return Ok(None);
        }

        for relay in &page {
            if relay.id <= self.after {
                tracing::error!(
                    previous = %self.after,
                    next = %relay.id,
                    "relay ids out of order, aborting"
                );
                return Err(StoreError::DataIntegrity {
                    previous: self.after,
                    next: relay.id,
                });
            }
            self.after = relay.id;
        }

        tracing::debug!(len = page.len(), last = %self.after, "relay page fetched");
        Ok(Some(page))
    }
}
