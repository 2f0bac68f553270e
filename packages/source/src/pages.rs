//! Lazy page cursor over one day of incidents.

use chrono::NaiveDate;

use crate::pacing::{Pacer, PacingPolicy};
use crate::{PageRequest, PageSource, SourceError};

/// Walks the pages of a single day, one request per [`Self::next_page`]
/// call.
///
/// Offsets advance by the configured page size. The cursor is exhausted
/// once a page comes back empty; after that no further requests are made.
/// Between requests the [`PacingPolicy`] decides how long the [`Pacer`]
/// waits.
pub struct DayPages<'a> {
    source: &'a dyn PageSource,
    pacer: &'a dyn Pacer,
    policy: PacingPolicy,
    day: NaiveDate,
    page_size: u64,
    offset: u64,
    requested: u64,
    exhausted: bool,
}

impl<'a> DayPages<'a> {
    /// Creates a cursor positioned at offset zero of `day`.
    #[must_use]
    pub fn new(
        source: &'a dyn PageSource,
        pacer: &'a dyn Pacer,
        policy: PacingPolicy,
        day: NaiveDate,
        page_size: u64,
    ) -> Self {
        Self {
            source,
            pacer,
            policy,
            day,
            page_size: page_size.max(1),
            offset: 0,
            requested: 0,
            exhausted: false,
        }
    }

    /// Number of requests issued so far, including the terminating empty
    /// one.
    #[must_use]
    pub const fn requests_made(&self) -> u64 {
        self.requested
    }

    /// Fetches the next page, or `None` once the day is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the [`SourceError`] of the failing request. The cursor must
    /// not be reused afterwards; the caller is expected to abort the run.
    pub async fn next_page(&mut self) -> Result<Option<Vec<serde_json::Value>>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }

        if let Some(delay) = self.policy.delay_before(self.requested) {
            self.pacer.pause(delay).await;
        }

        let request = PageRequest {
            day: self.day,
            offset: self.offset,
            limit: self.page_size,
        };
        log::debug!(
            "{}: requesting {} offset={} limit={}",
            self.source.label(),
            self.day,
            request.offset,
            request.limit
        );

        let records = self.source.fetch_page(&request).await?;
        self.requested += 1;

        if records.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        self.offset += self.page_size;
        Ok(Some(records))
    }
}
