//! Day-by-day fetch and upsert of incident pages.

use std::sync::Arc;

use crime_pipeline_database::{IncidentStore, UpsertCounts};
use crime_pipeline_ingest_models::{IngestConfig, IngestOutcome};
use crime_pipeline_source::pacing::Pacer;
use crime_pipeline_source::pages::DayPages;
use crime_pipeline_source::progress::ProgressCallback;
use crime_pipeline_source::{FetchWindow, PageSource};

use crate::IngestError;
use crate::checkpoint::{Clock, FetchPlan, resolve_plan};

/// Running totals of a fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchTotals {
    /// Records returned by the API.
    pub fetched: u64,
    /// Upsert outcome across all pages.
    pub upserts: UpsertCounts,
    /// Page requests issued.
    pub pages: u64,
}

/// Fetches every page of every day in `window` and upserts each page as
/// it arrives.
///
/// Pages already written stay written if a later request fails; the next
/// run resumes from the resulting checkpoint.
///
/// # Errors
///
/// Returns [`IngestError`] on the first failed request or store write.
pub async fn fetch_window(
    source: &dyn PageSource,
    pacer: &dyn Pacer,
    settings: &IngestConfig,
    store: &dyn IncidentStore,
    window: FetchWindow,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<FetchTotals, IngestError> {
    let mut totals = FetchTotals::default();
    progress.set_total(window.len_days());

    for day in window.days() {
        let mut pages = DayPages::new(source, pacer, settings.pacing, day, settings.page_size);
        let mut day_records = 0u64;

        while let Some(page) = pages.next_page().await? {
            let counts = store.upsert_batch(&page)?;
            day_records += page.len() as u64;
            totals.upserts += counts;

            log::debug!(
                "{}: {day} page of {} ({} new, {} replaced, {} without key)",
                source.label(),
                page.len(),
                counts.inserted,
                counts.replaced,
                counts.skipped,
            );
        }

        totals.fetched += day_records;
        totals.pages += pages.requests_made();

        log::info!("{}: {day} fetched {day_records} records", source.label());
        progress.inc(1);
        progress.set_message(format!("{} records", totals.fetched));
    }

    progress.finish(format!(
        "{}: {} records over {} days",
        source.label(),
        totals.fetched,
        window.len_days()
    ));

    Ok(totals)
}

/// Resolves the checkpoint and, if there is anything new, fetches it.
///
/// # Errors
///
/// Returns [`IngestError`] if the checkpoint query, a request, or a store
/// write fails.
pub async fn run_ingest(
    source: &dyn PageSource,
    pacer: &dyn Pacer,
    clock: &dyn Clock,
    settings: &IngestConfig,
    store: &dyn IncidentStore,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<IngestOutcome, IngestError> {
    let window = match resolve_plan(store, clock, settings.epoch)? {
        FetchPlan::UpToDate { last_ingested } => {
            log::info!("{}: up to date through {last_ingested}", source.label());
            progress.finish(format!("{}: up to date", source.label()));
            return Ok(IngestOutcome::UpToDate { last_ingested });
        }
        FetchPlan::Fetch(window) => window,
    };

    log::info!(
        "{}: fetching {} through {} ({} days)",
        source.label(),
        window.start,
        window.end,
        window.len_days()
    );

    let totals = fetch_window(source, pacer, settings, store, window, progress).await?;

    log::info!(
        "{}: ingest complete, {} fetched, {} inserted, {} replaced, {} dropped without key",
        source.label(),
        totals.fetched,
        totals.upserts.inserted,
        totals.upserts.replaced,
        totals.upserts.skipped,
    );

    Ok(IngestOutcome::Completed {
        start: window.start,
        end: window.end,
        fetched: totals.fetched,
        inserted: totals.upserts.inserted,
        replaced: totals.upserts.replaced,
        dropped_without_key: totals.upserts.skipped,
        pages: totals.pages,
    })
}
