//! Resolves the next date range to fetch from what the store already
//! holds.
//!
//! The checkpoint is never persisted: it is the latest `offense_date` in
//! the document store, so a crashed run simply resumes from whatever it
//! managed to write.

use chrono::{Days, NaiveDate, Utc};
use crime_pipeline_database::{DbError, IncidentStore};
use crime_pipeline_source::FetchWindow;

/// Source of "today".
pub trait Clock: Send + Sync {
    /// The current UTC calendar day.
    fn today(&self) -> NaiveDate;
}

/// The system clock, in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock frozen on one day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// What the next ingestion should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// Nothing to fetch; the store is current through `last_ingested`.
    UpToDate {
        /// The day before the first unfetched day.
        last_ingested: NaiveDate,
    },
    /// Fetch every day of the window.
    Fetch(FetchWindow),
}

/// Computes `[max(offense_date) + 1 day, today]`, or `[epoch, today]` for
/// an empty store.
///
/// # Errors
///
/// Returns [`DbError`] if the checkpoint query fails.
pub fn resolve_plan(
    store: &dyn IncidentStore,
    clock: &dyn Clock,
    epoch: NaiveDate,
) -> Result<FetchPlan, DbError> {
    let today = clock.today();

    let start = match store.max_offense_date()? {
        Some(latest) => {
            let latest = latest.date();
            let Some(next) = latest.checked_add_days(Days::new(1)) else {
                return Ok(FetchPlan::UpToDate {
                    last_ingested: latest,
                });
            };
            log::info!("Latest stored offense_date is {latest}; resuming from {next}");
            next
        }
        None => {
            log::info!("Document store is empty; starting from epoch {epoch}");
            epoch
        }
    };

    Ok(FetchWindow::new(start, today).map_or_else(
        || FetchPlan::UpToDate {
            last_ingested: start.checked_sub_days(Days::new(1)).unwrap_or(start),
        },
        FetchPlan::Fetch,
    ))
}
