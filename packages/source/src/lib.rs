#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Remote incident API access.
//!
//! A [`PageSource`] answers one page request for one calendar day. The
//! [`pages::DayPages`] cursor walks a day lazily, page by page, applying a
//! [`pacing::PacingPolicy`] between requests. The production source is
//! [`socrata::SocrataSource`]; [`testing`] holds scripted doubles for
//! deterministic runs.

pub mod http;
pub mod pacing;
pub mod pages;
pub mod progress;
pub mod socrata;
pub mod testing;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};

/// Errors that can occur while talking to the remote API.
///
/// Every variant aborts the current run. Nothing here is retried: the next
/// scheduled run resumes from the stored checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Transport-level failure (connect, timeout, TLS, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}: {preview}")]
    Status {
        /// Numeric status code.
        status: u16,
        /// Requested URL.
        url: String,
        /// Leading part of the response body.
        preview: String,
    },

    /// The body parsed but did not have the expected shape.
    #[error("Unexpected response body: {message}")]
    UnexpectedBody {
        /// Description of what went wrong.
        message: String,
    },
}

/// One page of one day's incidents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Calendar day whose 24-hour window is queried.
    pub day: NaiveDate,
    /// Number of records to skip.
    pub offset: u64,
    /// Maximum number of records to return.
    pub limit: u64,
}

impl PageRequest {
    /// Inclusive lower bound of the day window (`YYYY-MM-DDT00:00:00`).
    #[must_use]
    pub fn window_start(&self) -> String {
        format!("{}T00:00:00", self.day.format("%Y-%m-%d"))
    }

    /// Inclusive upper bound of the day window (`YYYY-MM-DDT23:59:59`).
    #[must_use]
    pub fn window_end(&self) -> String {
        format!("{}T23:59:59", self.day.format("%Y-%m-%d"))
    }
}

/// A remote service that returns incident records one page at a time.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Human-readable label for log messages.
    fn label(&self) -> &str;

    /// Fetches one page, ordered by occurrence timestamp ascending.
    ///
    /// An empty page means the day is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on any transport failure, non-success
    /// status, or malformed body.
    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> Result<Vec<serde_json::Value>, SourceError>;
}

/// An inclusive range of calendar days to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    /// First day (inclusive).
    pub start: NaiveDate,
    /// Last day (inclusive).
    pub end: NaiveDate,
}

impl FetchWindow {
    /// Creates a window, or `None` when `start` is after `end`.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Number of days in the window.
    #[must_use]
    pub fn len_days(&self) -> u64 {
        u64::try_from((self.end - self.start).num_days()).unwrap_or(0) + 1
    }

    /// Iterates every day in the window in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        std::iter::successors(Some(self.start), move |day| {
            day.checked_add_days(Days::new(1)).filter(|next| *next <= end)
        })
    }
}
