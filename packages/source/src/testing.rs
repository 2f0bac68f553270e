//! Deterministic doubles for fetch-driven code.
//!
//! [`ScriptedSource`] replays canned pages per day and records every
//! request it sees; [`RecordingPacer`] records pauses instead of sleeping.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::pacing::Pacer;
use crate::{PageRequest, PageSource, SourceError};

#[derive(Debug, Default)]
struct Script {
    pages: BTreeMap<NaiveDate, Vec<Vec<serde_json::Value>>>,
    failures: BTreeMap<NaiveDate, usize>,
    served: BTreeMap<NaiveDate, usize>,
    requests: Vec<PageRequest>,
}

/// A [`PageSource`] that serves pre-scripted pages.
///
/// The n-th request for a day returns the n-th scripted page of that day,
/// or an empty page once the script runs out. Days without a script are
/// empty.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<Script>,
}

impl ScriptedSource {
    /// Creates a source with no scripted pages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the pages served for `day`.
    pub fn push_day(&self, day: NaiveDate, pages: Vec<Vec<serde_json::Value>>) {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).pages.insert(day, pages);
    }

    /// Makes the `request_index`-th request for `day` fail with HTTP 503.
    pub fn fail_at(&self, day: NaiveDate, request_index: usize) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failures
            .insert(day, request_index);
    }

    /// Returns every request received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<PageRequest> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).requests.clone()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    fn label(&self) -> &str {
        "scripted"
    }

    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> Result<Vec<serde_json::Value>, SourceError> {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        script.requests.push(*request);

        let index = {
            let served = script.served.entry(request.day).or_insert(0);
            let index = *served;
            *served += 1;
            index
        };

        if script.failures.get(&request.day) == Some(&index) {
            return Err(SourceError::Status {
                status: 503,
                url: format!("scripted://{}", request.day),
                preview: "service unavailable".to_string(),
            });
        }

        Ok(script
            .pages
            .get(&request.day)
            .and_then(|pages| pages.get(index))
            .cloned()
            .unwrap_or_default())
    }
}

/// A [`Pacer`] that records requested pauses without waiting.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    /// Returns every pause requested so far.
    #[must_use]
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, delay: Duration) {
        self.pauses.lock().unwrap_or_else(PoisonError::into_inner).push(delay);
    }
}
