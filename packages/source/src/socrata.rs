//! Socrata SODA API page source.
//!
//! Queries one day window at a time using the `$where`, `$limit`,
//! `$offset`, and `$order` query parameters. The Seattle incident dataset
//! lives at <https://data.seattle.gov/resource/tazs-3rd5.json>.

use std::time::Duration;

use async_trait::async_trait;

use crate::{PageRequest, PageSource, SourceError};

/// Default Seattle Police Department incident dataset.
pub const SEATTLE_API_URL: &str = "https://data.seattle.gov/resource/tazs-3rd5.json";

/// Configuration for a Socrata page source.
#[derive(Debug, Clone)]
pub struct SocrataConfig {
    /// Resource URL (e.g., [`SEATTLE_API_URL`]).
    pub api_url: String,
    /// Occurrence timestamp column used for filtering and ordering.
    pub date_column: String,
    /// Optional application token sent as `X-App-Token`.
    pub app_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Label for log messages (e.g., `"Seattle"`).
    pub label: String,
}

/// A [`PageSource`] backed by a Socrata dataset.
pub struct SocrataSource {
    client: reqwest::Client,
    config: SocrataConfig,
}

impl SocrataSource {
    /// Builds the HTTP client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be constructed.
    pub fn new(config: SocrataConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Query parameters for one page request.
    fn query_params(&self, request: &PageRequest) -> [(&'static str, String); 4] {
        let column = &self.config.date_column;
        [
            (
                "$where",
                format!(
                    "{column} >= '{}' AND {column} <= '{}'",
                    request.window_start(),
                    request.window_end()
                ),
            ),
            ("$limit", request.limit.to_string()),
            ("$offset", request.offset.to_string()),
            ("$order", format!("{column} ASC")),
        ]
    }
}

#[async_trait]
impl PageSource for SocrataSource {
    fn label(&self) -> &str {
        &self.config.label
    }

    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> Result<Vec<serde_json::Value>, SourceError> {
        let mut builder = self
            .client
            .get(&self.config.api_url)
            .query(&self.query_params(request));

        if let Some(token) = &self.config.app_token {
            builder = builder.header("X-App-Token", token);
        }

        match crate::http::send_json(builder).await? {
            serde_json::Value::Array(records) => Ok(records),
            other => Err(SourceError::UnexpectedBody {
                message: format!(
                    "expected a JSON array of records, got {}",
                    json_kind(&other)
                ),
            }),
        }
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn source() -> SocrataSource {
        SocrataSource::new(SocrataConfig {
            api_url: SEATTLE_API_URL.to_string(),
            date_column: "offense_date".to_string(),
            app_token: None,
            timeout: Duration::from_secs(30),
            label: "Seattle".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn builds_day_window_query() {
        let request = PageRequest {
            day: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            offset: 2000,
            limit: 1000,
        };
        let params = source().query_params(&request);

        assert_eq!(
            params[0],
            (
                "$where",
                "offense_date >= '2025-03-01T00:00:00' AND offense_date <= '2025-03-01T23:59:59'"
                    .to_string()
            )
        );
        assert_eq!(params[1], ("$limit", "1000".to_string()));
        assert_eq!(params[2], ("$offset", "2000".to_string()));
        assert_eq!(params[3], ("$order", "offense_date ASC".to_string()));
    }

    #[test]
    fn describes_unexpected_bodies() {
        assert_eq!(json_kind(&serde_json::json!({"error": true})), "an object");
    }
}
