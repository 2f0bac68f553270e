//! Fail-fast HTTP helpers.
//!
//! Every page request goes through [`send_json`]. Requests are never
//! retried here: a failed page aborts the run, and the next scheduled run
//! resumes from the checkpoint recomputed out of stored data. Failures are
//! logged with status, URL and a body preview before the [`SourceError`]
//! is returned.

use crate::SourceError;

/// Maximum length (in characters) of the body preview kept in errors.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends a request and parses the response body as JSON.
///
/// # Errors
///
/// Returns [`SourceError::Http`] on transport failure,
/// [`SourceError::Status`] on any non-2xx status, and
/// [`SourceError::Json`] when the body is not valid JSON.
pub async fn send_json(request: reqwest::RequestBuilder) -> Result<serde_json::Value, SourceError> {
    let response = request.send().await?;

    let url = response.url().to_string();
    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let text = response.text().await?;

    if !status.is_success() {
        let preview = preview(&text);
        log::error!(
            "Request failed.\n  \
             url: {url}\n  \
             status: {status}\n  \
             body preview: {preview}"
        );
        return Err(SourceError::Status {
            status: status.as_u16(),
            url,
            preview,
        });
    }

    serde_json::from_str(&text).map_err(|e| {
        log::error!(
            "JSON parse failed.\n  \
             url: {url}\n  \
             status: {status}\n  \
             content-type: {content_type:?}\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {}",
            text.len(),
            preview(&text),
        );
        SourceError::Json(e)
    })
}

/// Truncates a body to [`BODY_PREVIEW_LEN`] characters for diagnostics.
fn preview(text: &str) -> String {
    if text.chars().count() > BODY_PREVIEW_LEN {
        let head: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
