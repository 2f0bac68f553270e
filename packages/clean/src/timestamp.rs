//! Canonicalization of `offense_date` values.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

/// Canonical output format for reformatted timestamps.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000";

/// `YYYY-MM-DDTHH:MM:SS` with an optional 1-3 digit fraction.
static STRICT_ISO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9]{4}-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])T([01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9](\.[0-9]{1,3})?$",
    )
    .expect("valid regex")
});

/// Parse format for strict ISO values, fraction optional.
const STRICT_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Formats tried, in order, for values that are not strict ISO.
const FALLBACK_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Returns the canonical form of an occurrence timestamp, or `None` if it
/// cannot be interpreted.
///
/// Strict ISO values that name a real calendar instant pass through
/// unchanged. Values in one of the fallback formats are reformatted to
/// [`CANONICAL_FORMAT`].
#[must_use]
pub fn canonicalize(raw: &str) -> Option<String> {
    if STRICT_ISO_RE.is_match(raw) {
        return NaiveDateTime::parse_from_str(raw, STRICT_PARSE_FORMAT)
            .is_ok()
            .then(|| raw.to_string());
    }

    FALLBACK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.format(CANONICAL_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_iso_passes_unchanged() {
        assert_eq!(
            canonicalize("2025-03-01T10:15:30").as_deref(),
            Some("2025-03-01T10:15:30")
        );
        assert_eq!(
            canonicalize("2025-03-01T10:15:30.5").as_deref(),
            Some("2025-03-01T10:15:30.5")
        );
        assert_eq!(
            canonicalize("2025-03-01T10:15:30.000").as_deref(),
            Some("2025-03-01T10:15:30.000")
        );
    }

    #[test]
    fn space_separated_is_reformatted() {
        assert_eq!(
            canonicalize("2025-03-01 10:15:30").as_deref(),
            Some("2025-03-01T10:15:30.000")
        );
    }

    #[test]
    fn impossible_calendar_dates_are_invalid() {
        assert_eq!(canonicalize("2025-02-30T10:15:30.000"), None);
        assert_eq!(canonicalize("2025-04-31T00:00:00"), None);
        assert_eq!(canonicalize("2023-02-29T12:00:00"), None);
        assert_eq!(canonicalize("2025-02-30 10:15:30"), None);
        assert_eq!(
            canonicalize("2024-02-29T12:00:00").as_deref(),
            Some("2024-02-29T12:00:00")
        );
    }

    #[test]
    fn garbage_is_invalid() {
        assert_eq!(canonicalize("not-a-date"), None);
        assert_eq!(canonicalize(""), None);
        assert_eq!(canonicalize("2025-13-01T10:15:30"), None);
        assert_eq!(canonicalize("2025-03-01T10:15:30.1234"), None);
        assert_eq!(canonicalize("2025-03-01"), None);
    }
}
