//! # HTTP Routes
//!
//! ```text
//! routes/
//! ├── mod.rs      ◄─── Shared query helpers (date ranges)
//! ├── sales.rs    ◄─── POST/GET /api/sales, GET/DELETE /api/sales/{id}
//! ├── income.rs   ◄─── GET /api/income[/today|/weekly|/monthly|/slip/{n}]
//! ├── items.rs    ◄─── /api/items CRUD + /api/items/low-stock
//! ├── analytics.rs◄─── GET /api/analytics/dashboard, /api/analytics/sales-trends
//! └── health.rs   ◄─── GET /health
//! ```

pub mod analytics;
pub mod health;
pub mod income;
pub mod items;
pub mod sales;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tally_core::{DateRange, ValidationError};

/// Builds a `[start, end)` range from query parameters.
///
/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (UTC). A plain
/// end date includes that whole day.
pub(crate) fn parse_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<DateRange, ValidationError> {
    let start = start
        .map(|s| parse_bound("startDate", s, false))
        .transpose()?;
    let end = end.map(|s| parse_bound("endDate", s, true)).transpose()?;

    let range = DateRange::new(start, end);
    range.validate()?;
    Ok(range)
}

fn parse_bound(field: &str, value: &str, is_end: bool) -> Result<DateTime<Utc>, ValidationError> {
    let value = value.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "expected YYYY-MM-DD or an RFC 3339 timestamp".to_string(),
    })?;
    let out_of_range = || ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "date out of range".to_string(),
    };

    let date = if is_end {
        date.checked_add_signed(Duration::days(1)).ok_or_else(out_of_range)?
    } else {
        date
    };

    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_plain_dates_cover_whole_end_day() {
        let range = parse_range(Some("2026-03-01"), Some("2026-03-31")).unwrap();
        assert_eq!(range.start, Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()));
        assert_eq!(range.end, Some(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()));
        assert!(range.contains(Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap()));
    }

    #[test]
    fn test_timestamps_are_taken_as_is() {
        let range = parse_range(Some("2026-03-01T10:00:00+02:00"), None).unwrap();
        assert_eq!(range.start, Some(Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()));
        assert_eq!(range.end, None);
    }

    #[test]
    fn test_rejects_garbage_and_inverted_ranges() {
        assert!(parse_range(Some("yesterday"), None).is_err());
        assert!(parse_range(Some("2026-03-10"), Some("2026-03-01")).is_err());
        assert_eq!(parse_range(None, None).unwrap(), DateRange::all());
    }

    #[test]
    fn test_end_date_at_calendar_limit_is_rejected() {
        let last = NaiveDate::MAX.format("%Y-%m-%d").to_string();

        let err = parse_range(None, Some(&last)).unwrap_err();
        assert_eq!(err.field(), Some("endDate"));

        // As a start bound the same day is fine
        assert!(parse_range(Some(&last), None).is_ok());
    }
}
