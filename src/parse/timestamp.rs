//! Site timestamp parsing
//!
//! XenForo `datetime` attributes carry a numeric UTC offset without the
//! RFC 3339 colon (`2024-01-10T10:00:00-0300`). This is the single place
//! where that format is repaired; everything else in the crate works with
//! already-parsed `DateTime<FixedOffset>` values.

use crate::MinerError;
use chrono::{DateTime, FixedOffset};

/// Parses a timestamp as embedded in scraped site content
///
/// Accepts RFC 3339 (`2024-01-10T10:00:00-03:00`) and the colon-less offset
/// variant the site actually emits (`2024-01-10T10:00:00-0300`).
pub fn parse_site_timestamp(raw: &str) -> crate::Result<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed);
    }

    // Insert the missing colon into the offset and retry.
    if raw.len() > 2 && raw.is_char_boundary(raw.len() - 2) {
        let (head, minutes) = raw.split_at(raw.len() - 2);
        let repaired = format!("{}:{}", head, minutes);
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&repaired) {
            return Ok(parsed);
        }
    }

    Err(MinerError::Timestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_rfc3339() {
        let parsed = parse_site_timestamp("2024-01-10T10:00:00-03:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-10T10:00:00-03:00");
    }

    #[test]
    fn test_parses_colonless_offset() {
        let parsed = parse_site_timestamp("2024-01-10T10:00:00-0300").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-10T10:00:00-03:00");
    }

    #[test]
    fn test_parses_utc_offset() {
        let parsed = parse_site_timestamp("2024-01-10T10:00:00+0000").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-10T10:00:00+00:00");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_site_timestamp("last tuesday").is_err());
        assert!(parse_site_timestamp("").is_err());
    }

    #[test]
    fn test_rejects_multibyte_tail_without_panicking() {
        // The colon-repair split must not land inside a UTF-8 sequence.
        assert!(parse_site_timestamp("ab€").is_err());
        assert!(parse_site_timestamp("2024-01-10T10:00:00−0300").is_err());
    }

    #[test]
    fn test_ordering_across_offsets() {
        let a = parse_site_timestamp("2024-01-10T10:00:00-0300").unwrap();
        let b = parse_site_timestamp("2024-01-10T13:30:00+0000").unwrap();
        assert!(a < b);
    }
}
