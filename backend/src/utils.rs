use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;

lazy_static! {
    static ref ISO8601_DURATION: Regex =
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("duration pattern is valid");
}

/// Parse an ISO 8601 duration (`PT1H2M3S`, `P1DT2H`) to total seconds.
///
/// Empty or malformed input yields `0`: an unknown duration must never
/// abort a scan.
pub fn iso8601_duration_to_seconds(duration_str: &str) -> u64 {
    let Some(caps) = ISO8601_DURATION.captures(duration_str.trim()) else {
        return 0;
    };

    let component = |idx: usize| -> u64 {
        caps.get(idx)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    component(1)
        .saturating_mul(86_400)
        .saturating_add(component(2).saturating_mul(3_600))
        .saturating_add(component(3).saturating_mul(60))
        .saturating_add(component(4))
}

/// Parse an RFC 3339 / ISO 8601 timestamp. Unparsable input yields `None`.
pub fn parse_iso8601_timestamp(date_str: &str) -> Option<DateTime<Utc>> {
    if date_str.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(date_str)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Descending order where `None` sorts after every known value.
pub fn compare_desc_missing_last<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
