// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Renders a stored (UTC instant) timestamp in `rustmailer_display_timezone_id`. The archive
//! store keeps every timestamp as an absolute instant (`TIMESTAMPTZ`); this only affects how a
//! sent-date is shown back to a human, e.g. the mbox envelope line of an export.

use super::cli::SETTINGS;
use time_tz::OffsetDateTimeExt;

/// Converts a UTC instant into the configured display zone. Falls back to UTC (offset zero) if
/// `rustmailer_display_timezone_id` doesn't name a known IANA zone.
pub fn to_display_zone(dt: chrono::DateTime<chrono::Utc>) -> chrono::DateTime<chrono::FixedOffset> {
    let offset_seconds = time_tz::timezones::get_by_name(&SETTINGS.rustmailer_display_timezone_id)
        .and_then(|tz| {
            let instant = time::OffsetDateTime::from_unix_timestamp(dt.timestamp()).ok()?;
            Some(instant.to_timezone(tz).offset().whole_seconds())
        })
        .unwrap_or(0);
    dt.with_timezone(
        &chrono::FixedOffset::east_opt(offset_seconds).unwrap_or_else(|| chrono::FixedOffset::east_opt(0).unwrap()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_zone_falls_back_to_utc() {
        let dt = chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&chrono::Utc);
        let shifted = to_display_zone(dt);
        assert_eq!(shifted.offset().local_minus_utc(), 0);
    }
}
