//! APY conversion and display formatting.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Compounding periods per year.
pub const COMPOUNDING_PERIODS: f64 = 365.0;

/// Display format for sample dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Convert an annual rate into an APY with daily compounding.
pub fn apy_from_rate(rate: f64) -> f64 {
    (1.0 + rate / COMPOUNDING_PERIODS).powf(COMPOUNDING_PERIODS) - 1.0
}

/// Render a fraction as a percentage with four decimals.
pub fn format_percent(value: f64) -> String {
    format!("{:.4}%", value * 100.0)
}

/// Build the display offset, falling back to UTC for out-of-range hours.
pub fn display_offset(offset_hours: i32) -> FixedOffset {
    offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

/// Render a unix timestamp as `YYYY-MM-DD HH:MM` in the given offset.
pub fn format_timestamp(timestamp: i64, offset_hours: i32) -> String {
    match DateTime::<Utc>::from_timestamp(timestamp, 0) {
        Some(dt) => dt
            .with_timezone(&display_offset(offset_hours))
            .format(DATE_FORMAT)
            .to_string(),
        None => timestamp.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apy_of_zero_rate_is_zero() {
        assert_eq!(apy_from_rate(0.0), 0.0);
    }

    #[test]
    fn test_apy_exceeds_rate_with_compounding() {
        let apy = apy_from_rate(0.10);
        // (1 + 0.1/365)^365 - 1
        assert!((apy - 0.105_155_781_6).abs() < 1e-9);
        assert!(apy > 0.10);
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.0512), "5.1200%");
        assert_eq!(format_percent(0.0), "0.0000%");
    }

    #[test]
    fn test_format_timestamp_in_offset() {
        assert_eq!(format_timestamp(0, 0), "1970-01-01 00:00");
        assert_eq!(format_timestamp(0, 8), "1970-01-01 08:00");
        assert_eq!(format_timestamp(0, -5), "1969-12-31 19:00");
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        assert_eq!(format_timestamp(0, 48), "1970-01-01 00:00");
        assert_eq!(format_timestamp(0, i32::MAX), "1970-01-01 00:00");
        assert_eq!(format_timestamp(0, i32::MIN), "1970-01-01 00:00");
    }
}
