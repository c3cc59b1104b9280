use time::OffsetDateTime;
use time::macros::format_description;

use crate::error::Result;

/// Current instant in UTC.
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Calendar day of `at` as `yyyy:MM:dd`.
///
/// Used as the suffix of day-scoped counter keys, so the colon separators keep
/// the keys groupable by year and month in the KV store.
pub fn format_day(at: OffsetDateTime) -> Result<String> {
    let format = format_description!("[year]:[month]:[day]");
    Ok(at.format(&format)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_format_day_pads_month_and_day() {
        let at = datetime!(2024-03-07 23:59:59 UTC);
        assert_eq!(format_day(at).unwrap(), "2024:03:07");
    }

    #[test]
    fn test_now_utc_is_utc() {
        assert!(now_utc().offset().is_utc());
    }
}
