use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parses the date shapes that show up in exported sheets. Returns `None`
/// rather than an error so callers can drop dirty values.
pub(crate) fn parse_lenient_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc().date());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    None
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn parses_iso_and_spreadsheet_shapes() {
        assert_eq!(parse_lenient_date("2024-01-01"), Some(ymd(2024, 1, 1)));
        assert_eq!(parse_lenient_date("2024-06-01 00:00:00"), Some(ymd(2024, 6, 1)));
        assert_eq!(parse_lenient_date("2024-06-01T08:30:00Z"), Some(ymd(2024, 6, 1)));
        assert_eq!(parse_lenient_date("15/03/2024"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse_lenient_date("15.03.2024"), Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn rejects_blank_and_garbage() {
        assert_eq!(parse_lenient_date("   "), None);
        assert_eq!(parse_lenient_date("last spring"), None);
        assert_eq!(parse_lenient_date("2024-13-45"), None);
    }
}
