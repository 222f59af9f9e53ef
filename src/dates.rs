//! Lenient date parsing for metadata values.
//!
//! Metadata values are free text, so dates show up in several layouts.
//! Each layout is tried in order and the first match wins. Nothing here
//! panics: text that matches no layout comes back as [`ParsedDate::Unparsed`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_LAYOUTS: [&str; 4] = ["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_LAYOUTS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    Valid(NaiveDateTime),
    Unparsed,
}

impl ParsedDate {
    pub fn valid(&self) -> Option<NaiveDateTime> {
        match self {
            ParsedDate::Valid(at) => Some(*at),
            ParsedDate::Unparsed => None,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.valid().map(|at| at.date())
    }
}

pub fn parse_date(raw: &str) -> ParsedDate {
    let value = raw.trim();
    if value.is_empty() {
        return ParsedDate::Unparsed;
    }

    for layout in DATE_LAYOUTS {
        if let Ok(date) = NaiveDate::parse_from_str(value, layout) {
            if let Some(at) = date.and_hms_opt(0, 0, 0) {
                return ParsedDate::Valid(at);
            }
        }
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return ParsedDate::Valid(at.naive_local());
    }

    for layout in DATETIME_LAYOUTS {
        if let Ok(at) = NaiveDateTime::parse_from_str(value, layout) {
            return ParsedDate::Valid(at);
        }
    }

    ParsedDate::Unparsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_first_and_year_first_layouts() {
        assert_eq!(parse_date("01-02-2020").date(), Some(ymd(2020, 2, 1)));
        assert_eq!(parse_date("2020-02-01").date(), Some(ymd(2020, 2, 1)));
        assert_eq!(parse_date("15/07/2024").date(), Some(ymd(2024, 7, 15)));
        assert_eq!(parse_date(" 2024/07/15 ").date(), Some(ymd(2024, 7, 15)));
    }

    #[test]
    fn timestamps_keep_time_of_day() {
        let parsed = parse_date("2024-03-05T10:20:30.5+03:00").valid().unwrap();
        assert_eq!(parsed.date(), ymd(2024, 3, 5));
        assert_eq!(parsed.format("%H:%M:%S").to_string(), "10:20:30");

        let naive = parse_date("2024-03-05 08:00:00").valid().unwrap();
        assert_eq!(naive.format("%H").to_string(), "08");
    }

    #[test]
    fn garbage_is_unparsed() {
        assert_eq!(parse_date(""), ParsedDate::Unparsed);
        assert_eq!(parse_date("bientôt"), ParsedDate::Unparsed);
        assert_eq!(parse_date("31-02-2020"), ParsedDate::Unparsed);
        assert_eq!(parse_date("12000"), ParsedDate::Unparsed);
    }
}
