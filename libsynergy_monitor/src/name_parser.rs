//! Timestamps encoded in log folder and file names.
//!
//! The instrument software has changed its naming scheme several times, and a log directory
//! can hold files written under any of them. Each scheme gets its own parser, and the parsers
//! are tried in priority order. Supporting a new scheme means appending to [`NAME_FORMATS`];
//! the existing entries are never touched since old files keep their old names forever.
//!
//! Currently supported:
//!
//! | Scheme       | Example                                  |
//! |--------------|------------------------------------------|
//! | iso          | `2025-05-12_12-48-37_Jeol_MicroED.dat`   |
//! | weekday-date | `Mon-May-12-2025_EDAutoLog`              |
//! | legacy       | `Mon-May-12-12-48-37-2025_EDAutoLog`     |
//! | underscore   | `2025_05_12_12h48m37_EDAutoLog`          |
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

/// Number of characters in the fixed-width numeric prefixes (iso and underscore schemes)
const NUMERIC_PREFIX_LEN: usize = 19;

/// A single naming scheme: a label (for diagnostics) and its parser.
#[derive(Debug, Clone, Copy)]
pub struct NameFormat {
    pub label: &'static str,
    pub parse: fn(&str) -> Option<PrimitiveDateTime>,
}

/// All known naming schemes, highest priority first
pub const NAME_FORMATS: [NameFormat; 4] = [
    NameFormat {
        label: "iso",
        parse: parse_iso_prefix,
    },
    NameFormat {
        label: "weekday-date",
        parse: parse_weekday_date,
    },
    NameFormat {
        label: "legacy",
        parse: parse_legacy,
    },
    NameFormat {
        label: "underscore",
        parse: parse_underscore_prefix,
    },
];

/// Resolve the timestamp encoded in a file or folder name.
///
/// Returns None if no scheme matches, or if a scheme matches structurally but the fields do
/// not form a valid calendar date/time. None means "timestamp unknown", not an error.
pub fn parse_name(name: &str) -> Option<PrimitiveDateTime> {
    parse_name_with_format(name).map(|(timestamp, _)| timestamp)
}

/// Same as [`parse_name`], but also reports which scheme matched
pub fn parse_name_with_format(name: &str) -> Option<(PrimitiveDateTime, &'static NameFormat)> {
    NAME_FORMATS
        .iter()
        .find_map(|format| (format.parse)(name).map(|timestamp| (timestamp, format)))
}

/// The part of a name before the first underscore. The weekday schemes use dashes only.
fn leading_segment(name: &str) -> &str {
    name.split('_').next().unwrap_or(name)
}

/// `YYYY-MM-DD_HH-MM-SS` followed by anything
fn parse_iso_prefix(name: &str) -> Option<PrimitiveDateTime> {
    let prefix = name.get(..NUMERIC_PREFIX_LEN)?;
    let format = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    PrimitiveDateTime::parse(prefix, &format).ok()
}

/// `Www-Mmm-DD-YYYY`, no time of day
fn parse_weekday_date(name: &str) -> Option<PrimitiveDateTime> {
    let format = format_description!("[weekday repr:short]-[month repr:short]-[day]-[year]");
    Date::parse(leading_segment(name), &format)
        .ok()
        .map(|date| date.midnight())
}

/// `Www-Mmm-DD-HH-MM-SS-YYYY`
fn parse_legacy(name: &str) -> Option<PrimitiveDateTime> {
    let format = format_description!(
        "[weekday repr:short]-[month repr:short]-[day]-[hour]-[minute]-[second]-[year]"
    );
    PrimitiveDateTime::parse(leading_segment(name), &format).ok()
}

/// `YYYY_MM_DD_HHhMMmSS` followed by a suffix
fn parse_underscore_prefix(name: &str) -> Option<PrimitiveDateTime> {
    let prefix = name.get(..NUMERIC_PREFIX_LEN)?;
    let format = format_description!("[year]_[month]_[day]_[hour]h[minute]m[second]");
    PrimitiveDateTime::parse(prefix, &format).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_iso_prefix() {
        assert_eq!(
            parse_name("2025-05-12_12-48-37_Jeol_MicroED.dat"),
            Some(datetime!(2025-05-12 12:48:37))
        );
    }

    #[test]
    fn test_weekday_date() {
        assert_eq!(
            parse_name("Mon-May-12-2025_EDAutoLog"),
            Some(datetime!(2025-05-12 00:00:00))
        );
    }

    #[test]
    fn test_legacy() {
        assert_eq!(
            parse_name("Mon-May-12-12-48-37-2025_EDAutoLog"),
            Some(datetime!(2025-05-12 12:48:37))
        );
        assert_eq!(
            parse_name("Tue-Dec-31-23-59-59-2024"),
            Some(datetime!(2024-12-31 23:59:59))
        );
    }

    #[test]
    fn test_underscore_prefix() {
        assert_eq!(
            parse_name("2025_05_12_12h48m37_EDAutoLog"),
            Some(datetime!(2025-05-12 12:48:37))
        );
    }

    #[test]
    fn test_reports_matching_format() {
        let (_, format) = parse_name_with_format("2025_05_12_12h48m37_EDAutoLog").unwrap();
        assert_eq!(format.label, "underscore");
        let (_, format) = parse_name_with_format("Mon-May-12-12-48-37-2025").unwrap();
        assert_eq!(format.label, "legacy");
    }

    #[test]
    fn test_out_of_range_fields() {
        assert_eq!(parse_name("2025-13-12_12-48-37_Jeol_MicroED.dat"), None);
        assert_eq!(parse_name("2025_13_12_12h48m37_EDAutoLog"), None);
        assert_eq!(parse_name("2025-05-12_25-48-37_Jeol_MicroED.dat"), None);
        assert_eq!(parse_name("Mon-May-32-12-48-37-2025_EDAutoLog"), None);
    }

    #[test]
    fn test_unrecognized_names() {
        assert_eq!(parse_name(""), None);
        assert_eq!(parse_name("EDAutoLog.dat"), None);
        assert_eq!(parse_name("notes_2025.txt"), None);
        assert_eq!(parse_name("2025-05-12"), None);
        // Multi-byte text shorter than the numeric prefix must not panic
        assert_eq!(parse_name("ログ_ファイル"), None);
    }
}
