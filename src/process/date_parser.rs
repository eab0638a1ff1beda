use chrono::NaiveDate;

const DAY_FIRST_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const DAY_FIRST_SHORT_YEAR: &[&str] = &["%d/%m/%y", "%d-%m-%y", "%d.%m.%y"];

/// Parse a sheet date cell, day before month.
///
/// `"05/01/2026"` is the 5th of January. A trailing time part
/// (`"05/01/2026 13:45:00"`) is ignored. ISO `YYYY-MM-DD` is accepted as a
/// fallback since some exports switch to it.
pub fn parse_day_first(s: &str) -> Option<NaiveDate> {
    let s = s.trim().trim_matches('"');
    // keep the date token only
    let date_part = s.split(|c: char| c == ' ' || c == 'T').next()?;
    if date_part.is_empty() {
        return None;
    }

    if let Ok(d) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        return Some(d);
    }

    // %y would accept the first two digits of "2026", so pick formats by year width
    let year_len = date_part
        .rsplit(|c: char| c == '/' || c == '-' || c == '.')
        .next()
        .map(str::len)?;
    let formats = if year_len == 2 {
        DAY_FIRST_SHORT_YEAR
    } else {
        DAY_FIRST_FORMATS
    };

    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}
