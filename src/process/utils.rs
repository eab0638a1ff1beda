use once_cell::sync::Lazy;
use regex::Regex;

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Canonical form of a header: trimmed and lowercased.
pub fn normalize_header(raw: &str) -> String {
    clean_str(raw).to_lowercase()
}

/// pt-BR rendering: `1.234`, `1.234.567,89` or `12,5`. The leading group has
/// no leading zero so `0.500` stays a plain decimal.
static PT_BR_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[1-9]\d{0,2}(?:\.\d{3})+(?:,\d+)?|\d+,\d+)$")
        .expect("pt-BR number pattern is valid")
});

/// Parse a metric cell into a non-negative finite number.
///
/// pt-BR spreadsheet renderings (`R$ 1.234`, `1.234,50`, `12,5`) are read
/// with `.` as the thousands separator. Anything else goes through the plain
/// `f64` parse (`1234.5`). Values carrying a `,` that is not a pt-BR decimal
/// comma (`1,234.50`), negatives and non-finite values yield `None` so the
/// caller can substitute 0.
pub fn parse_metric(raw: &str) -> Option<f64> {
    let cleaned = clean_str(raw);
    let s = cleaned
        .strip_prefix("R$")
        .map(str::trim_start)
        .unwrap_or(&cleaned);
    if s.is_empty() {
        return None;
    }

    let value = if PT_BR_NUMBER.is_match(s) {
        s.replace('.', "").replace(',', ".").parse::<f64>().ok()?
    } else if s.contains(',') {
        return None;
    } else {
        s.parse::<f64>().ok()?
    };

    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}
