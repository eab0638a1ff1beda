// src/format.rs
//
// pt-BR display strings: "." groups thousands, "," separates decimals.

use chrono::NaiveDate;

use crate::aggregate::MonthKey;

const CURRENCY_MARKER: &str = "R$";

const MONTHS_PT: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// Label of the "no month restriction" option.
pub const ALL_MONTHS_LABEL: &str = "Todos";

/// Insert "." every three digits from the right.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

/// `1234.5` → `"R$ 1.234,50"`.
pub fn currency(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    // -0.001 rounds to zero and must not print a sign
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!(
        "{CURRENCY_MARKER} {sign}{},{frac_part}",
        group_thousands(int_part)
    )
}

/// Truncates toward zero: `12345.9` → `"12.345"`.
pub fn quantity(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let truncated = value.trunc();
    let digits = format!("{:.0}", truncated.abs());
    let sign = if truncated < 0.0 { "-" } else { "" };
    format!("{sign}{}", group_thousands(&digits))
}

/// `10.0` → `"10,0%"`.
pub fn percent(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    format!("{:.1}%", value).replace('.', ",")
}

/// Portuguese month name, `None` outside 1..=12.
pub fn month_name(month: u32) -> Option<&'static str> {
    let idx = usize::try_from(month).ok()?.checked_sub(1)?;
    MONTHS_PT.get(idx).copied()
}

/// Month number for a Portuguese month name (case-insensitive).
pub fn month_from_name(name: &str) -> Option<u32> {
    let name = name.trim().to_lowercase();
    MONTHS_PT
        .iter()
        .position(|m| m.to_lowercase() == name)
        .map(|i| i as u32 + 1)
}

/// Month picker options: "Todos" then the names of `months`.
pub fn month_options(months: &[u32]) -> Vec<&'static str> {
    std::iter::once(ALL_MONTHS_LABEL)
        .chain(months.iter().filter_map(|&m| month_name(m)))
        .collect()
}

/// Chart axis label for a month bucket, e.g. `"01-Jan/26"`.
pub fn month_bucket_label(key: MonthKey) -> String {
    match NaiveDate::from_ymd_opt(key.year, key.month, 1) {
        Some(d) => d.format("%m-%b/%y").to_string(),
        None => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_display() {
        assert_eq!(currency(0.0), "R$ 0,00");
        assert_eq!(currency(1234.5), "R$ 1.234,50");
        assert_eq!(currency(1_000_000.0), "R$ 1.000.000,00");
        assert_eq!(currency(999.999), "R$ 1.000,00");
        assert_eq!(currency(12.3), "R$ 12,30");
        assert_eq!(currency(123456.78), "R$ 123.456,78");
    }

    #[test]
    fn currency_edges() {
        assert_eq!(currency(-1.0), "R$ -1,00");
        assert_eq!(currency(-0.001), "R$ 0,00");
        assert_eq!(currency(f64::NAN), "R$ 0,00");
        assert_eq!(currency(f64::INFINITY), "R$ 0,00");
    }

    #[test]
    fn quantity_display() {
        assert_eq!(quantity(0.0), "0");
        assert_eq!(quantity(12345.0), "12.345");
        assert_eq!(quantity(12345.99), "12.345");
        assert_eq!(quantity(999.0), "999");
        assert_eq!(quantity(1_000.0), "1.000");
        assert_eq!(quantity(-1234.7), "-1.234");
        assert_eq!(quantity(f64::NAN), "0");
    }

    #[test]
    fn percent_uses_comma() {
        assert_eq!(percent(10.0), "10,0%");
        assert_eq!(percent(3.14159), "3,1%");
        assert_eq!(percent(0.0), "0,0%");
    }

    #[test]
    fn month_names_and_options() {
        assert_eq!(month_name(1), Some("Janeiro"));
        assert_eq!(month_name(3), Some("Março"));
        assert_eq!(month_name(0), None);
        assert_eq!(month_name(13), None);
        assert_eq!(month_from_name("março"), Some(3));
        assert_eq!(month_from_name(" DEZEMBRO "), Some(12));
        assert_eq!(month_from_name("Todos"), None);
        assert_eq!(month_options(&[1, 3]), vec!["Todos", "Janeiro", "Março"]);
    }

    #[test]
    fn bucket_label() {
        let key = MonthKey { year: 2026, month: 1 };
        assert_eq!(month_bucket_label(key), "01-Jan/26");
        let dec = MonthKey { year: 2025, month: 12 };
        assert_eq!(month_bucket_label(dec), "12-Dec/25");
    }
}
