// src/filter.rs

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::process::CampaignRecord;

/// Substring the organic toggle drops on.
const ORGANIC_TOGGLE_NEEDLE: &str = "organ";
/// Substring the paid-efficiency view excludes. Narrower than the toggle.
const ORGANIC_PAID_VIEW_NEEDLE: &str = "organi";

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Organic rule used by the include-organic toggle (`"organ"`). Catches
/// abbreviated labels such as "Organ Social" besides "organic"/"Organico".
pub fn is_organic_for_toggle(channel: &str) -> bool {
    contains_ci(channel, ORGANIC_TOGGLE_NEEDLE)
}

/// Organic rule used by the paid-only totals (`"organi"`).
///
/// This does not match "Organ Social"; it is kept separate from
/// [`is_organic_for_toggle`] on purpose so the two views stay as reported.
pub fn is_organic_for_paid_view(channel: &str) -> bool {
    contains_ci(channel, ORGANIC_PAID_VIEW_NEEDLE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthFilter {
    All,
    Month(u32),
}

impl Default for MonthFilter {
    fn default() -> Self {
        Self::All
    }
}

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub year: i32,
    #[serde(default)]
    pub month: MonthFilter,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    pub tiers: BTreeSet<String>,
    pub channels: BTreeSet<String>,
    pub include_organic: bool,
}

impl FilterSelection {
    /// Default selection for a dataset: latest year, all months, every
    /// observed tier and channel, organic included. `None` if there is no data.
    pub fn defaults(records: &[CampaignRecord]) -> Option<Self> {
        let year = *available_years(records).first()?;
        let opts = FilterOptions::for_base(records, year, MonthFilter::All, true);
        Some(Self {
            year,
            month: MonthFilter::All,
            date_range: None,
            tiers: opts.tiers.into_iter().collect(),
            channels: opts.channels.into_iter().collect(),
            include_organic: true,
        })
    }

    /// Set the date range; it only takes effect when both ends are given.
    pub fn with_date_bounds(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.date_range = match (start, end) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };
        self
    }

    fn in_base(&self, r: &CampaignRecord) -> bool {
        if r.year() != self.year {
            return false;
        }
        match self.month {
            MonthFilter::All => true,
            MonthFilter::Month(m) => r.month() == m,
        }
    }

    /// True when `r` survives every clause of this selection.
    pub fn matches(&self, r: &CampaignRecord) -> bool {
        if !self.in_base(r) {
            return false;
        }
        if let Some(range) = &self.date_range {
            if !range.contains(r.date) {
                return false;
            }
        }
        // organic toggle before set membership
        if !self.include_organic && is_organic_for_toggle(&r.channel) {
            return false;
        }
        self.tiers.contains(&r.tier) && self.channels.contains(&r.channel)
    }
}

/// Narrow `records` to those matching `selection`, preserving order.
pub fn apply<'a, I>(records: I, selection: &FilterSelection) -> Vec<&'a CampaignRecord>
where
    I: IntoIterator<Item = &'a CampaignRecord>,
{
    let out: Vec<&CampaignRecord> = records
        .into_iter()
        .filter(|r| selection.matches(r))
        .collect();
    debug!(year = selection.year, kept = out.len(), "applied filter selection");
    out
}

/// Distinct years present, newest first.
pub fn available_years(records: &[CampaignRecord]) -> Vec<i32> {
    let years: BTreeSet<i32> = records.iter().map(CampaignRecord::year).collect();
    years.into_iter().rev().collect()
}

/// Months that actually have rows in `year`, ascending.
pub fn available_months(records: &[CampaignRecord], year: i32) -> Vec<u32> {
    let months: BTreeSet<u32> = records
        .iter()
        .filter(|r| r.year() == year)
        .map(CampaignRecord::month)
        .collect();
    months.into_iter().collect()
}

/// What a selection UI can offer once year and month are chosen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    /// Every year in the data, newest first.
    pub years: Vec<i32>,
    /// Months with rows in the chosen year, ascending.
    pub months: Vec<u32>,
    /// Min/max date of the year+month base, the default period.
    pub date_bounds: Option<DateRange>,
    /// Observed tiers, first-seen order.
    pub tiers: Vec<String>,
    /// Observed channels, first-seen order, after the organic toggle.
    pub channels: Vec<String>,
}

impl FilterOptions {
    pub fn for_base(
        records: &[CampaignRecord],
        year: i32,
        month: MonthFilter,
        include_organic: bool,
    ) -> Self {
        let base = FilterSelection {
            year,
            month,
            date_range: None,
            tiers: BTreeSet::new(),
            channels: BTreeSet::new(),
            include_organic,
        };

        let mut opts = FilterOptions {
            years: available_years(records),
            months: available_months(records, year),
            ..FilterOptions::default()
        };
        for r in records.iter().filter(|r| base.in_base(r)) {
            opts.date_bounds = Some(match opts.date_bounds {
                None => DateRange {
                    start: r.date,
                    end: r.date,
                },
                Some(b) => DateRange {
                    start: b.start.min(r.date),
                    end: b.end.max(r.date),
                },
            });
            if !opts.tiers.contains(&r.tier) {
                opts.tiers.push(r.tier.clone());
            }
            if include_organic || !is_organic_for_toggle(&r.channel) {
                if !opts.channels.contains(&r.channel) {
                    opts.channels.push(r.channel.clone());
                }
            }
        }
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(date: &str, tier: &str, channel: &str) -> CampaignRecord {
        CampaignRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            tier: tier.into(),
            channel: channel.into(),
            spend: 10.0,
            leads: 1.0,
            hot_leads: 0.0,
            sales: 0.0,
        }
    }

    fn sample() -> Vec<CampaignRecord> {
        vec![
            rec("2025-11-03", "T2", "Meta"),
            rec("2026-01-05", "T2", "Meta"),
            rec("2026-01-20", "T3", "Google"),
            rec("2026-02-02", "T2", "Organ Social"),
            rec("2026-03-15", "T3", "Organic Search"),
        ]
    }

    #[test]
    fn test_organic_predicates_diverge() {
        assert!(is_organic_for_toggle("Organ Social"));
        assert!(is_organic_for_toggle("ORGANIC"));
        assert!(is_organic_for_paid_view("Organic Search"));
        assert!(is_organic_for_paid_view("organico"));
        assert!(!is_organic_for_paid_view("Organ Social"));
        assert!(!is_organic_for_toggle("Meta"));
    }

    #[test]
    fn test_years_and_months_from_data() {
        let data = sample();
        assert_eq!(available_years(&data), vec![2026, 2025]);
        assert_eq!(available_months(&data, 2026), vec![1, 2, 3]);
        assert_eq!(available_months(&data, 2025), vec![11]);
        assert!(available_months(&data, 2024).is_empty());
    }

    #[test]
    fn test_defaults_cover_latest_year() {
        let data = sample();
        let sel = FilterSelection::defaults(&data).unwrap();
        assert_eq!(sel.year, 2026);
        assert_eq!(apply(&data, &sel).len(), 4);
        assert!(FilterSelection::defaults(&[]).is_none());
    }

    #[test]
    fn test_month_and_date_range() {
        let data = sample();
        let mut sel = FilterSelection::defaults(&data).unwrap();
        sel.month = MonthFilter::Month(1);
        assert_eq!(apply(&data, &sel).len(), 2);

        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let ranged = sel.clone().with_date_bounds(Some(d("2026-01-05")), Some(d("2026-01-05")));
        let out = apply(&data, &ranged);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].channel, "Meta");

        // one-sided range is ignored
        let half = sel.with_date_bounds(Some(d("2026-01-10")), None);
        assert_eq!(apply(&data, &half).len(), 2);
    }

    #[test]
    fn test_organic_toggle_off() {
        let data = sample();
        let mut sel = FilterSelection::defaults(&data).unwrap();
        sel.include_organic = false;
        let out = apply(&data, &sel);
        assert!(out.iter().all(|r| !is_organic_for_toggle(&r.channel)));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_tier_and_channel_are_conjunctive() {
        let data = sample();
        let mut sel = FilterSelection::defaults(&data).unwrap();
        sel.tiers = ["T3".to_string()].into_iter().collect();
        sel.channels = ["Meta".to_string()].into_iter().collect();
        assert!(apply(&data, &sel).is_empty());

        sel.channels.insert("Google".into());
        assert_eq!(apply(&data, &sel).len(), 1);
    }

    #[test]
    fn test_subset_and_idempotent() {
        let data = sample();
        let mut sel = FilterSelection::defaults(&data).unwrap();
        sel.include_organic = false;
        sel.month = MonthFilter::Month(1);

        let once = apply(&data, &sel);
        let twice = apply(once.iter().copied(), &sel);
        assert_eq!(once, twice);
        assert!(once.iter().all(|r| data.contains(*r)));
    }

    #[test]
    fn test_options_follow_organic_toggle() {
        let data = sample();
        let with = FilterOptions::for_base(&data, 2026, MonthFilter::All, true);
        assert_eq!(with.channels, vec!["Meta", "Google", "Organ Social", "Organic Search"]);
        assert_eq!(with.tiers, vec!["T2", "T3"]);

        let without = FilterOptions::for_base(&data, 2026, MonthFilter::All, false);
        assert_eq!(without.channels, vec!["Meta", "Google"]);

        let bounds = with.date_bounds.unwrap();
        assert_eq!(bounds.start.to_string(), "2026-01-05");
        assert_eq!(bounds.end.to_string(), "2026-03-15");
    }

    #[test]
    fn test_options_carry_years_and_months() {
        let data = sample();
        let opts = FilterOptions::for_base(&data, 2026, MonthFilter::Month(2), true);
        assert_eq!(opts.years, vec![2026, 2025]);
        // months come from the whole year, not the chosen month
        assert_eq!(opts.months, vec![1, 2, 3]);
        assert_eq!(opts.channels, vec!["Organ Social"]);

        let older = FilterOptions::for_base(&data, 2025, MonthFilter::All, true);
        assert_eq!(older.months, vec![11]);
    }
}
