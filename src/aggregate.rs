//! Totals, cost ratios and grouped tables over a filtered record set.
//!
//! Every ratio goes through [`safe_div`]: a zero volume yields 0, never NaN
//! or infinity, so downstream sorting and charting stay well defined.

use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::filter::is_organic_for_paid_view;
use crate::process::CampaignRecord;

/// Records per parallel grouping chunk. Chunks are merged back in order so
/// the result does not depend on the thread count.
const GROUP_CHUNK: usize = 4096;

/// `num / den` when `den > 0`, else 0.
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Summed base metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub spend: f64,
    pub leads: f64,
    pub hot_leads: f64,
    pub sales: f64,
}

impl Totals {
    pub fn add_record(&mut self, r: &CampaignRecord) {
        self.spend += r.spend;
        self.leads += r.leads;
        self.hot_leads += r.hot_leads;
        self.sales += r.sales;
    }

    pub fn merge(&mut self, other: Totals) {
        self.spend += other.spend;
        self.leads += other.leads;
        self.hot_leads += other.hot_leads;
        self.sales += other.sales;
    }

    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a CampaignRecord>,
    {
        records.into_iter().fold(Totals::default(), |mut acc, r| {
            acc.add_record(r);
            acc
        })
    }

    pub fn cost_ratios(&self) -> CostRatios {
        CostRatios::new(self.spend, self)
    }

    /// 100 × sales / leads.
    pub fn conversion_rate(&self) -> f64 {
        100.0 * safe_div(self.sales, self.leads)
    }
}

/// Spend divided by each volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostRatios {
    pub cost_per_lead: f64,
    pub cost_per_hot_lead: f64,
    pub cost_per_sale: f64,
}

impl CostRatios {
    /// Ratios of `spend` over the volumes in `volumes`. `spend` is separate
    /// because the paid view may divide total spend by paid volumes.
    pub fn new(spend: f64, volumes: &Totals) -> Self {
        Self {
            cost_per_lead: safe_div(spend, volumes.leads),
            cost_per_hot_lead: safe_div(spend, volumes.hot_leads),
            cost_per_sale: safe_div(spend, volumes.sales),
        }
    }

    pub fn get(&self, metric: RatioMetric) -> f64 {
        match metric {
            RatioMetric::CostPerLead => self.cost_per_lead,
            RatioMetric::CostPerHotLead => self.cost_per_hot_lead,
            RatioMetric::CostPerSale => self.cost_per_sale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioMetric {
    CostPerLead,
    CostPerHotLead,
    CostPerSale,
}

impl RatioMetric {
    pub const ALL: [RatioMetric; 3] = [
        RatioMetric::CostPerLead,
        RatioMetric::CostPerHotLead,
        RatioMetric::CostPerSale,
    ];

    /// Short column label, as the dashboard shows it.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CostPerLead => "cpl",
            Self::CostPerHotLead => "cphl",
            Self::CostPerSale => "cpv",
        }
    }
}

impl fmt::Display for RatioMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which spend the paid-only ratios divide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaidSpendBasis {
    /// Total spend over paid volumes (what the dashboard has always shown).
    #[default]
    Blended,
    /// Paid spend over paid volumes.
    PaidOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub totals: Totals,
    /// Spend the cost ratios divide. Differs from `totals.spend` only for
    /// paid-only summaries on [`PaidSpendBasis::Blended`].
    pub ratio_spend: f64,
    pub ratios: CostRatios,
    pub conversion_rate: f64,
}

impl Summary {
    fn from_totals(totals: Totals, spend: f64) -> Self {
        Self {
            totals,
            ratio_spend: spend,
            ratios: CostRatios::new(spend, &totals),
            conversion_rate: totals.conversion_rate(),
        }
    }
}

/// Totals and ratios over every record.
pub fn blended(records: &[&CampaignRecord]) -> Summary {
    let totals = Totals::from_records(records.iter().copied());
    Summary::from_totals(totals, totals.spend)
}

/// Totals over non-organic records (see [`is_organic_for_paid_view`]).
pub fn paid_only(records: &[&CampaignRecord], basis: PaidSpendBasis) -> Summary {
    let paid = Totals::from_records(
        records
            .iter()
            .copied()
            .filter(|r| !is_organic_for_paid_view(&r.channel)),
    );
    let spend = match basis {
        PaidSpendBasis::Blended => Totals::from_records(records.iter().copied()).spend,
        PaidSpendBasis::PaidOnly => paid.spend,
    };
    Summary::from_totals(paid, spend)
}

/// Calendar month bucket; orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(r: &CampaignRecord) -> Self {
        Self {
            year: r.year(),
            month: r.month(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One row of a grouped table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow<K> {
    pub key: K,
    pub totals: Totals,
    pub ratios: CostRatios,
}

fn group_by<K, F>(records: &[&CampaignRecord], key_of: F) -> Vec<AggregateRow<K>>
where
    K: Ord + Send,
    F: Fn(&CampaignRecord) -> K + Sync,
{
    let partials: Vec<BTreeMap<K, Totals>> = records
        .par_chunks(GROUP_CHUNK)
        .map(|chunk| {
            let mut acc: BTreeMap<K, Totals> = BTreeMap::new();
            for &r in chunk {
                acc.entry(key_of(r)).or_default().add_record(r);
            }
            acc
        })
        .collect();

    let mut merged: BTreeMap<K, Totals> = BTreeMap::new();
    for part in partials {
        for (key, totals) in part {
            merged.entry(key).or_default().merge(totals);
        }
    }

    merged
        .into_iter()
        .map(|(key, totals)| AggregateRow {
            key,
            ratios: totals.cost_ratios(),
            totals,
        })
        .collect()
}

/// Per-month totals and ratios, oldest month first.
#[instrument(level = "debug", skip(records), fields(records = records.len()))]
pub fn by_month(records: &[&CampaignRecord]) -> Vec<AggregateRow<MonthKey>> {
    group_by(records, MonthKey::of)
}

/// Per-channel totals and ratios. Rows come out keyed by channel name;
/// callers sort by the ratio they display with [`sort_by_metric`].
#[instrument(level = "debug", skip(records), fields(records = records.len()))]
pub fn by_channel(records: &[&CampaignRecord]) -> Vec<AggregateRow<String>> {
    group_by(records, |r| r.channel.clone())
}

/// Sort rows ascending by one ratio.
pub fn sort_by_metric<K>(rows: &mut [AggregateRow<K>], metric: RatioMetric) {
    rows.sort_by(|a, b| a.ratios.get(metric).total_cmp(&b.ratios.get(metric)));
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub label: &'static str,
    pub value: f64,
    /// Share of the first stage, in percent.
    pub percent_of_initial: f64,
}

/// Leads → hot leads → sales.
pub fn funnel(totals: &Totals) -> Vec<FunnelStage> {
    [
        ("Leads", totals.leads),
        ("Hotleads", totals.hot_leads),
        ("Vendas", totals.sales),
    ]
    .into_iter()
    .map(|(label, value)| FunnelStage {
        label,
        value,
        percent_of_initial: 100.0 * safe_div(value, totals.leads),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(date: &str, channel: &str, spend: f64, leads: f64, hot: f64, sales: f64) -> CampaignRecord {
        CampaignRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            tier: "T2".into(),
            channel: channel.into(),
            spend,
            leads,
            hot_leads: hot,
            sales,
        }
    }

    #[test]
    fn test_blended_scenario() {
        let data = vec![
            rec("2026-01-05", "Meta", 100.0, 10.0, 2.0, 1.0),
            rec("2026-01-06", "Google", 50.0, 0.0, 0.0, 0.0),
        ];
        let refs: Vec<&CampaignRecord> = data.iter().collect();
        let s = blended(&refs);

        assert_eq!(s.totals.spend, 150.0);
        assert_eq!(s.totals.leads, 10.0);
        assert_eq!(s.totals.hot_leads, 2.0);
        assert_eq!(s.totals.sales, 1.0);
        assert_eq!(s.ratios.cost_per_lead, 15.0);
        assert_eq!(s.ratios.cost_per_hot_lead, 75.0);
        assert_eq!(s.ratios.cost_per_sale, 150.0);
        assert_eq!(s.conversion_rate, 10.0);
    }

    #[test]
    fn test_zero_volume_ratios_are_zero() {
        let data = vec![rec("2026-01-05", "Meta", 80.0, 0.0, 0.0, 0.0)];
        let refs: Vec<&CampaignRecord> = data.iter().collect();
        let s = blended(&refs);

        assert_eq!(s.ratios, CostRatios::default());
        assert_eq!(s.conversion_rate, 0.0);
        assert_eq!(safe_div(1.0, 0.0), 0.0);
        assert_eq!(safe_div(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_paid_only_excludes_organi_and_uses_basis() {
        let data = vec![
            rec("2026-01-05", "Meta", 100.0, 10.0, 5.0, 2.0),
            rec("2026-01-05", "Organic", 0.0, 10.0, 5.0, 2.0),
            // toggle-only organic label still counts as paid here
            rec("2026-01-05", "Organ Social", 20.0, 10.0, 0.0, 0.0),
        ];
        let refs: Vec<&CampaignRecord> = data.iter().collect();

        let blended_basis = paid_only(&refs, PaidSpendBasis::Blended);
        assert_eq!(blended_basis.totals.leads, 20.0);
        assert_eq!(blended_basis.totals.spend, 120.0);
        assert_eq!(blended_basis.ratios.cost_per_lead, 6.0);
        assert_eq!(blended_basis.ratios.cost_per_sale, 60.0);

        let mut data2 = data.clone();
        data2[1].spend = 30.0;
        let refs2: Vec<&CampaignRecord> = data2.iter().collect();
        let b = paid_only(&refs2, PaidSpendBasis::Blended);
        let p = paid_only(&refs2, PaidSpendBasis::PaidOnly);
        assert_eq!(b.ratios.cost_per_lead, 150.0 / 20.0);
        assert_eq!(p.ratios.cost_per_lead, 120.0 / 20.0);
    }

    #[test]
    fn test_by_month_is_chronological_across_years() {
        let data = vec![
            rec("2026-01-10", "Meta", 10.0, 1.0, 0.0, 0.0),
            rec("2025-12-01", "Meta", 20.0, 2.0, 0.0, 0.0),
            rec("2025-01-15", "Meta", 30.0, 0.0, 0.0, 0.0),
            rec("2026-01-20", "Google", 30.0, 1.0, 0.0, 0.0),
        ];
        let refs: Vec<&CampaignRecord> = data.iter().collect();
        let rows = by_month(&refs);

        let keys: Vec<String> = rows.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(keys, vec!["2025-01", "2025-12", "2026-01"]);
        // January of two different years stays separate
        assert_eq!(rows[0].totals.spend, 30.0);
        assert_eq!(rows[0].ratios.cost_per_lead, 0.0);
        assert_eq!(rows[2].totals.spend, 40.0);
        assert_eq!(rows[2].ratios.cost_per_lead, 20.0);
    }

    #[test]
    fn test_by_channel_partitions_totals() {
        let data = vec![
            rec("2026-01-01", "Meta", 10.0, 1.0, 1.0, 0.0),
            rec("2026-01-02", "Google", 20.0, 4.0, 2.0, 1.0),
            rec("2026-01-03", "Meta", 30.0, 3.0, 0.0, 1.0),
            rec("2026-01-04", "TikTok", 5.0, 0.0, 0.0, 0.0),
        ];
        let refs: Vec<&CampaignRecord> = data.iter().collect();
        let rows = by_channel(&refs);
        let total = blended(&refs).totals;

        assert_eq!(rows.len(), 3);
        let mut sum = Totals::default();
        for row in &rows {
            sum.merge(row.totals);
        }
        assert_eq!(sum, total);

        let meta = rows.iter().find(|r| r.key == "Meta").unwrap();
        assert_eq!(meta.totals.spend, 40.0);
        assert_eq!(meta.ratios.cost_per_lead, 10.0);
        assert_eq!(meta.ratios.cost_per_sale, 40.0);
    }

    #[test]
    fn test_grouping_spans_many_chunks() {
        let data: Vec<CampaignRecord> = (0..(GROUP_CHUNK * 3 + 17))
            .map(|i| {
                let channel = if i % 2 == 0 { "Meta" } else { "Google" };
                rec("2026-02-01", channel, 1.0, 1.0, 0.0, 0.0)
            })
            .collect();
        let refs: Vec<&CampaignRecord> = data.iter().collect();

        let rows = by_channel(&refs);
        let leads: f64 = rows.iter().map(|r| r.totals.leads).sum();
        assert_eq!(leads, data.len() as f64);
        assert_eq!(by_channel(&refs), rows);
    }

    #[test]
    fn test_sort_by_metric_ascending() {
        let data = vec![
            rec("2026-01-01", "A", 100.0, 1.0, 0.0, 0.0),
            rec("2026-01-01", "B", 100.0, 10.0, 0.0, 0.0),
            rec("2026-01-01", "C", 100.0, 0.0, 0.0, 0.0),
        ];
        let refs: Vec<&CampaignRecord> = data.iter().collect();
        let mut rows = by_channel(&refs);
        sort_by_metric(&mut rows, RatioMetric::CostPerLead);

        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_funnel_percentages() {
        let t = Totals {
            spend: 0.0,
            leads: 200.0,
            hot_leads: 50.0,
            sales: 10.0,
        };
        let stages = funnel(&t);
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0].percent_of_initial, 100.0);
        assert_eq!(stages[1].percent_of_initial, 25.0);
        assert_eq!(stages[2].percent_of_initial, 5.0);

        let empty = funnel(&Totals::default());
        assert!(empty.iter().all(|s| s.percent_of_initial == 0.0));
    }
}
