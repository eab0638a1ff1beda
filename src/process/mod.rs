// src/process/mod.rs
pub mod date_parser;
pub mod raw_table;
pub mod record;
pub mod utils;

use tracing::{debug, info, instrument, warn};

pub use raw_table::RawBatch;
pub use record::CampaignRecord;

const DATE_COLUMNS: &[&str] = &["data", "date"];
const TIER_COLUMNS: &[&str] = &["tier"];
const CHANNEL_COLUMNS: &[&str] = &["mktchannel", "channel", "canal"];
const SPEND_COLUMNS: &[&str] = &["investimento", "spend"];
const LEADS_COLUMNS: &[&str] = &["leads"];
const HOT_LEADS_COLUMNS: &[&str] = &["hotleads", "hot_leads"];
const SALES_COLUMNS: &[&str] = &["vendas", "sales"];

/// Position of each known field in a batch's header row.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    date: Option<usize>,
    tier: Option<usize>,
    channel: Option<usize>,
    spend: Option<usize>,
    leads: Option<usize>,
    hot_leads: Option<usize>,
    sales: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> Self {
        let normalized: Vec<String> = headers.iter().map(|h| utils::normalize_header(h)).collect();
        let find = |aliases: &[&str]| {
            aliases
                .iter()
                .find_map(|alias| normalized.iter().position(|h| h == alias))
        };

        Self {
            date: find(DATE_COLUMNS),
            tier: find(TIER_COLUMNS),
            channel: find(CHANNEL_COLUMNS),
            spend: find(SPEND_COLUMNS),
            leads: find(LEADS_COLUMNS),
            hot_leads: find(HOT_LEADS_COLUMNS),
            sales: find(SALES_COLUMNS),
        }
    }
}

/// Counters from one normalization pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeReport {
    pub rows_seen: u64,
    pub kept: u64,
    pub dropped_bad_date: u64,
    /// Metric cells that were present but unparseable and became 0.
    pub coerced_fields: u64,
}

impl NormalizeReport {
    pub const ZERO: Self = NormalizeReport {
        rows_seen: 0,
        kept: 0,
        dropped_bad_date: 0,
        coerced_fields: 0,
    };

    /// Add another report into `self`, saturating on overflow.
    pub fn add(&mut self, other: NormalizeReport) {
        self.rows_seen = self.rows_seen.saturating_add(other.rows_seen);
        self.kept = self.kept.saturating_add(other.kept);
        self.dropped_bad_date = self.dropped_bad_date.saturating_add(other.dropped_bad_date);
        self.coerced_fields = self.coerced_fields.saturating_add(other.coerced_fields);
    }
}

/// The full normalized dataset, immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<CampaignRecord>,
    pub report: NormalizeReport,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

fn cell<'a>(row: &'a [String], idx: Option<usize>) -> Option<&'a str> {
    idx.and_then(|i| row.get(i)).map(String::as_str)
}

/// Reads a metric cell; an unparseable non-blank value bumps `coerced`.
fn metric(row: &[String], idx: Option<usize>, coerced: &mut u64) -> f64 {
    match cell(row, idx) {
        None => 0.0,
        Some(raw) => match utils::parse_metric(raw) {
            Some(v) => v,
            None => {
                if !raw.trim().is_empty() {
                    *coerced += 1;
                }
                0.0
            }
        },
    }
}

/// Normalize one origin batch into campaign records.
///
/// Rows with a missing or unparseable date are dropped. Metric cells that do
/// not parse become 0. Without a `tier` column every record is tagged with
/// the batch tag.
#[instrument(level = "debug", skip(batch), fields(tag = %batch.tag, rows = batch.len()))]
pub fn normalize_batch(batch: &RawBatch) -> (Vec<CampaignRecord>, NormalizeReport) {
    let cols = ColumnMap::from_headers(&batch.headers);
    let mut report = NormalizeReport::ZERO;

    if cols.date.is_none() {
        warn!(tag = %batch.tag, "no date column; every row will be dropped");
    }
    if cols.tier.is_none() {
        debug!(tag = %batch.tag, "no tier column; tagging rows with batch tag");
    }

    let mut out = Vec::with_capacity(batch.rows.len());
    for row in &batch.rows {
        report.rows_seen += 1;

        let date = match cell(row, cols.date).and_then(date_parser::parse_day_first) {
            Some(d) => d,
            None => {
                report.dropped_bad_date += 1;
                continue;
            }
        };

        let tier = cell(row, cols.tier)
            .map(utils::clean_str)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| batch.tag.clone());
        let channel = cell(row, cols.channel)
            .map(utils::clean_str)
            .unwrap_or_default();

        let mut coerced = 0;
        let record = CampaignRecord {
            date,
            tier,
            channel,
            spend: metric(row, cols.spend, &mut coerced),
            leads: metric(row, cols.leads, &mut coerced),
            hot_leads: metric(row, cols.hot_leads, &mut coerced),
            sales: metric(row, cols.sales, &mut coerced),
        };
        report.coerced_fields += coerced;
        report.kept += 1;
        out.push(record);
    }

    (out, report)
}

/// Normalize every batch and concatenate the results in batch order.
#[instrument(level = "info", skip(batches), fields(batches = batches.len()))]
pub fn normalize_all(batches: &[RawBatch]) -> Dataset {
    let mut records = Vec::new();
    let mut totals = NormalizeReport::ZERO;

    for batch in batches {
        let (mut recs, report) = normalize_batch(batch);
        if report.dropped_bad_date > 0 {
            warn!(
                tag = %batch.tag,
                dropped = report.dropped_bad_date,
                "rows dropped for missing or invalid date"
            );
        }
        records.append(&mut recs);
        totals.add(report);
    }

    info!(
        rows = totals.rows_seen,
        kept = totals.kept,
        dropped = totals.dropped_bad_date,
        coerced = totals.coerced_fields,
        "normalized dataset"
    );

    Dataset {
        records,
        report: totals,
    }
}
