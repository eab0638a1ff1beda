// src/process/record.rs

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One cleaned campaign row.
///
/// Every record carries a real date and four finite, non-negative metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub date: NaiveDate,
    pub tier: String,
    pub channel: String,
    pub spend: f64,
    pub leads: f64,
    pub hot_leads: f64,
    pub sales: f64,
}

impl CampaignRecord {
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }
}
