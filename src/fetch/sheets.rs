// src/fetch/sheets.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::DataSource;
use crate::error::IngestError;
use crate::process::RawBatch;

/// Longest wait between two attempts.
pub const MAX_BACKOFF_MS: u64 = 30_000;
/// Upper bound accepted for `retry.max_retries`.
pub const MAX_RETRIES: u32 = 10;

/// Google Sheets host used when no base URL is configured.
pub const DEFAULT_SHEETS_BASE: &str = "https://docs.google.com/spreadsheets/d/";

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_backoff_ms(),
        }
    }
}

/// CSV export URL of one sheet tab: `<base><id>/gviz/tq?tqx=out:csv&sheet=<name>`.
pub fn sheet_csv_url(base: &Url, spreadsheet_id: &str, sheet: &str) -> Result<Url, url::ParseError> {
    let mut url = base.join(&format!("{}/gviz/tq", spreadsheet_id))?;
    url.query_pairs_mut()
        .append_pair("tqx", "out:csv")
        .append_pair("sheet", sheet);
    Ok(url)
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): doubles from
    /// `initial_backoff_ms`, capped at [`MAX_BACKOFF_MS`].
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(MAX_BACKOFF_MS);
        Duration::from_millis(ms)
    }
}

async fn get_text_core(client: &Client, url: &Url) -> Result<String, IngestError> {
    debug!("Fetching text from {}", url);
    let resp = client
        .get(url.clone())
        .send()
        .await
        .map_err(|source| IngestError::Http {
            url: url.to_string(),
            source,
        })?;
    let status = resp.status();
    if !status.is_success() {
        return Err(IngestError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    resp.text().await.map_err(|source| IngestError::Http {
        url: url.to_string(),
        source,
    })
}

async fn get_text_with_retry(
    client: &Client,
    url: &Url,
    retry: RetryPolicy,
) -> Result<String, IngestError> {
    let mut attempts = 0;
    loop {
        match get_text_core(client, url).await {
            Ok(t) => return Ok(t),
            Err(e) if attempts < retry.max_retries => {
                attempts += 1;
                let backoff = retry.backoff(attempts);
                warn!(%url, attempt = attempts, delay_ms = backoff.as_millis() as u64, error = %e, "Retrying");
                sleep(backoff).await;
            }
            Err(e) => {
                error!(%url, error = %e, "Exhausted retries");
                return Err(e);
            }
        }
    }
}

/// Tabs of one Google spreadsheet, fetched through the CSV export endpoint.
/// Each tab name doubles as the batch tag.
#[derive(Debug, Clone)]
pub struct SheetSource {
    client: Client,
    base: Url,
    spreadsheet_id: String,
    sheets: Vec<String>,
    retry: RetryPolicy,
}

impl SheetSource {
    pub fn new(
        client: Client,
        base: Url,
        spreadsheet_id: impl Into<String>,
        sheets: Vec<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            base,
            spreadsheet_id: spreadsheet_id.into(),
            sheets,
            retry,
        }
    }

    pub fn urls(&self) -> Result<Vec<(String, Url)>, url::ParseError> {
        self.sheets
            .iter()
            .map(|s| Ok((s.clone(), sheet_csv_url(&self.base, &self.spreadsheet_id, s)?)))
            .collect()
    }
}

#[async_trait]
impl DataSource for SheetSource {
    #[instrument(level = "info", skip(self), fields(sheets = self.sheets.len()))]
    async fn load(&self) -> Result<Vec<RawBatch>, IngestError> {
        let urls = self.urls()?;

        let mut out = Vec::with_capacity(urls.len());
        for (tag, url) in urls {
            let text = get_text_with_retry(&self.client, &url, self.retry).await?;
            let batch = RawBatch::from_csv_reader(tag.as_str(), text.as_bytes())
                .map_err(|source| IngestError::Csv { tag: tag.clone(), source })?;
            info!(sheet = %tag, rows = batch.len(), "fetched sheet");
            out.push(batch);
        }

        if out.iter().all(RawBatch::is_empty) {
            return Err(IngestError::Empty);
        }
        Ok(out)
    }

    fn describe(&self) -> String {
        format!(
            "spreadsheet {} [{}]",
            self.spreadsheet_id,
            self.sheets.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_csv_url() {
        let base = Url::parse(DEFAULT_SHEETS_BASE).unwrap();
        let url = sheet_csv_url(&base, "abc123", "T2").unwrap();
        assert_eq!(
            url.as_str(),
            "https://docs.google.com/spreadsheets/d/abc123/gviz/tq?tqx=out%3Acsv&sheet=T2"
        );
    }

    #[test]
    fn test_sheet_name_is_encoded() {
        let base = Url::parse(DEFAULT_SHEETS_BASE).unwrap();
        let url = sheet_csv_url(&base, "abc123", "Tier 3").unwrap();
        assert!(url.as_str().ends_with("sheet=Tier+3"));
    }

    #[test]
    fn test_urls_one_per_sheet() {
        let src = SheetSource::new(
            Client::new(),
            Url::parse(DEFAULT_SHEETS_BASE).unwrap(),
            "abc123",
            vec!["T2".into(), "T3".into()],
            RetryPolicy::default(),
        );
        let urls = src.urls().unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[1].0, "T3");
        assert!(src.describe().contains("T2, T3"));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryPolicy {
            max_retries: 3,
            initial_backoff_ms: 500,
        };
        assert_eq!(retry.backoff(1), Duration::from_millis(500));
        assert_eq!(retry.backoff(2), Duration::from_millis(1000));
        assert_eq!(retry.backoff(3), Duration::from_millis(2000));
        assert_eq!(retry.backoff(7), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(retry.backoff(100), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(retry.backoff(u32::MAX), Duration::from_millis(MAX_BACKOFF_MS));
    }

    #[tokio::test]
    async fn test_many_retries_without_delay_end_in_error() {
        let src = SheetSource::new(
            Client::new(),
            Url::parse("http://127.0.0.1:9/").unwrap(),
            "abc123",
            vec!["T2".into()],
            RetryPolicy {
                max_retries: 100,
                initial_backoff_ms: 0,
            },
        );
        let err = src.load().await.unwrap_err();
        assert!(matches!(err, IngestError::Http { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        let src = SheetSource::new(
            Client::new(),
            Url::parse("http://127.0.0.1:9/").unwrap(),
            "abc123",
            vec!["T2".into()],
            RetryPolicy {
                max_retries: 0,
                initial_backoff_ms: 1,
            },
        );
        let err = src.load().await.unwrap_err();
        assert!(matches!(err, IngestError::Http { .. }));
    }
}
