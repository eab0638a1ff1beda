//! Bridge to the language-model analyst.
//!
//! The core only owes the analyst a deterministic text rendering of the
//! per-channel table. Everything network-related lives behind [`Analyst`] and
//! its failures are turned into a message, never an error for the caller.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;

use crate::aggregate::{AggregateRow, RatioMetric};
use crate::error::AnalystError;

pub const DEFAULT_ANALYST_BASE: &str = "https://generativelanguage.googleapis.com/";
pub const DEFAULT_ANALYST_MODEL: &str = "gemini-1.5-flash";

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Compact CSV rendering of the channel table: `channel,spend,<ratios...>`,
/// numbers with two decimals, rows in the order given.
pub fn channel_summary(rows: &[AggregateRow<String>], ratios: &[RatioMetric]) -> String {
    let mut header = vec!["channel".to_string(), "spend".to_string()];
    header.extend(ratios.iter().map(|m| m.label().to_string()));

    let mut lines = vec![header.join(",")];
    for row in rows {
        let mut fields = vec![csv_field(&row.key), format!("{:.2}", row.totals.spend)];
        fields.extend(ratios.iter().map(|&m| format!("{:.2}", row.ratios.get(m))));
        lines.push(fields.join(","));
    }
    lines.join("\n")
}

/// Prompt sent to the model.
pub fn build_prompt(summary: &str, question: &str) -> String {
    format!("Dados:\n{summary}\n\nPergunta: {question}")
}

#[async_trait]
pub trait Analyst: Send + Sync {
    async fn ask(&self, summary: &str, question: &str) -> Result<String, AnalystError>;
}

/// What the user sees in the analyst panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum AnalystReply {
    Answer(String),
    /// Failure text; the dashboard keeps working.
    Unavailable(String),
    NoQuestion,
}

/// Ask `analyst`, folding any failure into [`AnalystReply::Unavailable`].
#[instrument(level = "info", skip(analyst, summary))]
pub async fn ask_safely(analyst: &dyn Analyst, summary: &str, question: &str) -> AnalystReply {
    let question = question.trim();
    if question.is_empty() {
        return AnalystReply::NoQuestion;
    }
    match analyst.ask(summary, question).await {
        Ok(text) => AnalystReply::Answer(text),
        Err(e) => {
            warn!(error = %e, retryable = e.is_retryable(), "analyst failed");
            AnalystReply::Unavailable(e.user_message())
        }
    }
}

// ─── Gemini generateContent ─────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<PartOut<'a>>,
}

#[derive(Serialize)]
struct PartOut<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartIn>,
}

#[derive(Debug, Deserialize)]
struct PartIn {
    #[serde(default)]
    text: String,
}

fn extract_text(resp: GenerateResponse) -> Result<String, AnalystError> {
    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AnalystError::EmptyResponse);
    }
    Ok(text)
}

pub struct GeminiAnalyst {
    client: Client,
    base: Url,
    model: String,
    api_key: String,
}

impl GeminiAnalyst {
    pub fn new(client: Client, base: Url, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base,
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Read the key from `key_var`.
    pub fn from_env(client: Client, base: Url, model: &str, key_var: &str) -> Result<Self, AnalystError> {
        let key = std::env::var(key_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AnalystError::MissingApiKey(key_var.to_string()))?;
        Ok(Self::new(client, base, model, key))
    }

    fn endpoint(&self) -> Result<Url, AnalystError> {
        let mut url = self
            .base
            .join(&format!("v1beta/models/{}:generateContent", self.model))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl Analyst for GeminiAnalyst {
    async fn ask(&self, summary: &str, question: &str) -> Result<String, AnalystError> {
        let prompt = build_prompt(summary, question);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![PartOut { text: &prompt }],
            }],
        };

        let resp = self.client.post(self.endpoint()?).json(&body).send().await?;
        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(AnalystError::Quota),
            s if !s.is_success() => return Err(AnalystError::Status(s.as_u16())),
            _ => {}
        }

        let parsed: GenerateResponse = resp.json().await?;
        let text = extract_text(parsed)?;
        info!(model = %self.model, chars = text.len(), "analyst answered");
        Ok(text)
    }
}
