// src/error.rs

use std::path::PathBuf;

use thiserror::Error;

/// Failure to obtain raw batches from a data source.
///
/// The dashboard recovers from every variant by reporting "no data".
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("sheet '{tag}' is not valid CSV: {source}")]
    Csv {
        tag: String,
        #[source]
        source: csv::Error,
    },
    #[error("reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid source URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("source returned no rows")]
    Empty,
}

/// Failure of the language-model analyst. Never fatal to the dashboard.
#[derive(Debug, Error)]
pub enum AnalystError {
    #[error("analyst API key not set (expected in ${0})")]
    MissingApiKey(String),
    #[error("analyst request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("analyst quota exhausted")]
    Quota,
    #[error("analyst answered with status {0}")]
    Status(u16),
    #[error("analyst returned no text")]
    EmptyResponse,
    #[error("invalid analyst endpoint: {0}")]
    Url(#[from] url::ParseError),
}

impl AnalystError {
    /// Whether trying again later can succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Quota | Self::EmptyResponse => true,
            Self::Status(code) => *code >= 500,
            Self::MissingApiKey(_) | Self::Url(_) => false,
        }
    }

    /// Message shown in place of an answer.
    pub fn user_message(&self) -> String {
        if self.is_retryable() {
            format!("A análise não está disponível agora ({self}). Tente novamente em instantes.")
        } else {
            format!("A análise não pode ser gerada: {self}.")
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("config validation error: {0}")]
    Validation(String),
}
