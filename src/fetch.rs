//! System-instruction resolution.
//!
//! The instruction text sent in the transport setup message can come from
//! an inline config value, a local file, or an HTTP GET performed once
//! before the session starts. Precedence: inline > file > URL > built-in
//! default. A failed fetch aborts session start.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::AppConfig;

/// Instruction used when no source is configured.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful voice assistant. Keep your spoken responses natural and concise.";

/// Timeout for the instruction fetch request.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while resolving the system instruction.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to fetch system instruction from {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    #[error("System instruction request to {url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to read system instruction file {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Resolve the system instruction from the configured source.
pub async fn resolve_system_instruction(config: &AppConfig) -> Result<String, FetchError> {
    if let Some(text) = &config.instruction_text {
        return Ok(text.trim().to_string());
    }

    if let Some(path) = &config.instruction_file {
        let text = std::fs::read_to_string(path).map_err(|source| FetchError::File {
            path: path.clone(),
            source,
        })?;
        return Ok(text.trim().to_string());
    }

    if let Some(url) = &config.instruction_url {
        return fetch_instruction(url).await;
    }

    Ok(DEFAULT_SYSTEM_INSTRUCTION.to_string())
}

/// GET the instruction text from a URL. Non-2xx responses are errors.
pub async fn fetch_instruction(url: &str) -> Result<String, FetchError> {
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let text = response.text().await.map_err(|source| FetchError::Http {
        url: url.to_string(),
        source,
    })?;

    tracing::info!(url, bytes = text.len(), "Fetched system instruction");
    Ok(text.trim().to_string())
}
