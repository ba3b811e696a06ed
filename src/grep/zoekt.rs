//! Client for the external full-text engine.
//!
//! The engine is a black box behind an HTTP contract: it accepts a
//! query string plus document/context limits and returns line hits
//! over the mirror tree. Engine syntax bits the core relies on:
//! `case:`, `file:`, `-file:`, and `sym:` atoms prepended to the
//! pattern.

use crate::config::ZoektConfig;
use crate::error::GrepError;
use crate::types::Language;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A request to the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineQuery {
    pub query: String,
    pub max_docs: usize,
    pub num_context_lines: usize,
}

/// One line hit from the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineHit {
    pub path: String,
    pub line: u32,
    pub text: String,
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineResponse {
    #[serde(default)]
    hits: Vec<EngineHit>,
}

/// Abstraction over the engine so the pipeline is testable without a
/// daemon. The production implementation is [`ZoektClient`].
pub trait SearchEngine: Send + Sync {
    fn search<'a>(
        &'a self,
        query: &'a EngineQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<EngineHit>, GrepError>> + Send + 'a>>;
}

/// HTTP client against the engine's web port.
pub struct ZoektClient {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl ZoektClient {
    /// Builds a client from the engine configuration.
    ///
    /// # Errors
    ///
    /// Returns `GrepError::EngineUnavailable` when the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ZoektConfig) -> Result<Self, GrepError> {
        let timeout = Duration::from_millis(config.search_timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GrepError::EngineUnavailable(e.to_string()))?;
        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", config.web_port),
            http,
            timeout,
        })
    }
}

impl SearchEngine for ZoektClient {
    fn search<'a>(
        &'a self,
        query: &'a EngineQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<EngineHit>, GrepError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/api/search", self.base_url);
            let response = self
                .http
                .post(&url)
                .json(query)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        GrepError::EngineTimeout {
                            ms: self.timeout.as_millis() as u64,
                        }
                    } else {
                        GrepError::EngineUnavailable(e.to_string())
                    }
                })?;

            if !response.status().is_success() {
                return Err(GrepError::EngineUnavailable(format!(
                    "engine returned {}",
                    response.status()
                )));
            }

            let body: EngineResponse = response
                .json()
                .await
                .map_err(|e| GrepError::EngineUnavailable(format!("bad engine payload: {e}")))?;
            Ok(body.hits)
        })
    }
}

/// Builds the engine query string from a user grep request.
///
/// `sym:` narrows to symbol definitions; the `_assets/` subtree is
/// excluded from source searches and targeted by asset searches.
#[must_use]
pub fn build_query(
    pattern: &str,
    case_sensitive: bool,
    language: Option<Language>,
    project: Option<&str>,
    symbols: bool,
    assets: bool,
) -> String {
    let mut atoms: Vec<String> = Vec::new();

    atoms.push(format!("case:{}", if case_sensitive { "yes" } else { "no" }));

    if assets {
        atoms.push("file:^_assets/".to_string());
    } else {
        atoms.push("-file:^_assets/".to_string());
        if let Some(ext) = language.and_then(Language::extension_pattern) {
            atoms.push(format!("file:{ext}"));
        }
        if let Some(project) = project {
            atoms.push(format!("file:^{project}/"));
        }
    }

    if symbols {
        atoms.push(format!("sym:{pattern}"));
    } else {
        atoms.push(pattern.to_string());
    }

    atoms.join(" ")
}
