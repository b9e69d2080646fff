//! Azure Cognitive Services speech endpoints
//!
//! The token endpoint exchanges a subscription key for a short-lived bearer
//! token. The voice catalog lists the synthesis voices of a region.

use super::{AuthToken, SpeechError, Voice};
use crate::runtime::TokenSource;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Token endpoint for a region
pub fn token_endpoint(region: &str) -> String {
    format!("https://{region}.api.cognitive.microsoft.com/sts/v1.0/issueToken")
}

/// Voice list endpoint for a region
pub fn voices_endpoint(region: &str) -> String {
    format!("https://{region}.tts.speech.microsoft.com/cognitiveservices/voices/list")
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> SpeechError {
    match status.as_u16() {
        401 | 403 => SpeechError::auth(format!("Authentication failed: {body}")),
        _ => SpeechError::network(format!("HTTP {status}: {body}")),
    }
}

fn request_error(e: &reqwest::Error) -> SpeechError {
    if e.is_timeout() {
        SpeechError::network(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        SpeechError::network(format!("Connection failed: {e}"))
    } else {
        SpeechError::network(format!("Request failed: {e}"))
    }
}

// ============================================================================
// Token Source
// ============================================================================

/// Fetches authorization tokens with a subscription key. No retry: a failed
/// fetch is reported once and the session fails.
#[derive(Clone)]
pub struct AzureTokenSource {
    client: Client,
    endpoint: String,
    subscription_key: Option<String>,
}

impl AzureTokenSource {
    pub fn new(endpoint: impl Into<String>, subscription_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            subscription_key,
        }
    }
}

#[async_trait]
impl TokenSource for AzureTokenSource {
    async fn fetch_token(&self) -> Result<AuthToken, SpeechError> {
        let key = self
            .subscription_key
            .as_deref()
            .ok_or_else(|| SpeechError::auth("No subscription key configured"))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SpeechError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        tracing::debug!(endpoint = %self.endpoint, "Fetched authorization token");
        Ok(AuthToken::new(body.trim()))
    }
}

impl std::fmt::Debug for AzureTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureTokenSource")
            .field("endpoint", &self.endpoint)
            .field("has_key", &self.subscription_key.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Voice Catalog
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VoiceEntry {
    name: String,
    locale: String,
}

/// Parse the voice list JSON
pub fn parse_voice_list(body: &str) -> Result<Vec<Voice>, SpeechError> {
    let entries: Vec<VoiceEntry> = serde_json::from_str(body)
        .map_err(|e| SpeechError::client(format!("Failed to parse voice list: {e}")))?;
    Ok(entries
        .into_iter()
        .map(|entry| Voice::new(entry.name, entry.locale))
        .collect())
}

/// Lists the synthesis voices available in a region
#[derive(Debug, Clone)]
pub struct AzureVoiceCatalog {
    client: Client,
    url: String,
}

impl AzureVoiceCatalog {
    pub fn new(region: &str) -> Self {
        Self {
            client: Client::new(),
            url: voices_endpoint(region),
        }
    }

    pub async fn list(&self, token: &AuthToken) -> Result<Vec<Voice>, SpeechError> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SpeechError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let voices = parse_voice_list(&body)?;
        tracing::debug!(count = voices.len(), "Fetched voice catalog");
        Ok(voices)
    }
}
