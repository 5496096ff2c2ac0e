//! Outfit description via a multimodal model.
//!
//! - **[`GeminiModel`]**: calls the Google Gemini `generateContent` REST
//!   endpoint with the image inlined as base64.
//! - **[`VisionDescriber`]**: wraps any [`VisionModel`], adds the fixed
//!   instruction prompt, and classifies the answer into an
//!   [`OutfitDescription`]. It never returns an error: transport and API
//!   failures become a non-describable description.
//!
//! # Refusal detection
//!
//! A reply is treated as a refusal when it contains (case-insensitively) any
//! of the configured `vision.refusal_phrases`. No other validation of the
//! model's text is done.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::VisionConfig;
use crate::models::{OutfitDescription, Verdict};
use crate::traits::VisionModel;

// ============ Gemini ============

/// Google Gemini client.
///
/// One `reqwest::Client` is built per instance with the configured
/// per-request timeout; it is shared by every request the server handles.
pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiModel {
    pub fn new(config: &VisionConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            bail!("Gemini API key must not be empty");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build Gemini HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn generate(&self, parts: Vec<serde_json::Value>) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
        });

        debug!(model = %self.model, "Gemini request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to call Gemini API")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        parse_gemini_response(&json)
    }
}

#[async_trait]
impl VisionModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn describe_image(&self, image: &[u8], mime_type: &str, prompt: &str) -> Result<String> {
        let data = base64::engine::general_purpose::STANDARD.encode(image);
        self.generate(vec![
            serde_json::json!({ "text": prompt }),
            serde_json::json!({ "inline_data": { "mime_type": mime_type, "data": data } }),
        ])
        .await
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generate(vec![serde_json::json!({ "text": prompt })])
            .await
    }
}

/// Joins the text parts of the first candidate.
///
/// A prompt blocked by safety filters comes back with no candidates and a
/// `promptFeedback.blockReason`; that is reported as an error.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());

    let Some(parts) = parts else {
        if let Some(reason) = json
            .get("promptFeedback")
            .and_then(|f| f.get("blockReason"))
            .and_then(|r| r.as_str())
        {
            bail!("Gemini blocked the prompt: {}", reason);
        }
        bail!("Invalid Gemini response: missing candidates");
    };

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    let text = text.trim();
    if text.is_empty() {
        bail!("Gemini response contained no text");
    }
    Ok(text.to_string())
}

// ============ Describer ============

/// Turns image bytes into an [`OutfitDescription`] using a [`VisionModel`].
#[derive(Clone)]
pub struct VisionDescriber {
    model: Arc<dyn VisionModel>,
    prompt: String,
    refusal_phrases: Vec<String>,
}

impl VisionDescriber {
    pub fn new(model: Arc<dyn VisionModel>, config: &VisionConfig) -> Self {
        Self {
            model,
            prompt: config.prompt.clone(),
            refusal_phrases: config
                .refusal_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    pub fn model(&self) -> &Arc<dyn VisionModel> {
        &self.model
    }

    pub async fn describe(&self, image: &[u8], mime_type: &str) -> OutfitDescription {
        match self.model.describe_image(image, mime_type, &self.prompt).await {
            Ok(text) => {
                let text = text.trim().to_string();
                info!(model = self.model.model_name(), chars = text.len(), "vision description received");
                debug!("vision description: {}", text);

                if is_refusal(&text, &self.refusal_phrases) {
                    warn!("vision model could not describe an outfit, skipping product search");
                    OutfitDescription {
                        text,
                        verdict: Verdict::Refused,
                    }
                } else {
                    OutfitDescription {
                        text,
                        verdict: Verdict::Described,
                    }
                }
            }
            Err(e) => {
                warn!(model = self.model.model_name(), error = %e, "vision request failed");
                OutfitDescription {
                    text: format!("Could not get a description from the vision service: {}", e),
                    verdict: Verdict::Unavailable,
                }
            }
        }
    }
}

/// Case-insensitive substring match against lowercase `phrases`.
pub fn is_refusal(text: &str, phrases: &[String]) -> bool {
    let lower = text.to_lowercase();
    phrases.iter().any(|p| !p.is_empty() && lower.contains(p.as_str()))
}
