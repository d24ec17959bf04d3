use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::errors::BlueprintError;
use crate::wire::{GenerateContentResponse, GenerationOutput, GenerationRequest};

/// Gemini `generateContent` over plain HTTP. One request, one response; no
/// retry, and no timeout unless one was configured.
pub struct GeminiProvider {
    client: Client,
    api_base: String,
    api_key: Option<String>,
}

impl GeminiProvider {
    pub fn new(api_base: String, api_key: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            client: builder.build().context("building HTTP client")?,
            api_base,
            api_key,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base.trim_end_matches('/'), model)
    }
}

#[async_trait]
impl super::Provider for GeminiProvider {
    async fn generate(&self, req: &GenerationRequest) -> Result<GenerationOutput> {
        let url = self.endpoint(&req.model);
        let body = req.to_wire();
        tracing::debug!(model = %req.model, parts = req.parts.len(), "POST {url}");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_deref().unwrap_or_default())
            .json(&body)
            .send()
            .await
            .map_err(|e| BlueprintError::Provider(format!("request to {} failed: {e}", req.model)))?;

        let status = resp.status();
        let text = resp.text().await.context("gemini read body failed")?;
        tracing::trace!("gemini raw response ({status}): {text}");

        if !status.is_success() {
            return Err(BlueprintError::Provider(format!("Gemini API error ({status}): {text}")).into());
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("failed to parse Gemini response: {e}\nRaw: {text}"))?;
        if parsed.candidates.is_empty() {
            return Err(BlueprintError::Provider(format!("{} returned no candidates: {text}", req.model)).into());
        }
        Ok(parsed.into())
    }
}
