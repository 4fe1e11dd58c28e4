//! Anthropic Claude identification client: Messages API with an image block.

use super::prompts::{IDENTIFY_MAX_TOKENS, IDENTIFY_PROMPT, PING_PROMPT};
use super::types::{IdentificationResult, TokenUsage};
use super::{IdentificationError, PlantIdentifier};
use crate::capture::RawImage;
use async_trait::async_trait;

pub const ANTHROPIC_MODEL: &str = "claude-haiku-4-5-20251001";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Haiku pricing: $0.80/M input, $4/M output.
const INPUT_COST_PER_MILLION: f64 = 0.80;
const OUTPUT_COST_PER_MILLION: f64 = 4.0;

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn messages(&self, body: &serde_json::Value) -> Result<serde_json::Value, IdentificationError> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("[LLM] Anthropic API returned {}: {}", status, body);
            return Err(IdentificationError::from_status("anthropic", status, body));
        }

        Ok(response.json::<serde_json::Value>().await?)
    }
}

fn identify_request(model: &str, image: &RawImage) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "max_tokens": IDENTIFY_MAX_TOKENS,
        "messages": [
            {
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": image.mime_type,
                            "data": image.to_base64(),
                        }
                    },
                    {
                        "type": "text",
                        "text": IDENTIFY_PROMPT,
                    }
                ]
            }
        ]
    })
}

#[async_trait]
impl PlantIdentifier for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn identify(&self, image: &RawImage) -> Result<IdentificationResult, IdentificationError> {
        log::info!("[LLM] Provider: anthropic");
        log::info!("[LLM] Model: {}", self.model);

        let start = std::time::Instant::now();
        let body = self.messages(&identify_request(&self.model, image)).await?;
        let latency_ms = start.elapsed().as_millis();
        log::info!("[LLM] API latency: {}ms", latency_ms);

        let usage = body.get("usage").map(|u| TokenUsage {
            input_tokens: u["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: u["output_tokens"].as_u64().unwrap_or(0),
        });
        if let Some(usage) = &usage {
            usage.log(INPUT_COST_PER_MILLION, OUTPUT_COST_PER_MILLION);
        }

        let text = extract_text(&body)?;
        log::info!("[LLM] Response: {} chars", text.len());

        Ok(IdentificationResult {
            text,
            provider: "anthropic".to_string(),
            model: self.model.clone(),
            latency_ms,
            usage,
        })
    }

    async fn ping(&self) -> Result<(), IdentificationError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 50,
            "messages": [{"role": "user", "content": PING_PROMPT}]
        });
        self.messages(&body).await.map(|_| ())
    }
}

/// Concatenate the text blocks of a Messages API response.
fn extract_text(body: &serde_json::Value) -> Result<String, IdentificationError> {
    let blocks = body
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| IdentificationError::MalformedResponse("no content array".to_string()))?;

    let text: String = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect();

    if text.is_empty() {
        let stop = body["stop_reason"].as_str().unwrap_or("no text block");
        return Err(IdentificationError::Blocked(stop.to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ImageOrigin;
    use serde_json::json;

    #[test]
    fn image_block_precedes_prompt() {
        let image = RawImage {
            bytes: b"leaf".to_vec(),
            mime_type: "image/jpeg".to_string(),
            origin: ImageOrigin::Camera,
        };
        let body = identify_request(ANTHROPIC_MODEL, &image);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[0]["source"]["data"], "bGVhZg==");
        assert_eq!(content[1]["text"], IDENTIFY_PROMPT);
    }

    #[test]
    fn text_blocks_are_joined() {
        let body = json!({
            "content": [
                {"type": "text", "text": "This is a Fern,"},
                {"type": "text", "text": " also known as **Bracken**"}
            ],
            "stop_reason": "end_turn"
        });
        assert_eq!(
            extract_text(&body).unwrap(),
            "This is a Fern, also known as **Bracken**"
        );
    }

    #[test]
    fn refusal_without_text_is_blocked() {
        let body = json!({"content": [], "stop_reason": "refusal"});
        assert_eq!(extract_text(&body).unwrap_err().kind(), "Blocked");
    }
}
