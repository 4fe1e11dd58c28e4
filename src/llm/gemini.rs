//! Gemini Flash identification client: Google AI `generateContent`.
//!
//! Differences from the Anthropic client:
//! - API key in URL query param, not header
//! - Image goes in an `inlineData` part next to the prompt text
//! - Text in `candidates[0].content.parts[*].text`
//! - Token usage in `usageMetadata`

use super::prompts::{IDENTIFY_MAX_TOKENS, IDENTIFY_PROMPT, PING_PROMPT};
use super::types::{IdentificationResult, TokenUsage};
use super::{IdentificationError, PlantIdentifier};
use crate::capture::RawImage;
use async_trait::async_trait;
use serde::Serialize;

pub const GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini 1.5 Flash pricing (prompts under 128k tokens).
const INPUT_COST_PER_MILLION: f64 = 0.075;
const OUTPUT_COST_PER_MILLION: f64 = 0.30;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host (proxies, local fakes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn generate(&self, body: &GenerateContentRequest<'_>) -> Result<serde_json::Value, IdentificationError> {
        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("[LLM] Gemini API returned {}: {}", status, body);
            return Err(IdentificationError::from_status("gemini", status, body));
        }

        Ok(response.json::<serde_json::Value>().await?)
    }
}

fn identify_request(image: &RawImage) -> GenerateContentRequest<'_> {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![
                Part::Text {
                    text: IDENTIFY_PROMPT,
                },
                Part::Inline {
                    inline_data: InlineData {
                        mime_type: &image.mime_type,
                        data: image.to_base64(),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            max_output_tokens: IDENTIFY_MAX_TOKENS,
        },
    }
}

#[async_trait]
impl PlantIdentifier for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn identify(&self, image: &RawImage) -> Result<IdentificationResult, IdentificationError> {
        log::info!("[LLM] Provider: gemini");
        log::info!("[LLM] Model: {}", self.model);
        log::info!(
            "[LLM] Image: {} ({} bytes)",
            image.mime_type,
            image.bytes.len()
        );

        let start = std::time::Instant::now();
        let body = self.generate(&identify_request(image)).await?;
        let latency_ms = start.elapsed().as_millis();
        log::info!("[LLM] API latency: {}ms", latency_ms);

        let usage = extract_usage(&body);
        if let Some(usage) = &usage {
            usage.log(INPUT_COST_PER_MILLION, OUTPUT_COST_PER_MILLION);
        }

        let text = extract_gemini_text(&body)?;
        log::info!("[LLM] Response: {} chars", text.len());

        Ok(IdentificationResult {
            text,
            provider: "gemini".to_string(),
            model: self.model.clone(),
            latency_ms,
            usage,
        })
    }

    async fn ping(&self) -> Result<(), IdentificationError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part::Text { text: PING_PROMPT }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 50,
            },
        };
        self.generate(&body).await.map(|_| ())
    }
}

/// Extract the reply text from a `generateContent` response.
///
/// Concatenates every text part of the first candidate. A prompt-level
/// block or a candidate with no text is reported as `Blocked`.
fn extract_gemini_text(body: &serde_json::Value) -> Result<String, IdentificationError> {
    if let Some(reason) = body
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(IdentificationError::Blocked(reason.to_string()));
    }

    let candidate = body
        .get("candidates")
        .and_then(|c| c.get(0))
        .ok_or_else(|| IdentificationError::MalformedResponse("no candidates".to_string()))?;

    let text: String = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        let finish = candidate
            .get("finishReason")
            .and_then(|r| r.as_str())
            .unwrap_or("no text in candidate");
        return Err(IdentificationError::Blocked(finish.to_string()));
    }

    Ok(text)
}

fn extract_usage(body: &serde_json::Value) -> Option<TokenUsage> {
    let usage = body.get("usageMetadata")?;
    Some(TokenUsage {
        input_tokens: usage["promptTokenCount"].as_u64().unwrap_or(0),
        output_tokens: usage["candidatesTokenCount"].as_u64().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ImageOrigin;
    use serde_json::json;

    fn leaf() -> RawImage {
        RawImage {
            bytes: b"leaf".to_vec(),
            mime_type: "image/png".to_string(),
            origin: ImageOrigin::Camera,
        }
    }

    #[test]
    fn request_carries_prompt_and_inline_image() {
        let image = leaf();
        let body = serde_json::to_value(identify_request(&image)).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], IDENTIFY_PROMPT);
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "bGVhZg==");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], IDENTIFY_MAX_TOKENS);
    }

    #[test]
    fn text_parts_are_concatenated() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "This is a Rose,"}, {"text": " also known as **Garden Rose**"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 270, "candidatesTokenCount": 90}
        });
        assert_eq!(
            extract_gemini_text(&body).unwrap(),
            "This is a Rose, also known as **Garden Rose**"
        );
        assert_eq!(
            extract_usage(&body),
            Some(TokenUsage {
                input_tokens: 270,
                output_tokens: 90
            })
        );
    }

    #[test]
    fn prompt_block_is_reported() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = extract_gemini_text(&body).unwrap_err();
        assert!(matches!(err, IdentificationError::Blocked(ref r) if r == "SAFETY"));
    }

    #[test]
    fn empty_candidate_is_blocked_with_finish_reason() {
        let body = json!({"candidates": [{"finishReason": "RECITATION"}]});
        let err = extract_gemini_text(&body).unwrap_err();
        assert!(matches!(err, IdentificationError::Blocked(ref r) if r == "RECITATION"));
    }

    #[test]
    fn missing_candidates_is_malformed() {
        let err = extract_gemini_text(&json!({})).unwrap_err();
        assert_eq!(err.kind(), "MalformedResponse");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = GeminiClient::new(reqwest::Client::new(), "k", "gemini-1.5-flash")
            .with_base_url("http://127.0.0.1:9999/");
        assert_eq!(
            client.endpoint(),
            "http://127.0.0.1:9999/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}
