//! Google Gemini provider (`generateContent`).

use crate::client::{error_for_status, error_for_transport, LlmClient, LlmRequest, LlmResponse, LlmUsage};
use serde::{Deserialize, Serialize};
use sift_core::{AppError, AppResult};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Gemini client authenticated with an API key.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_ENDPOINT, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn to_generate_request(&self, request: &LlmRequest) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction: request.system.as_ref().map(|system| Content {
                parts: vec![Part {
                    text: system.clone(),
                }],
            }),
            generation_config: GenerationSettings {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    fn convert_response(&self, request: &LlmRequest, response: GenerateResponse) -> AppResult<LlmResponse> {
        let content = response
            .candidates
            .into_iter()
            .find_map(|candidate| candidate.content)
            .ok_or_else(|| AppError::Llm("Gemini returned no candidates".to_string()))?;

        let text: String = content.parts.into_iter().map(|part| part.text).collect();
        let usage = response
            .usage_metadata
            .map(|u| LlmUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(LlmResponse {
            content: text,
            model: request.model.clone(),
            usage,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!("Sending generateContent to Gemini (model: {})", request.model);

        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.to_generate_request(request))
            .send()
            .await
            .map_err(|e| error_for_transport("Gemini", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(error_for_status("Gemini", status, &error_text));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Gemini response: {}", e)))?;

        self.convert_response(request, generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let client = GeminiClient::new("key");
        let request = LlmRequest::new("question", "gemini-2.0-flash")
            .with_temperature(0.2)
            .with_max_tokens(600);

        let body = serde_json::to_value(client.to_generate_request(&request)).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "question");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 600);
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parts_are_concatenated() {
        let client = GeminiClient::new("key");
        let request = LlmRequest::new("q", "gemini-2.0-flash");
        let raw: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"there"}]}}],
                "usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":2}}"#,
        )
        .unwrap();

        let response = client.convert_response(&request, raw).unwrap();
        assert_eq!(response.content, "Hello there");
        assert_eq!(response.usage.total_tokens, 7);
    }

    #[test]
    fn test_no_candidates_is_error() {
        let client = GeminiClient::new("key");
        let request = LlmRequest::new("q", "gemini-2.0-flash");
        let raw: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(client.convert_response(&request, raw).is_err());
    }
}
