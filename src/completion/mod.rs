//! 완성(Completion) 모듈 - 조립된 프롬프트로 답변 생성
//!
//! 요청 하나에 응답 하나. 스트리밍은 하지 않습니다.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::openai::OpenAiClient;

/// 생성 토큰 상한
pub const MAX_TOKENS: u32 = 256;
/// 샘플링 온도
pub const TEMPERATURE: f32 = 0.7;

// ============================================================================
// CompletionProvider Trait
// ============================================================================

/// 텍스트 완성 프로바이더
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 프롬프트 하나를 완성
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// 프로바이더(모델) 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Completion
// ============================================================================

/// OpenAI `/completions` 구현체
///
/// ref: https://platform.openai.com/docs/api-reference/completions
#[derive(Debug, Clone)]
pub struct OpenAiCompletion {
    client: OpenAiClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    text: String,
}

impl OpenAiCompletion {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }

    /// 설정에서 생성 (OPENAI_API_KEY 필수)
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = OpenAiClient::from_config(config)?;
        Ok(Self::new(client, config.completion_model.clone()))
    }

    fn request<'a>(&'a self, prompt: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// 첫 번째 선택지의 텍스트
fn first_choice(response: CompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.text)
        .ok_or_else(|| anyhow::anyhow!("Completion response has no choices"))
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!("Requesting completion ({} chars prompt)", prompt.chars().count());

        let response: CompletionResponse = self
            .client
            .post_json("completions", &self.request(prompt))
            .await
            .context("Completion request failed")?;

        first_choice(response)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn completion() -> OpenAiCompletion {
        let client = OpenAiClient::new("sk-test", "http://localhost").unwrap();
        OpenAiCompletion::new(client, "gpt-3.5-turbo-instruct")
    }

    #[test]
    fn test_request_parameters() {
        let provider = completion();
        let json = serde_json::to_value(provider.request("USER QUERY: hi")).unwrap();

        assert_eq!(json["model"], "gpt-3.5-turbo-instruct");
        assert_eq!(json["prompt"], "USER QUERY: hi");
        assert_eq!(json["max_tokens"], 256);
        assert!((json["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_first_choice_text() {
        let body = r#"{"id":"cmpl-1","choices":[
            {"text":" Ndewo!","index":0,"finish_reason":"stop"},
            {"text":"ignored","index":1,"finish_reason":"stop"}
        ]}"#;
        let response: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(first_choice(response).unwrap(), " Ndewo!");
    }

    #[test]
    fn test_no_choices_is_error() {
        let response: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(first_choice(response).is_err());
    }

    #[test]
    fn test_name_is_model() {
        assert_eq!(completion().name(), "gpt-3.5-turbo-instruct");
    }
}
