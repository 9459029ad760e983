//! OpenAI HTTP 클라이언트 - 임베딩/완성 요청 공통 처리
//!
//! Bearer 인증, Rate Limit, 429/전송 오류 재시도(지수 백오프)를 담당합니다.
//! ref: https://platform.openai.com/docs/api-reference

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::Config;

/// Rate Limiter 설정
const RATE_LIMIT_RPM: u32 = 500;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이
const MIN_DELAY_MS: u64 = 100;
/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;
/// 요청 타임아웃
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// RateLimiter
// ============================================================================

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
pub(crate) struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u32, window: Duration, min_delay: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay,
            last_request: None,
        }
    }

    /// 요청 가능 여부 확인 및 대기
    pub(crate) async fn acquire(&mut self) {
        // 1. 최소 딜레이 (버스트 방지)
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::debug!("Min delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        let now = Instant::now();

        // 2. 윈도우 밖의 오래된 요청 제거
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        // 3. Rate limit 초과 시 대기
        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        // 4. 현재 요청 기록
        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

// ============================================================================
// OpenAiClient
// ============================================================================

/// OpenAI API 에러 응답
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// 공유 HTTP 클라이언트
///
/// 임베딩과 완성 프로바이더가 같은 Rate Limiter를 공유합니다.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    max_retries: u32,
    initial_backoff: Duration,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                RATE_LIMIT_RPM,
                RATE_LIMIT_WINDOW,
                Duration::from_millis(MIN_DELAY_MS),
            ))),
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// 설정에서 생성 (API 키 필수)
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.require_api_key()?, config.openai_base_url.clone())
    }

    /// 재시도 정책 변경
    pub fn with_retry(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.pow(attempt)
    }

    /// JSON POST 요청 (429/전송 오류 재시도)
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=self.max_retries {
            {
                let mut limiter = self.rate_limiter.lock().await;
                limiter.acquire().await;
            }

            let response = match self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send request to {}: {}", url, e));
                    if attempt < self.max_retries {
                        let backoff = self.backoff(attempt);
                        tracing::warn!(
                            "Request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            self.max_retries
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                return serde_json::from_str(&body)
                    .with_context(|| format!("Failed to parse response from {}", path));
            }

            if status.as_u16() == 429 {
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));
                if attempt < self.max_retries {
                    let backoff = self.backoff(attempt);
                    tracing::warn!(
                        "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                        backoff,
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                anyhow::bail!("{}", describe_error(status, &body));
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("Request failed after {} retries", self.max_retries)
        }))
    }
}

/// 에러 응답 본문을 메시지로 변환
fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(error) => match error.error.kind {
            Some(kind) => format!("OpenAI API error ({}, {}): {}", status, kind, error.error.message),
            None => format!("OpenAI API error ({}): {}", status, error.error.message),
        },
        Err(_) => format!("OpenAI API error ({}): {}", status, body),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        let client = OpenAiClient::new("sk-test", "https://api.openai.com/v1/").unwrap();
        assert_eq!(client.base_url(), "https://api.openai.com/v1");
        assert_eq!(client.endpoint("/embeddings"), "https://api.openai.com/v1/embeddings");
        assert_eq!(client.endpoint("completions"), "https://api.openai.com/v1/completions");
    }

    #[test]
    fn test_backoff_doubles() {
        let client = OpenAiClient::new("sk-test", "http://localhost")
            .unwrap()
            .with_retry(3, Duration::from_millis(10));
        assert_eq!(client.backoff(0), Duration::from_millis(10));
        assert_eq!(client.backoff(2), Duration::from_millis(40));
    }

    #[test]
    fn test_describe_error() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        let message = describe_error(reqwest::StatusCode::UNAUTHORIZED, body);
        assert!(message.contains("invalid_request_error"));
        assert!(message.contains("Incorrect API key provided"));

        let message = describe_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert!(message.contains("502"));
        assert!(message.contains("upstream down"));
    }

    #[tokio::test]
    async fn test_rate_limiter_min_delay() {
        let mut limiter = RateLimiter::new(100, Duration::from_secs(60), Duration::from_millis(50));

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_after_retries() {
        let client = OpenAiClient::new("sk-test", "http://127.0.0.1:1")
            .unwrap()
            .with_retry(1, Duration::from_millis(1));

        let result: Result<serde_json::Value> =
            client.post_json("embeddings", &serde_json::json!({})).await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Failed to send request"), "{}", err);
    }
}
