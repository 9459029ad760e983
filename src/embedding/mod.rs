//! 임베딩 모듈 - OpenAI API를 통한 텍스트 벡터화
//!
//! 문서 저장과 질의 검색에 같은 프로바이더를 사용합니다.
//! 저장 차원(1024)으로 자르는 것은 호출자(retriever)의 책임입니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OpenAiEmbedding::from_config(&Config::from_env()?)?;
//! let embedding = embedder.embed("Egbe bere ugo bere").await?;
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::openai::OpenAiClient;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 모델 출력 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding
// ============================================================================

/// text-embedding-3-small 출력 차원
pub const DEFAULT_DIMENSION: usize = 1536;

/// 요청당 최대 입력 수
const MAX_BATCH_INPUTS: usize = 96;

/// OpenAI 임베딩 구현체
///
/// ref: https://platform.openai.com/docs/api-reference/embeddings
#[derive(Debug, Clone)]
pub struct OpenAiEmbedding {
    client: OpenAiClient,
    model: String,
    dimension: usize,
}

/// 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            dimension: DEFAULT_DIMENSION,
        }
    }

    /// 설정에서 생성 (OPENAI_API_KEY 필수)
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = OpenAiClient::from_config(config)?;
        let embedder = Self::new(client, config.embedding_model.clone());
        tracing::info!("Using OpenAI embedding model {}", embedder.model);
        Ok(embedder)
    }

    /// 한 번의 API 호출로 임베딩 (응답은 index 순으로 정렬)
    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: inputs,
        };

        let response: EmbedResponse = self
            .client
            .post_json("embeddings", &request)
            .await
            .context("Embedding request failed")?;

        order_embeddings(response.data, inputs.len())
    }
}

/// 응답 항목을 입력 순서로 재배열
fn order_embeddings(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        anyhow::bail!(
            "Embedding response has {} vectors for {} inputs",
            data.len(),
            expected
        );
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for (i, chunk) in texts.chunks(MAX_BATCH_INPUTS).enumerate() {
            tracing::debug!(
                "Embedding batch {} ({} inputs, {}/{})",
                i + 1,
                chunk.len(),
                results.len() + chunk.len(),
                texts.len()
            );
            results.extend(self.request(chunk).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
