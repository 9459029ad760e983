//! Vector Store - 벡터 저장/검색 트레이트 및 유틸리티
//!
//! LanceDB 구현은 `lance.rs`, 프로세스 내 구현은 `MemoryVectorStore`입니다.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// 저장 벡터 차원 - 이보다 긴 임베딩은 잘라서 사용
pub const EMBEDDING_DIMENSION: i32 = 1024;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 문서 ID (UUID)
    pub id: String,
    /// 실행 내 문서 순번
    pub doc_index: i64,
    /// 문서 콘텐츠
    pub content: String,
    /// 메타데이터 JSON
    pub metadata: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub doc_index: i64,
    pub content: String,
    pub metadata: String,
    /// 유사도 스코어 (높을수록 가까움)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 벡터 배치 삽입
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 벡터 검색 (가까운 순)
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 전체 삭제
    async fn reset(&self) -> Result<()>;
}

// ============================================================================
// MemoryVectorStore
// ============================================================================

/// 프로세스 내 벡터 저장소 (코사인 유사도, 전수 검색)
///
/// 유사도가 같으면 삽입 순서를 유지합니다.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    entries: RwLock<Vec<VectorEntry>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        let mut stored = self.entries.write().await;
        stored.extend_from_slice(entries);
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let stored = self.entries.read().await;

        let mut scored: Vec<(f32, &VectorEntry)> = stored
            .iter()
            .map(|entry| (cosine_similarity(query_embedding, &entry.embedding), entry))
            .collect();

        // stable sort - 동점은 삽입 순서
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(similarity, entry)| SearchResult {
                id: entry.id.clone(),
                doc_index: entry.doc_index,
                content: entry.content.clone(),
                metadata: entry.metadata.clone(),
                similarity,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn reset(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 비어 있으면 0.0입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 임베딩을 최대 차원으로 자름 (짧으면 그대로)
pub fn truncate_embedding(mut embedding: Vec<f32>, max_dimension: usize) -> Vec<f32> {
    embedding.truncate(max_dimension);
    embedding
}

// ============================================================================
// Tests
// ============================================================================
