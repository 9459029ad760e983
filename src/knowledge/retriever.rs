//! Proverb Retriever - 임베딩 + 벡터 저장소를 묶은 저장소 클라이언트
//!
//! 수집 경로는 `insert_many`, 응답 경로는 `similarity_search`를 사용합니다.
//! 임베딩은 저장과 검색 모두 `EMBEDDING_DIMENSION`으로 잘라서 사용합니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use super::document::StoredDocument;
use super::lance::LanceVectorStore;
use super::vector::{truncate_embedding, VectorEntry, VectorStore, EMBEDDING_DIMENSION};
use crate::config::Config;
use crate::embedding::{EmbeddingProvider, OpenAiEmbedding};

// ============================================================================
// Types
// ============================================================================

/// 검색된 문서
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedDocument {
    pub content: String,
    pub metadata: serde_json::Value,
    pub similarity: f32,
}

// ============================================================================
// StoreClient Trait
// ============================================================================

/// 문서 저장소 클라이언트
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// 문서 일괄 삽입, 부여된 ID 반환 (입력 순서)
    async fn insert_many(&self, documents: &[StoredDocument]) -> Result<Vec<String>>;

    /// 질의와 가까운 문서 k개 (가까운 순)
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>>;
}

// ============================================================================
// ProverbRetriever
// ============================================================================

/// 임베딩 프로바이더 + 벡터 저장소
pub struct ProverbRetriever {
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl ProverbRetriever {
    pub fn new(vector: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { vector, embedder }
    }

    /// 설정에서 생성 (LanceDB + OpenAI 임베딩)
    pub async fn from_config(config: &Config) -> Result<Self> {
        let vector = LanceVectorStore::open(&config.lance_path(), &config.collection).await?;
        let embedder = OpenAiEmbedding::from_config(config)?;
        Ok(Self::new(Arc::new(vector), Arc::new(embedder)))
    }

    /// 저장된 문서 수
    pub async fn count(&self) -> Result<usize> {
        self.vector.count().await
    }

    /// 컬렉션 비우기
    pub async fn reset(&self) -> Result<()> {
        self.vector.reset().await
    }

    fn dimension() -> usize {
        EMBEDDING_DIMENSION as usize
    }
}

#[async_trait]
impl StoreClient for ProverbRetriever {
    async fn insert_many(&self, documents: &[StoredDocument]) -> Result<Vec<String>> {
        if documents.is_empty() {
            return Ok(vec![]);
        }

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .context("Failed to embed documents")?;

        if embeddings.len() != documents.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} documents",
                embeddings.len(),
                documents.len()
            );
        }

        let mut entries = Vec::with_capacity(documents.len());
        for (doc, embedding) in documents.iter().zip(embeddings) {
            entries.push(VectorEntry {
                id: uuid::Uuid::new_v4().to_string(),
                doc_index: doc.metadata.index as i64,
                content: doc.content.clone(),
                metadata: doc
                    .metadata_json()
                    .context("Failed to serialize document metadata")?,
                embedding: truncate_embedding(embedding, Self::dimension()),
            });
        }

        self.vector.insert_batch(&entries).await?;
        tracing::info!("Inserted {} documents", entries.len());

        Ok(entries.into_iter().map(|e| e.id).collect())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        let embedding = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;
        let embedding = truncate_embedding(embedding, Self::dimension());

        let results = self.vector.search(&embedding, k).await?;
        tracing::debug!("Similarity search returned {} documents", results.len());

        results
            .into_iter()
            .map(|r| -> Result<RetrievedDocument> {
                let metadata = serde_json::from_str(&r.metadata)
                    .with_context(|| format!("Invalid metadata for document {}", r.id))?;
                Ok(RetrievedDocument {
                    content: r.content,
                    metadata,
                    similarity: r.similarity,
                })
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorizer::EnrichedRecord;
    use crate::extractor::PatternKind;
    use crate::knowledge::{DocumentBuilder, MemoryVectorStore};

    /// 단어 해시 기반 결정적 임베더 (모델 출력처럼 1536차원)
    struct HashEmbedder;

    #[async_trait]
    impl EmbeddingProvider for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; 1536];
            for word in text.to_lowercase().split_whitespace() {
                let slot = word.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
                v[slot % 1024] += 1.0;
            }
            Ok(v)
        }

        fn dimension(&self) -> usize {
            1536
        }

        fn name(&self) -> &str {
            "hash"
        }
    }

    fn documents() -> Vec<StoredDocument> {
        let mut builder = DocumentBuilder::new();
        [
            ("Egbe bere ugo bere", "let the kite perch, let the eagle perch too"),
            ("onye kwe chi ya ekwe", "one who agrees, their god agrees too"),
            ("Nwa nkita anaghi ama ihe ala", ""),
        ]
        .into_iter()
        .filter_map(|(source_text, translation)| {
            builder.build(EnrichedRecord {
                source_text: source_text.to_string(),
                translation: translation.to_string(),
                pattern_kind: PatternKind::PairDash,
                origin_url: "https://example.com/proverbs".to_string(),
                origin_title: None,
                origin_domain: Some("example.com".to_string()),
                categories: vec!["general".to_string()],
                has_translation: !translation.is_empty(),
                term_count: source_text.split_whitespace().count(),
            })
        })
        .collect()
    }

    fn retriever() -> (Arc<MemoryVectorStore>, ProverbRetriever) {
        let vector = Arc::new(MemoryVectorStore::new());
        let retriever = ProverbRetriever::new(vector.clone(), Arc::new(HashEmbedder));
        (vector, retriever)
    }

    #[tokio::test]
    async fn test_insert_assigns_unique_uuids() {
        let (_vector, retriever) = retriever();

        let ids = retriever.insert_many(&documents()).await.unwrap();
        assert_eq!(ids.len(), 3);
        for id in &ids {
            assert_eq!(uuid::Uuid::parse_str(id).unwrap().get_version_num(), 4);
        }
        assert_ne!(ids[0], ids[1]);
        assert_eq!(retriever.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_embeddings_truncated_before_storing() {
        let (vector, retriever) = retriever();
        retriever.insert_many(&documents()).await.unwrap();

        let results = vector.search(&[1.0; 1024], 10).await.unwrap();
        assert_eq!(results.len(), 3);
        // 1536차원 질의는 길이 불일치로 유사도 0
        let mismatched = vector.search(&[1.0; 1536], 10).await.unwrap();
        assert!(mismatched.iter().all(|r| r.similarity == 0.0));
    }

    #[tokio::test]
    async fn test_similarity_search_nearest_first() {
        let (_vector, retriever) = retriever();
        retriever.insert_many(&documents()).await.unwrap();

        let results = retriever
            .similarity_search("onye kwe chi ya ekwe", 2)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].content.starts_with("source: onye kwe chi ya ekwe"));
        assert_eq!(results[0].metadata["index"], 1);
        assert_eq!(results[0].metadata["pattern_kind"], "pair_dash");
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let (_vector, retriever) = retriever();
        let results = retriever.similarity_search("wisdom from elders", 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_insert_nothing() {
        let (_vector, retriever) = retriever();
        assert!(retriever.insert_many(&[]).await.unwrap().is_empty());
        assert_eq!(retriever.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_collection() {
        let (_vector, retriever) = retriever();
        retriever.insert_many(&documents()).await.unwrap();
        retriever.reset().await.unwrap();
        assert_eq!(retriever.count().await.unwrap(), 0);
    }
}
