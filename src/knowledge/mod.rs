//! Knowledge 모듈 - 속담 문서 저장소
//!
//! - Document: 분류된 레코드 → 저장 문서 (순번, 메타데이터)
//! - Vector: 벡터 저장 트레이트 + 메모리 구현
//! - LanceDB: 디스크 벡터 저장소 (컬렉션 = 테이블)
//! - Retriever: 임베딩 + 벡터 저장소 = StoreClient
//! - Ledger: 수집 실행 기록 (SQLite)

mod document;
mod vector;
mod lance;
mod retriever;
mod ledger;

// Re-exports
pub use document::{display_content, DocumentBuilder, DocumentMetadata, StoredDocument, MIN_DOCUMENT_LENGTH};
pub use vector::{
    VectorStore, VectorEntry, SearchResult, MemoryVectorStore,
    cosine_similarity, truncate_embedding,
    EMBEDDING_DIMENSION,
};
pub use lance::LanceVectorStore;
pub use retriever::{ProverbRetriever, RetrievedDocument, StoreClient};
pub use ledger::{IngestLedger, RunSummary, SourceReport, SourceStatus};
