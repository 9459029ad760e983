//! ilu-rag - 이그보 속담 RAG 시스템
//!
//! 공개 웹 페이지에서 속담/관용구를 규칙 기반으로 추출해 벡터 저장소에 넣고,
//! 질의와 가까운 문서를 페르소나 프롬프트에 담아 생성 모델에 전달합니다.
//!
//! - 수집: scraper → extractor → categorizer → knowledge (LanceDB)
//! - 응답: prompt → completion → chat

pub mod categorizer;
pub mod chat;
pub mod cli;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod scraper;

// Re-exports
pub use categorizer::{Categorizer, EnrichedRecord};
pub use chat::{ChatReply, ChatRequest, ChatService};
pub use completion::{CompletionProvider, OpenAiCompletion};
pub use config::Config;
pub use embedding::{EmbeddingProvider, OpenAiEmbedding};
pub use error::{IngestError, Service, ServiceError};
pub use extractor::{CandidateRecord, PatternKind, ProverbExtractor, Vocabulary};
pub use knowledge::{
    DocumentBuilder, IngestLedger, LanceVectorStore, MemoryVectorStore, ProverbRetriever,
    RetrievedDocument, StoreClient, StoredDocument, VectorStore,
};
pub use pipeline::{IngestPipeline, IngestReport};
pub use prompt::PromptAssembler;
pub use scraper::{ContentIsolator, RawPage, WebScraper};
