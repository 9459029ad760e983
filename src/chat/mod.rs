//! 채팅 서비스 - 요청 검증 → 프롬프트 조립 → 완성 → 응답
//!
//! 모든 요청에는 `request_id`(`%Y%m%d_%H%M%S_%6f`)가 부여되고
//! 로그에 함께 남습니다. 하위 서비스 실패는 빈 답변이 아닌 에러로 전달됩니다.

use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::completion::CompletionProvider;
use crate::error::{Service, ServiceError};
use crate::prompt::PromptAssembler;

/// 성공 응답 상태값
pub const STATUS_SUCCESS: &str = "success";

// ============================================================================
// Types
// ============================================================================

/// 채팅 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }

    /// JSON 본문 파싱 + 검증
    pub fn from_json(body: &str) -> Result<Self, ServiceError> {
        let request: ChatRequest = serde_json::from_str(body)
            .map_err(|e| ServiceError::InvalidRequest(format!("malformed request body: {}", e)))?;
        request.validate()?;
        Ok(request)
    }

    /// 빈 prompt 거부
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.prompt.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// 채팅 응답
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
    pub request_id: String,
    pub status: String,
}

/// 실패 응답 본문
#[derive(Debug, Clone, Serialize)]
pub struct ChatFailure {
    pub error: String,
    pub details: String,
    pub request_id: String,
}

impl ChatFailure {
    pub fn new(error: &ServiceError, request_id: impl Into<String>) -> Self {
        let summary = match error {
            ServiceError::InvalidRequest(_) => "Invalid request".to_string(),
            ServiceError::Downstream { service, .. } => format!("{} error", service),
        };
        Self {
            error: summary,
            details: format!("{:#}", error),
            request_id: request_id.into(),
        }
    }
}

/// 요청 ID 생성 (로컬 시각, 마이크로초 포함)
pub fn new_request_id() -> String {
    Local::now().format("%Y%m%d_%H%M%S_%6f").to_string()
}

// ============================================================================
// ChatService
// ============================================================================

/// 채팅 서비스
#[derive(Clone)]
pub struct ChatService {
    assembler: PromptAssembler,
    completion: Arc<dyn CompletionProvider>,
}

impl ChatService {
    pub fn new(assembler: PromptAssembler, completion: Arc<dyn CompletionProvider>) -> Self {
        Self {
            assembler,
            completion,
        }
    }

    /// 새 요청 ID로 처리
    pub async fn handle(&self, request: &ChatRequest) -> Result<ChatReply, ServiceError> {
        self.handle_with_id(request, new_request_id()).await
    }

    /// 지정한 요청 ID로 처리
    pub async fn handle_with_id(
        &self,
        request: &ChatRequest,
        request_id: String,
    ) -> Result<ChatReply, ServiceError> {
        tracing::info!("[{}] Starting chat request", request_id);

        if let Err(e) = request.validate() {
            tracing::error!("[{}] {}", request_id, e);
            return Err(e);
        }

        let prompt = match self.assembler.assemble(&request.prompt).await {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::error!("[{}] Prompt building failed: {:#}", request_id, e);
                return Err(e);
            }
        };
        tracing::info!(
            "[{}] Prompt assembled ({} chars)",
            request_id,
            prompt.chars().count()
        );

        let text = match self.completion.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("[{}] Completion failed: {:#}", request_id, e);
                return Err(ServiceError::downstream(Service::Completion, e));
            }
        };
        tracing::info!(
            "[{}] Completion received ({} chars)",
            request_id,
            text.chars().count()
        );

        Ok(ChatReply {
            text,
            request_id,
            status: STATUS_SUCCESS.to_string(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::embedding::EmbeddingProvider;
    use crate::knowledge::{
        ProverbRetriever, RetrievedDocument, SearchResult, StoreClient, StoredDocument,
        VectorEntry, VectorStore, EMBEDDING_DIMENSION,
    };
    use crate::prompt::{CONTEXT_LABEL, FINAL_ANSWER_LABEL};

    struct OneDocStore;

    #[async_trait]
    impl StoreClient for OneDocStore {
        async fn insert_many(&self, _documents: &[StoredDocument]) -> Result<Vec<String>> {
            Ok(vec![])
        }

        async fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedDocument>> {
            Ok(vec![RetrievedDocument {
                content: "source: Egbe bere ugo bere\ntranslation: let the kite perch".to_string(),
                metadata: serde_json::json!({"index": 0}),
                similarity: 0.9,
            }])
        }
    }

    /// 받은 프롬프트를 기록하는 완성 프로바이더
    #[derive(Default)]
    struct RecordingCompletion {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionProvider for RecordingCompletion {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().await.push(prompt.to_string());
            if self.fail {
                anyhow::bail!("HTTP 500");
            }
            Ok("**Egbe bere ugo bere** means live and let live.".to_string())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn service(completion: Arc<RecordingCompletion>) -> ChatService {
        ChatService::new(PromptAssembler::new(Arc::new(OneDocStore)), completion)
    }

    #[test]
    fn test_request_from_json() {
        let request = ChatRequest::from_json(r#"{"prompt":"What does egbe bere ugo bere mean?"}"#)
            .unwrap();
        assert_eq!(request.prompt, "What does egbe bere ugo bere mean?");
    }

    #[test]
    fn test_request_rejects_invalid_bodies() {
        for body in [
            "",
            "not json",
            r#"{}"#,
            r#"{"prompt": 42}"#,
            r#"{"prompt": ""}"#,
            r#"{"prompt": "   \n"}"#,
        ] {
            let err = ChatRequest::from_json(body).unwrap_err();
            assert!(matches!(err, ServiceError::InvalidRequest(_)), "{}", body);
        }
    }

    #[test]
    fn test_request_id_format() {
        let id = new_request_id();
        // 20261016_093015_123456
        assert_eq!(id.len(), 22);
        assert_eq!(&id[8..9], "_");
        assert_eq!(&id[15..16], "_");
        assert!(id.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_handle_success() {
        let completion = Arc::new(RecordingCompletion::default());
        let reply = service(completion.clone())
            .handle_with_id(&ChatRequest::new("egbe bere ugo bere"), "req-1".to_string())
            .await
            .unwrap();

        assert_eq!(reply.status, "success");
        assert_eq!(reply.request_id, "req-1");
        assert!(reply.text.contains("live and let live"));

        let prompts = completion.prompts.lock().await;
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(&format!(
            "{}source: Egbe bere ugo bere\ntranslation: let the kite perch\n{}",
            CONTEXT_LABEL, FINAL_ANSWER_LABEL
        )));
    }

    #[tokio::test]
    async fn test_empty_prompt_never_reaches_completion() {
        let completion = Arc::new(RecordingCompletion::default());
        let err = service(completion.clone())
            .handle(&ChatRequest::new("  "))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidRequest(_)));
        assert!(completion.prompts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_completion_failure_is_downstream() {
        let completion = Arc::new(RecordingCompletion {
            prompts: Mutex::new(vec![]),
            fail: true,
        });
        let err = service(completion)
            .handle(&ChatRequest::new("kite"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Downstream {
                service: Service::Completion,
                ..
            }
        ));

        let failure = ChatFailure::new(&err, "req-2");
        assert_eq!(failure.error, "completion error");
        assert!(failure.details.contains("HTTP 500"));
    }

    /// 목록 조회부터 실패하는 벡터 저장소
    struct UnreachableVectorStore;

    #[async_trait]
    impl VectorStore for UnreachableVectorStore {
        async fn insert_batch(&self, _entries: &[VectorEntry]) -> Result<usize> {
            anyhow::bail!("Failed to list tables")
        }

        async fn search(&self, _query_embedding: &[f32], _limit: usize) -> Result<Vec<SearchResult>> {
            anyhow::bail!("Failed to list tables")
        }

        async fn count(&self) -> Result<usize> {
            anyhow::bail!("Failed to list tables")
        }

        async fn reset(&self) -> Result<()> {
            anyhow::bail!("Failed to list tables")
        }
    }

    struct ConstantEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ConstantEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5; EMBEDDING_DIMENSION as usize])
        }

        fn dimension(&self) -> usize {
            EMBEDDING_DIMENSION as usize
        }

        fn name(&self) -> &str {
            "constant"
        }
    }

    #[tokio::test]
    async fn test_vector_store_failure_never_reaches_completion() {
        let retriever = ProverbRetriever::new(
            Arc::new(UnreachableVectorStore),
            Arc::new(ConstantEmbedder),
        );
        let completion = Arc::new(RecordingCompletion::default());
        let service = ChatService::new(PromptAssembler::new(Arc::new(retriever)), completion.clone());

        let err = service
            .handle(&ChatRequest::new("egbe bere ugo bere"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Downstream {
                service: Service::Store,
                ..
            }
        ));
        assert!(completion.prompts.lock().await.is_empty());

        let failure = ChatFailure::new(&err, "req-3");
        assert_eq!(failure.error, "similarity search error");
        assert!(failure.details.contains("Failed to list tables"));
    }

    #[test]
    fn test_reply_serialization() {
        let reply = ChatReply {
            text: "Ndewo".to_string(),
            request_id: "20261016_093015_123456".to_string(),
            status: STATUS_SUCCESS.to_string(),
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": "Ndewo",
                "request_id": "20261016_093015_123456",
                "status": "success"
            })
        );
    }
}
