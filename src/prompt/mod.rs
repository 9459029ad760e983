//! 프롬프트 조립 - 페르소나 + 질의 + 검색 문맥
//!
//! 템플릿 모양은 고정입니다. 검색 결과가 없으면 CONTEXT 부분만 비어 있습니다.

use std::sync::Arc;

use crate::error::{Service, ServiceError};
use crate::knowledge::{RetrievedDocument, StoreClient};

/// 검색 문서 수
pub const TOP_K: usize = 10;

pub const USER_QUERY_LABEL: &str = "USER QUERY: ";
pub const CONTEXT_LABEL: &str = "CONTEXT: ";
pub const FINAL_ANSWER_LABEL: &str = "Final Answer: ";

/// 답변자 페르소나 (앞뒤 줄바꿈과 들여쓰기까지 그대로 렌더링됨)
pub const PERSONA: &str = concat!(
    "\n",
    "        You are Achalugo, a warm and wise Igbo woman who knows everything about Igbo culture, language, proverbs, idioms, and traditions. Use the context to enrich your answers, but speak from your own deep knowledge when needed.\n",
    "\n",
    "        Always translate Igbo words or proverbs to English carefully—make sure the meaning and explanation match. If not, correct it. Speak clearly, truthfully, and with gentle confidence. Only explain the usage of a proverb if you're asked.\n",
    "\n",
    "        Use polite, simple language, and format your answers with clean Markdown. No images, just words from the heart.\n",
    "\n",
    "        You are to only answer questions pertaining to igbo culture or language. If the question is not related to igbo culture or language, you will respond with the following: \"This question is out of scope of my context.\"\n",
    "\n",
    "        ",
);

/// 프롬프트 조립기
#[derive(Clone)]
pub struct PromptAssembler {
    store: Arc<dyn StoreClient>,
}

impl PromptAssembler {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    /// 검색 문서로 프롬프트 렌더링 (저장소 순위 유지)
    pub fn render(query: &str, documents: &[RetrievedDocument]) -> String {
        let context = documents
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{}\n{}{}\n{}{}\n{}",
            PERSONA, USER_QUERY_LABEL, query, CONTEXT_LABEL, context, FINAL_ANSWER_LABEL
        )
    }

    /// 질의로 문서를 검색해 프롬프트 조립
    pub async fn assemble(&self, query: &str) -> Result<String, ServiceError> {
        let documents = self
            .store
            .similarity_search(query, TOP_K)
            .await
            .map_err(|e| ServiceError::downstream(Service::Store, e))?;

        tracing::debug!("Assembling prompt with {} context documents", documents.len());
        Ok(Self::render(query, &documents))
    }
}

// ============================================================================
// Tests
// ============================================================================
