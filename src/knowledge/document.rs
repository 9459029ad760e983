//! Document Builder - 분류된 레코드를 저장소 문서로 변환

use serde::{Deserialize, Serialize};

use crate::categorizer::EnrichedRecord;

/// 문서 최소 길이 (trim 후 문자 수)
pub const MIN_DOCUMENT_LENGTH: usize = 15;

/// 저장소 메타데이터 (레코드 전체 필드 + 순번)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// 실행 내 순번 (0부터, 방출 순서)
    pub index: usize,
    #[serde(flatten)]
    pub record: EnrichedRecord,
}

/// 저장소에 넣을 문서
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl StoredDocument {
    /// 메타데이터를 JSON 문자열로 직렬화
    pub fn metadata_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.metadata)
    }
}

/// 표시용 콘텐츠 - 번역이 있으면 두 줄 형식
pub fn display_content(record: &EnrichedRecord) -> String {
    if record.has_translation {
        format!(
            "source: {}\ntranslation: {}",
            record.source_text, record.translation
        )
    } else {
        record.source_text.clone()
    }
}

/// 문서 생성기
///
/// 한 수집 실행 동안 하나만 사용해야 순번이 유일합니다.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    next_index: usize,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 레코드를 문서로 변환 (너무 짧으면 None, 순번 소비 없음)
    pub fn build(&mut self, record: EnrichedRecord) -> Option<StoredDocument> {
        let content = display_content(&record);
        if content.trim().chars().count() < MIN_DOCUMENT_LENGTH {
            tracing::debug!("Dropping short document: {:?}", content);
            return None;
        }

        let index = self.next_index;
        self.next_index += 1;

        Some(StoredDocument {
            content,
            metadata: DocumentMetadata { index, record },
        })
    }

    /// 지금까지 방출한 문서 수
    pub fn emitted(&self) -> usize {
        self.next_index
    }
}
