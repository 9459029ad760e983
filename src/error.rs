//! 에러 타입 - 수집 경로와 응답 경로의 실패 분류
//!
//! 어댑터 코드(HTTP, LanceDB, SQLite)는 `anyhow::Result`를 반환하고,
//! 파이프라인 경계에서 아래 타입으로 분류됩니다.

use std::fmt;

use thiserror::Error;

/// 수집(ingestion) 경로 에러
#[derive(Debug, Error)]
pub enum IngestError {
    /// 단일 소스 가져오기 실패 (네트워크 에러 또는 non-2xx)
    #[error("source unavailable: {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },

    /// 본문 분리 후 콘텐츠가 최소 길이 미만
    #[error("insufficient content at {url}: {length} chars (minimum {minimum})")]
    InsufficientContent {
        url: String,
        length: usize,
        minimum: usize,
    },

    /// 수집 결과 삽입할 문서가 하나도 없음 (해당 실행에 한해 치명적)
    #[error("ingestion produced no documents to insert")]
    EmptyInsertionSet,

    /// 벡터 저장소 삽입 실패
    #[error("store insertion failed: {0}")]
    Store(#[source] anyhow::Error),
}

/// 외부 서비스 구분
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// 임베딩 + 벡터 검색
    Store,
    /// 생성 모델
    Completion,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Store => write!(f, "similarity search"),
            Service::Completion => write!(f, "completion"),
        }
    }
}

/// 응답(serving) 경로 에러
#[derive(Debug, Error)]
pub enum ServiceError {
    /// 요청 형식 오류 (JSON 파싱 실패, 빈 prompt 등)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// 외부 서비스 실패 - 부분 응답 없이 그대로 전달
    #[error("{service} failed: {source}")]
    Downstream {
        service: Service,
        #[source]
        source: anyhow::Error,
    },
}

impl ServiceError {
    pub fn downstream(service: Service, source: anyhow::Error) -> Self {
        ServiceError::Downstream { service, source }
    }
}
