//! 수집 파이프라인 - 가져오기 → 본문 분리 → 추출 → 분류 → 문서화 → 삽입
//!
//! 소스 단위 실패는 보고서에 남기고 다음 소스로 진행합니다.
//! 삽입할 문서가 하나도 없으면 해당 실행만 `EmptyInsertionSet`으로 실패합니다.

use futures::StreamExt;

use crate::categorizer::Categorizer;
use crate::config::Config;
use crate::error::IngestError;
use crate::extractor::{ProverbExtractor, Vocabulary};
use crate::knowledge::{
    DocumentBuilder, ProverbRetriever, SourceReport, SourceStatus, StoreClient, StoredDocument,
};
use crate::scraper::{ContentIsolator, WebScraper};

// ============================================================================
// Types
// ============================================================================

/// 한 페이지의 추출 결과
#[derive(Debug, Clone)]
pub struct PageExtraction {
    /// 추출된 후보 레코드 수
    pub records: usize,
    /// 최소 길이를 통과한 문서
    pub documents: Vec<StoredDocument>,
}

/// 수집(삽입 전) 결과
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// 입력 순서의 소스별 결과
    pub sources: Vec<SourceReport>,
    /// 모든 소스의 문서 (순번 0부터 연속)
    pub documents: Vec<StoredDocument>,
}

impl IngestReport {
    /// 실패한 소스 수
    pub fn failed_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| !matches!(s.status, SourceStatus::Extracted { .. }))
            .count()
    }
}

// ============================================================================
// IngestPipeline
// ============================================================================

/// 수집 파이프라인
pub struct IngestPipeline {
    scraper: WebScraper,
    isolator: ContentIsolator,
    extractor: ProverbExtractor,
    categorizer: Categorizer,
}

impl IngestPipeline {
    pub fn new(scraper: WebScraper, extractor: ProverbExtractor) -> Self {
        Self {
            scraper,
            isolator: ContentIsolator::default(),
            extractor,
            categorizer: Categorizer::default(),
        }
    }

    /// 설정에서 생성 (ILU_VOCABULARY가 있으면 해당 어휘 사용)
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let scraper = WebScraper::new(&config.user_agent, config.fetch_timeout, config.fetch_delay)?;
        let vocabulary = match &config.vocabulary_path {
            Some(path) => {
                tracing::info!("Using vocabulary from {}", path.display());
                Vocabulary::from_json_file(path)?
            }
            None => Vocabulary::igbo(),
        };
        Ok(Self::new(scraper, ProverbExtractor::new(vocabulary)?))
    }

    /// HTML 한 페이지를 문서로 변환
    ///
    /// 레코드 0개는 에러가 아닙니다.
    pub fn documents_from_page(
        &self,
        url: &str,
        title: Option<String>,
        html: &str,
        builder: &mut DocumentBuilder,
    ) -> Result<PageExtraction, IngestError> {
        let page = self.isolator.isolate(url, title, html)?;
        let candidates = self.extractor.extract(&page.lines);
        let records = candidates.len();

        let documents: Vec<StoredDocument> = candidates
            .into_iter()
            .map(|candidate| self.categorizer.enrich(candidate, &page))
            .filter_map(|record| builder.build(record))
            .collect();

        tracing::debug!(
            "{}: {} lines, {} records, {} documents",
            url,
            page.lines.len(),
            records,
            documents.len()
        );

        Ok(PageExtraction { records, documents })
    }

    /// 모든 소스를 순서대로 수집 (소스 단위 실패는 보고서에 기록)
    pub async fn collect(&self, urls: &[String]) -> IngestReport {
        let mut builder = DocumentBuilder::new();
        let mut report = IngestReport::default();

        let mut outcomes = Box::pin(self.scraper.fetch_all(urls));
        while let Some(outcome) = outcomes.next().await {
            let result = outcome.result.and_then(|page| {
                self.documents_from_page(&outcome.url, page.title, &page.html, &mut builder)
            });

            let status = match result {
                Ok(extraction) => {
                    tracing::info!(
                        "Extracted {} records from {}",
                        extraction.records,
                        outcome.url
                    );
                    report.documents.extend(extraction.documents);
                    SourceStatus::Extracted {
                        records: extraction.records,
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", outcome.url, e);
                    source_status(e)
                }
            };

            report.sources.push(SourceReport {
                url: outcome.url,
                status,
            });
        }

        tracing::info!(
            "Collected {} documents from {} sources ({} failed)",
            report.documents.len(),
            report.sources.len(),
            report.failed_sources()
        );
        report
    }

    /// 문서를 저장소에 삽입, 부여된 ID 반환
    pub async fn insert(
        documents: &[StoredDocument],
        store: &dyn StoreClient,
    ) -> Result<Vec<String>, IngestError> {
        if documents.is_empty() {
            return Err(IngestError::EmptyInsertionSet);
        }

        store
            .insert_many(documents)
            .await
            .map_err(IngestError::Store)
    }

    /// 컬렉션을 비우고 문서로 교체
    ///
    /// 삽입할 문서가 없으면 기존 컬렉션을 건드리지 않습니다.
    pub async fn replace(
        documents: &[StoredDocument],
        store: &ProverbRetriever,
    ) -> Result<Vec<String>, IngestError> {
        if documents.is_empty() {
            return Err(IngestError::EmptyInsertionSet);
        }

        store.reset().await.map_err(IngestError::Store)?;
        tracing::info!("Collection cleared, inserting {} documents", documents.len());
        Self::insert(documents, store).await
    }

    /// 수집 + 삽입 (`reset`이면 수집이 끝난 뒤 교체)
    pub async fn run(
        &self,
        urls: &[String],
        store: &ProverbRetriever,
        reset: bool,
    ) -> (IngestReport, Result<Vec<String>, IngestError>) {
        let report = self.collect(urls).await;
        let inserted = if reset {
            Self::replace(&report.documents, store).await
        } else {
            Self::insert(&report.documents, store).await
        };
        (report, inserted)
    }
}

/// 소스 단위 에러 → 보고서 상태
fn source_status(error: IngestError) -> SourceStatus {
    match error {
        IngestError::SourceUnavailable { reason, .. } => SourceStatus::Unavailable { reason },
        IngestError::InsufficientContent { length, .. } => {
            SourceStatus::InsufficientContent { length }
        }
        other => SourceStatus::Unavailable {
            reason: other.to_string(),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
