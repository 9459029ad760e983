//! 웹 스크래퍼 모듈 - 소스 페이지 가져오기
//!
//! 소스 URL 목록을 순서대로 가져옵니다. 한 소스의 실패는 기록만 하고
//! 다음 소스로 넘어가며, 소스 사이에는 고정 대기 시간을 둡니다.

mod isolate;

pub use isolate::{ContentIsolator, RawPage, MIN_CONTENT_LENGTH, MIN_LINE_LENGTH};

use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::stream::{self, Stream, StreamExt};
use scraper::{Html, Selector};

use crate::error::IngestError;

/// 가져온 페이지
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// 원본 HTML
    pub html: String,
    /// 페이지 제목
    pub title: Option<String>,
}

/// 소스 하나의 가져오기 결과
#[derive(Debug)]
pub struct FetchOutcome {
    pub url: String,
    pub result: Result<FetchedPage, IngestError>,
}

/// 웹 스크래퍼
pub struct WebScraper {
    client: reqwest::Client,
    delay: Duration,
}

impl WebScraper {
    /// 새 스크래퍼 생성
    ///
    /// # Arguments
    /// * `user_agent` - 요청 식별 헤더 값
    /// * `timeout` - 요청 타임아웃
    /// * `delay` - 소스 간 대기 시간
    pub fn new(user_agent: &str, timeout: Duration, delay: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, delay })
    }

    /// URL 목록을 순서대로 가져오는 스트림
    ///
    /// 입력 순서를 유지하며, 두 번째 소스부터는 요청 전에 `delay`만큼 대기합니다.
    pub fn fetch_all<'a>(
        &'a self,
        urls: &'a [String],
    ) -> impl Stream<Item = FetchOutcome> + 'a {
        stream::iter(urls.iter().enumerate()).then(move |(i, url)| async move {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.fetch(url).await
        })
    }

    /// 단일 URL 가져오기
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        tracing::info!("Fetching: {}", url);

        let result = match self.fetch_html(url).await {
            Ok(html) => {
                let title = page_title(&html);
                Ok(FetchedPage { html, title })
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {:#}", url, e);
                Err(IngestError::SourceUnavailable {
                    url: url.to_string(),
                    reason: format!("{:#}", e),
                })
            }
        };

        FetchOutcome {
            url: url.to_string(),
            result,
        }
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {}", status);
        }

        response.text().await.context("Failed to read response body")
    }
}

/// HTML에서 제목 추출 (`<title>` → 첫 `<h1>`)
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    extract_title(&document)
}

fn extract_title(document: &Html) -> Option<String> {
    for tag in ["title", "h1"] {
        if let Ok(selector) = Selector::parse(tag) {
            if let Some(element) = document.select(&selector).next() {
                let title = element.text().collect::<Vec<_>>().join(" ");
                let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
                if !title.is_empty() {
                    return Some(title);
                }
            }
        }
    }

    None
}
