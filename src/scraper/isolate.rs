//! 본문 분리 - 보일러플레이트 제거 및 본문 영역 선택

use scraper::{ElementRef, Html, Selector};

use crate::error::IngestError;

/// 페이지 최소 콘텐츠 길이 (문자 수)
pub const MIN_CONTENT_LENGTH: usize = 300;
/// 줄 최소 길이 - 이 길이 이하의 줄은 내비게이션 조각으로 보고 버림
pub const MIN_LINE_LENGTH: usize = 10;

/// 텍스트를 읽기 전에 트리에서 제거할 요소
const NOISE_SELECTOR: &str =
    "script, style, noscript, nav, header, footer, form, aside, button, iframe, select, textarea, svg";

/// 본문 영역 후보 (우선순위 순, 첫 매치 사용)
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=main]",
    "#mw-content-text",
    ".entry-content",
    ".post-content",
    ".post-body",
    ".content",
    "#content",
];

/// 줄 경계로 취급하는 블록 요소
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "dl", "dt", "dd", "h1", "h2", "h3", "h4", "h5", "h6", "br",
    "hr", "tr", "td", "th", "table", "blockquote", "pre", "section", "article", "main",
    "figcaption",
];

/// 정제된 페이지
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: String,
    pub title: Option<String>,
    /// 정제된 텍스트 줄 (순서 유지)
    pub lines: Vec<String>,
    /// 원본 도메인
    pub domain: Option<String>,
}

/// 본문 분리기
#[derive(Debug, Clone)]
pub struct ContentIsolator {
    min_line_length: usize,
    min_content_length: usize,
}

impl Default for ContentIsolator {
    fn default() -> Self {
        Self {
            min_line_length: MIN_LINE_LENGTH,
            min_content_length: MIN_CONTENT_LENGTH,
        }
    }
}

impl ContentIsolator {
    /// HTML을 정제된 페이지로 변환
    ///
    /// 정제 후 콘텐츠가 최소 길이 미만이면 `InsufficientContent`를 반환합니다.
    pub fn isolate(
        &self,
        url: &str,
        title: Option<String>,
        html: &str,
    ) -> Result<RawPage, IngestError> {
        let lines = self.clean_lines(html);
        let length = lines.join("\n").chars().count();

        if length < self.min_content_length {
            return Err(IngestError::InsufficientContent {
                url: url.to_string(),
                length,
                minimum: self.min_content_length,
            });
        }

        tracing::debug!("Isolated {} lines ({} chars) from {}", lines.len(), length, url);

        Ok(RawPage {
            url: url.to_string(),
            title,
            lines,
            domain: domain_of(url),
        })
    }

    /// 보일러플레이트 제거 후 본문 영역의 텍스트 줄 추출
    pub fn clean_lines(&self, html: &str) -> Vec<String> {
        let mut document = Html::parse_document(html);
        strip_noise(&mut document);

        let mut text = String::new();
        if let Some(region) = main_region(&document) {
            collect_block_text(region, &mut text);
        }

        text.lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| line.chars().count() > self.min_line_length)
            .collect()
    }
}

/// 비본문 요소를 트리에서 분리
fn strip_noise(document: &mut Html) {
    let Ok(selector) = Selector::parse(NOISE_SELECTOR) else {
        return;
    };

    let ids: Vec<_> = document.select(&selector).map(|element| element.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// 본문 영역 선택 (없으면 body)
fn main_region(document: &Html) -> Option<ElementRef<'_>> {
    for selector_str in CONTENT_SELECTORS.iter().chain(["body"].iter()) {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                return Some(element);
            }
        }
    }

    None
}

/// 블록 요소 경계에 줄바꿈을 넣으며 텍스트 수집
fn collect_block_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let is_block = BLOCK_TAGS.contains(&child_element.value().name());
            if is_block {
                out.push('\n');
            }
            collect_block_text(child_element, out);
            if is_block {
                out.push('\n');
            }
        }
    }
}

fn domain_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}
