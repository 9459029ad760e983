//! 어휘 설정 - 관련성 판정에 쓰이는 단어 목록
//!
//! 목록은 로직이 아니라 설정입니다. 기본값은 이그보어이며,
//! 다른 언어/도메인은 JSON 파일로 교체할 수 있습니다.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 관련성 판정용 어휘
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    /// 대상 언어의 짧은 기능어/어간 (부분 문자열로 매칭)
    pub tokens: Vec<String>,
    /// 주제 키워드 (1개 이상 매칭 시 관련)
    pub topical_keywords: Vec<String>,
    /// 의미 구조 표지
    pub meaning_markers: Vec<String>,
    /// 보일러플레이트 용어 (포함 시 무조건 제외)
    pub exclude_terms: Vec<String>,
}

const IGBO_TOKENS: &[&str] = &[
    "onye", "nwa", "chi", "ihe", "anyi", "mmadu", "ala", "ulo", "nne", "nna", "obi", "aka",
    "ukwu", "nkita", "okuko", "agu", "egbe", "ugo", "mmiri", "oku", "isi", "anya", "onu", "ndu",
    "ozo", "kwe", "eme", "agwo", "mbe", "ewu", "ji", "bu", "na", "ya", "ka",
];

const TOPICAL_KEYWORDS: &[&str] = &[
    "proverb", "idiom", "saying", "wisdom", "meaning", "translation", "tradition", "culture",
    "elder", "ancestor", "igbo", "ilu",
];

const MEANING_MARKERS: &[&str] = &[":", "—", "–", "means", "meaning:", "translation:"];

const EXCLUDE_TERMS: &[&str] = &[
    "cookie",
    "privacy",
    "menu",
    "login",
    "log in",
    "sign in",
    "sign up",
    "subscribe",
    "newsletter",
    "copyright",
    "all rights reserved",
    "terms of use",
    "advertisement",
    "share this",
    "javascript",
    "click here",
];

/// 관련성 판정에 필요한 최소 어휘 토큰 수
pub const RELEVANT_TOKEN_MATCHES: usize = 2;

impl Vocabulary {
    /// 기본 이그보어 어휘
    pub fn igbo() -> Self {
        let owned =
            |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        Self {
            tokens: owned(IGBO_TOKENS),
            topical_keywords: owned(TOPICAL_KEYWORDS),
            meaning_markers: owned(MEANING_MARKERS),
            exclude_terms: owned(EXCLUDE_TERMS),
        }
    }

    /// JSON 파일에서 로드
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read vocabulary file {}", path.display()))?;
        let vocabulary: Vocabulary =
            serde_json::from_str(&raw).context("Failed to parse vocabulary JSON")?;
        Ok(vocabulary.normalized())
    }

    /// 모든 항목을 소문자로 정규화하고 빈 항목 제거
    pub fn normalized(self) -> Self {
        let normalize = |items: Vec<String>| -> Vec<String> {
            items
                .into_iter()
                .map(|s| s.to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            tokens: normalize(self.tokens),
            topical_keywords: normalize(self.topical_keywords),
            meaning_markers: normalize(self.meaning_markers),
            exclude_terms: normalize(self.exclude_terms),
        }
    }

    /// 제외 용어 포함 여부 (`lower`는 소문자 줄)
    pub fn is_excluded(&self, lower: &str) -> bool {
        self.exclude_terms.iter().any(|term| lower.contains(term.as_str()))
    }

    /// 줄에 등장하는 서로 다른 어휘 토큰 수
    pub fn token_matches(&self, lower: &str) -> usize {
        self.tokens
            .iter()
            .filter(|token| lower.contains(token.as_str()))
            .count()
    }

    /// 문화적 콘텐츠일 가능성 판정
    pub fn is_relevant(&self, line: &str) -> bool {
        self.is_relevant_lower(&line.to_lowercase())
    }

    pub(crate) fn is_relevant_lower(&self, lower: &str) -> bool {
        if self.is_excluded(lower) {
            return false;
        }

        self.token_matches(lower) >= RELEVANT_TOKEN_MATCHES
            || self
                .topical_keywords
                .iter()
                .any(|keyword| lower.contains(keyword.as_str()))
            || self
                .meaning_markers
                .iter()
                .any(|marker| lower.contains(marker.as_str()))
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::igbo()
    }
}
