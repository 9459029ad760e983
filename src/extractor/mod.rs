//! 속담 추출 모듈 - 규칙 기반 줄 분류기
//!
//! 정제된 텍스트 줄을 순서대로 훑으며 우선순위 규칙 체인을 적용합니다.
//! 첫 번째로 매칭된 규칙이 줄을 소비하며, 규칙 순서가 곧 우선순위입니다.
//!
//! 1. 대시 쌍 (`원문 - 번역`)
//! 2. 콜론 쌍 (`원문: 번역`)
//! 3. 설명형 (`원문 means 번역`)
//! 4. 번호형 (`1. 원문` + 다음 줄 번역)
//! 5. 단독형 (어휘 토큰 3개 이상)

mod vocabulary;

pub use vocabulary::{Vocabulary, RELEVANT_TOKEN_MATCHES};

use std::fmt;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 후보 레코드를 만든 규칙
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    #[serde(rename = "pair_dash")]
    PairDash,
    #[serde(rename = "pair_colon")]
    PairColon,
    #[serde(rename = "explained")]
    Explained,
    #[serde(rename = "numbered")]
    Numbered,
    #[serde(rename = "standalone_repeated_terms")]
    Standalone,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::PairDash => "pair_dash",
            PatternKind::PairColon => "pair_colon",
            PatternKind::Explained => "explained",
            PatternKind::Numbered => "numbered",
            PatternKind::Standalone => "standalone_repeated_terms",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 추출된 속담 후보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// 원문 (이그보어)
    pub source_text: String,
    /// 번역 (없으면 빈 문자열)
    pub translation: String,
    pub pattern_kind: PatternKind,
}

// ============================================================================
// Rule Table
// ============================================================================

/// 콜론 앞 원문의 최소 길이 (초과)
const COLON_PREFIX_MIN: usize = 10;
/// 설명형 줄의 최소 길이 (초과)
const EXPLAINED_LINE_MIN: usize = 20;
/// 설명형 양쪽 최소 길이 (초과)
const EXPLAINED_SIDE_MIN: usize = 5;
/// 번호형 본문 최소 길이 (초과)
const NUMBERED_REMAINDER_MIN: usize = 15;
/// 번호형 다음 줄(번역) 최소 길이 (초과)
const NUMBERED_TRANSLATION_MIN: usize = 10;
/// 단독형 줄 최소 길이 (초과)
const STANDALONE_LINE_MIN: usize = 15;
/// 단독형에 필요한 어휘 토큰 수
const STANDALONE_TOKEN_MATCHES: usize = 3;

/// 설명형 구분자 (선호 순서)
const EXPLAINED_SEPARATORS: &[&str] = &[" means ", " meaning ", " means:", " meaning:"];

/// 분류 대상 줄
struct Line<'a> {
    text: &'a str,
    lower: String,
    next: Option<&'a str>,
    relevant: bool,
}

/// 규칙 매칭 결과
struct RuleMatch {
    source_text: String,
    translation: String,
}

impl RuleMatch {
    fn pair(source_text: &str, translation: &str) -> Self {
        Self {
            source_text: source_text.trim().to_string(),
            translation: translation.trim().to_string(),
        }
    }
}

type RuleFn = fn(&ProverbExtractor, &Line<'_>) -> Option<RuleMatch>;

/// 우선순위 규칙 체인 (순서 변경 금지)
const RULES: &[(PatternKind, RuleFn)] = &[
    (PatternKind::PairDash, ProverbExtractor::match_dash_pair),
    (PatternKind::PairColon, ProverbExtractor::match_colon_pair),
    (PatternKind::Explained, ProverbExtractor::match_explained),
    (PatternKind::Numbered, ProverbExtractor::match_numbered),
    (PatternKind::Standalone, ProverbExtractor::match_standalone),
];

// ============================================================================
// ProverbExtractor
// ============================================================================

/// 규칙 기반 속담 추출기
///
/// 생성 후 불변이므로 여러 페이지/요청에서 공유할 수 있습니다.
pub struct ProverbExtractor {
    vocabulary: Vocabulary,
    meaning_re: Regex,
    numbered_re: Regex,
}

impl ProverbExtractor {
    /// 어휘를 지정하여 생성
    pub fn new(vocabulary: Vocabulary) -> Result<Self> {
        Ok(Self {
            vocabulary,
            meaning_re: Regex::new(r"(?i)\bmean(s|ing)?\b").context("Invalid meaning pattern")?,
            numbered_re: Regex::new(r"^\d+\.\s+(.*)$").context("Invalid numbered pattern")?,
        })
    }

    /// 기본 이그보어 어휘로 생성
    pub fn igbo() -> Result<Self> {
        Self::new(Vocabulary::igbo())
    }

    /// 한 페이지의 줄 목록에서 후보 레코드 추출 (줄 순서 유지)
    ///
    /// 번호형의 번역으로 쓰인 다음 줄도 자기 차례에 다시 분류됩니다.
    pub fn extract(&self, lines: &[String]) -> Vec<CandidateRecord> {
        lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| {
                let next = lines.get(i + 1).map(|s| s.trim());
                self.classify(line.trim(), next)
            })
            .collect()
    }

    /// 단일 줄 분류 (다음 줄 없음)
    pub fn extract_line(&self, line: &str) -> Option<CandidateRecord> {
        self.classify(line.trim(), None)
    }

    fn classify(&self, text: &str, next: Option<&str>) -> Option<CandidateRecord> {
        if text.is_empty() {
            return None;
        }

        let lower = text.to_lowercase();
        // 제외 용어는 체인 이전에 거름
        if self.vocabulary.is_excluded(&lower) {
            return None;
        }

        let relevant = self.vocabulary.is_relevant_lower(&lower);
        let line = Line {
            text,
            lower,
            next,
            relevant,
        };

        RULES.iter().find_map(|(kind, rule)| {
            rule(self, &line).map(|m| {
                tracing::trace!("{} matched: {}", kind, line.text);
                CandidateRecord {
                    source_text: m.source_text,
                    translation: m.translation,
                    pattern_kind: *kind,
                }
            })
        })
    }

    fn match_dash_pair(&self, line: &Line<'_>) -> Option<RuleMatch> {
        if !line.relevant {
            return None;
        }
        let (source, translation) = line.text.split_once(" - ")?;
        Some(RuleMatch::pair(source, translation))
    }

    fn match_colon_pair(&self, line: &Line<'_>) -> Option<RuleMatch> {
        if !line.relevant {
            return None;
        }
        let (source, translation) = line.text.split_once(':')?;
        if char_len(source.trim()) <= COLON_PREFIX_MIN {
            return None;
        }
        Some(RuleMatch::pair(source, translation))
    }

    fn match_explained(&self, line: &Line<'_>) -> Option<RuleMatch> {
        if char_len(line.text) <= EXPLAINED_LINE_MIN || !self.meaning_re.is_match(line.text) {
            return None;
        }

        // ASCII 소문자화는 바이트 위치를 보존함
        let folded = line.text.to_ascii_lowercase();
        let (pos, separator) = EXPLAINED_SEPARATORS
            .iter()
            .find_map(|sep| folded.find(sep).map(|pos| (pos, *sep)))?;

        let source = line.text[..pos].trim();
        let translation = line.text[pos + separator.len()..].trim();
        if char_len(source) <= EXPLAINED_SIDE_MIN || char_len(translation) <= EXPLAINED_SIDE_MIN {
            return None;
        }

        Some(RuleMatch::pair(source, translation))
    }

    fn match_numbered(&self, line: &Line<'_>) -> Option<RuleMatch> {
        if !line.relevant {
            return None;
        }
        let captures = self.numbered_re.captures(line.text)?;
        let remainder = captures.get(1)?.as_str().trim();
        if char_len(remainder) <= NUMBERED_REMAINDER_MIN {
            return None;
        }

        let translation = line.next.filter(|next| {
            !next.starts_with(|c: char| c.is_ascii_digit())
                && char_len(next) > NUMBERED_TRANSLATION_MIN
                && !self.vocabulary.is_excluded(&next.to_lowercase())
        });

        Some(RuleMatch {
            source_text: remainder.to_string(),
            translation: translation.map(str::to_string).unwrap_or_default(),
        })
    }

    fn match_standalone(&self, line: &Line<'_>) -> Option<RuleMatch> {
        if !line.relevant
            || char_len(line.text) <= STANDALONE_LINE_MIN
            || self.vocabulary.token_matches(&line.lower) < STANDALONE_TOKEN_MATCHES
        {
            return None;
        }
        Some(RuleMatch {
            source_text: line.text.to_string(),
            translation: String::new(),
        })
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

// ============================================================================
// Tests
// ============================================================================
