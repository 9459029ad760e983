//! 분류 모듈 - 키워드 기반 주제 태그 부여
//!
//! 추출기와 달리 첫 매치에서 멈추지 않습니다. 매칭되는 모든 규칙의 태그를
//! 규칙 순서대로 부여하며, 하나도 없으면 `general`을 부여합니다.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::extractor::{CandidateRecord, PatternKind};
use crate::scraper::RawPage;

/// 매칭 규칙이 없을 때의 기본 태그
pub const GENERAL_CATEGORY: &str = "general";

/// 기본 분류 규칙 (순서 = 태그 순서)
const CATEGORY_RULES: &[(&str, &[&str])] = &[
    (
        "wisdom",
        &["wisdom", "wise", "elder", "elders", "knowledge", "patience", "learn", "understand", "advice"],
    ),
    (
        "family",
        &["mother", "father", "child", "children", "family", "brother", "sister", "nne", "nna", "nwa"],
    ),
    (
        "social",
        &["community", "neighbor", "neighbour", "friend", "people", "together", "kinsmen", "unity", "share", "agree"],
    ),
    (
        "spiritual",
        &["god", "gods", "chi", "spirit", "ancestor", "ancestors", "destiny", "oracle", "prayer"],
    ),
    (
        "nature",
        &["kite", "eagle", "goat", "dog", "chicken", "hen", "tortoise", "snake", "lion", "tree", "rain", "river", "fire", "egbe", "ugo", "mbe", "agu"],
    ),
    (
        "work",
        &["work", "farm", "farmer", "yam", "market", "labour", "labor", "wealth", "money", "harvest"],
    ),
    (
        "character",
        &["respect", "honest", "truth", "pride", "greed", "humble", "behaviour", "behavior", "character", "lazy"],
    ),
    (
        "consequence",
        &["consequence", "regret", "reward", "punish", "trouble", "danger", "warning", "burden"],
    ),
];

/// 분류 규칙
#[derive(Debug, Clone)]
struct CategoryRule {
    tag: String,
    keywords: Vec<String>,
}

/// 출처 정보와 태그가 붙은 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub source_text: String,
    pub translation: String,
    pub pattern_kind: PatternKind,
    pub origin_url: String,
    pub origin_title: Option<String>,
    pub origin_domain: Option<String>,
    /// 항상 1개 이상
    pub categories: Vec<String>,
    pub has_translation: bool,
    /// 원문 단어 수
    pub term_count: usize,
}

/// 키워드 기반 분류기
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<CategoryRule>,
}

impl Default for Categorizer {
    fn default() -> Self {
        let rules = CATEGORY_RULES
            .iter()
            .map(|(tag, keywords)| CategoryRule {
                tag: tag.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            })
            .collect();
        Self { rules }
    }
}

impl Categorizer {
    /// 텍스트에 태그 부여 (순수 함수)
    pub fn categorize(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let words: HashSet<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut categories: Vec<String> = Vec::new();
        for rule in &self.rules {
            let matched = rule.keywords.iter().any(|k| words.contains(k.as_str()));
            if matched && !categories.contains(&rule.tag) {
                categories.push(rule.tag.clone());
            }
        }

        if categories.is_empty() {
            categories.push(GENERAL_CATEGORY.to_string());
        }
        categories
    }

    /// 후보 레코드에 출처 정보와 태그를 붙임
    pub fn enrich(&self, record: CandidateRecord, page: &RawPage) -> EnrichedRecord {
        let combined = format!("{} {}", record.source_text, record.translation);
        let categories = self.categorize(&combined);
        let has_translation = !record.translation.trim().is_empty();
        let term_count = record.source_text.split_whitespace().count();

        EnrichedRecord {
            source_text: record.source_text,
            translation: record.translation,
            pattern_kind: record.pattern_kind,
            origin_url: page.url.clone(),
            origin_title: page.title.clone(),
            origin_domain: page.domain.clone(),
            categories,
            has_translation,
            term_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> RawPage {
        RawPage {
            url: "https://www.zikoko.com/life/15-igbo-proverbs-and-their-meanings/".to_string(),
            title: Some("15 Igbo Proverbs".to_string()),
            lines: vec![],
            domain: Some("www.zikoko.com".to_string()),
        }
    }

    #[test]
    fn test_no_match_is_general() {
        let categorizer = Categorizer::default();
        assert_eq!(categorizer.categorize("bere rere"), vec!["general".to_string()]);
        assert_eq!(categorizer.categorize(""), vec!["general".to_string()]);
    }

    #[test]
    fn test_multiple_tags_in_rule_order() {
        let categorizer = Categorizer::default();
        let tags = categorizer.categorize("A wise mother feeds the goat before the market");
        assert_eq!(tags, vec!["wisdom", "family", "nature", "work"]);
    }

    #[test]
    fn test_whole_word_matching() {
        let categorizer = Categorizer::default();
        // "godly"는 "god"과 다른 단어
        assert_eq!(categorizer.categorize("godly"), vec!["general".to_string()]);
        assert_eq!(categorizer.categorize("Chi ya"), vec!["spiritual".to_string()]);
    }

    #[test]
    fn test_monotonic_when_keyword_added() {
        let categorizer = Categorizer::default();
        let base = categorizer.categorize("let the kite perch");
        let extended = categorizer.categorize("let the kite perch, says the elder");

        for tag in &base {
            assert!(extended.contains(tag), "lost tag {}", tag);
        }
        assert!(extended.contains(&"wisdom".to_string()));
    }

    #[test]
    fn test_idempotent() {
        let categorizer = Categorizer::default();
        let text = "onye kwe chi ya ekwe one who agrees, their god agrees too";
        assert_eq!(categorizer.categorize(text), categorizer.categorize(text));
    }

    #[test]
    fn test_custom_rules_dedupe_tags() {
        let categorizer = Categorizer {
            rules: vec![
                CategoryRule {
                    tag: "animals".to_string(),
                    keywords: vec!["goat".to_string()],
                },
                CategoryRule {
                    tag: "animals".to_string(),
                    keywords: vec!["dog".to_string()],
                },
            ],
        };
        assert_eq!(categorizer.categorize("goat and dog"), vec!["animals".to_string()]);
    }

    #[test]
    fn test_enrich_derives_fields() {
        let categorizer = Categorizer::default();
        let record = CandidateRecord {
            source_text: "Egbe bere ugo bere".to_string(),
            translation: "let the kite perch, let the eagle perch too".to_string(),
            pattern_kind: PatternKind::PairDash,
        };

        let enriched = categorizer.enrich(record, &page());

        assert_eq!(enriched.categories, vec!["nature".to_string()]);
        assert!(enriched.has_translation);
        assert_eq!(enriched.term_count, 4);
        assert_eq!(enriched.origin_domain.as_deref(), Some("www.zikoko.com"));
        assert_eq!(enriched.origin_title.as_deref(), Some("15 Igbo Proverbs"));
    }

    #[test]
    fn test_enrich_whitespace_translation_is_absent() {
        let categorizer = Categorizer::default();
        let record = CandidateRecord {
            source_text: "Nwa nkita anaghi ama ihe ala".to_string(),
            translation: "   ".to_string(),
            pattern_kind: PatternKind::Standalone,
        };

        let enriched = categorizer.enrich(record, &page());
        assert!(!enriched.has_translation);
        // nwa → family
        assert_eq!(enriched.categories, vec!["family".to_string()]);
    }
}
