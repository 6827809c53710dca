//! Tag classification
//!
//! Scores OCR text against a table of tag categories, each with a keyword
//! vocabulary. Keywords shared by several categories count for less than
//! keywords unique to one. Scoring is pure: the same text and table always
//! give the same ranking.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::debug;

use crate::analysis::text::{check_keywords, match_score, normalize, MatchResult, MatcherConfig};

/// Sentence terminators used to split long text
const SENTENCE_BREAKS: &[char] = &['。', '！', '？', '；', '.', '!', '?', ';', '\n'];

/// A tag category and its keywords
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConfig {
    pub id: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl TagConfig {
    pub fn new(id: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            id: id.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Ordered list of tag categories; read-only once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagTable {
    tags: Vec<TagConfig>,
}

impl Default for TagTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TagTable {
    pub fn new(tags: Vec<TagConfig>) -> Self {
        Self { tags }
    }

    /// Document categories shipped with the application
    pub fn builtin() -> Self {
        Self::new(vec![
            TagConfig::new("identity_card", &["居民身份证", "身份证", "公民身份", "ID Card", "Identity Card"]),
            TagConfig::new("driver_license", &["驾驶证", "机动车驾驶证", "Driver License", "Driving License"]),
            TagConfig::new("passport", &["护照", "Passport", "PASSPORT", "中华人民共和国护照"]),
            TagConfig::new("business_license", &["营业执照", "工商营业执照", "Business License", "统一社会信用代码"]),
            TagConfig::new("residence_permit", &["居住证", "暂住证", "Residence Permit"]),
            TagConfig::new("student_id", &["学生证", "Student ID", "学生卡"]),
            TagConfig::new("employee_id", &["工作证", "员工证", "Employee ID", "职工证"]),
            TagConfig::new(
                "bank_card",
                &["银行卡", "储蓄卡", "信用卡", "Bank Card", "Credit Card", "Debit Card"],
            ),
            TagConfig::new("social_security_card", &["社保卡", "社会保障卡", "Social Security Card"]),
            TagConfig::new("medical_insurance_card", &["医保卡", "医疗保险卡", "Medical Insurance Card"]),
            TagConfig::new("contract", &["合同", "协议", "Contract", "Agreement", "合作协议", "服务合同"]),
            TagConfig::new("report", &["报告", "分析报告", "Report", "调研报告", "工作报告", "研究报告"]),
            TagConfig::new("notice", &["公告", "通知", "Notice", "声明", "公示"]),
            TagConfig::new("resume", &["简历", "履历", "Resume", "CV", "个人简历"]),
            TagConfig::new("transcript", &["成绩单", "Transcript", "学习成绩", "考试成绩"]),
            TagConfig::new("other", &[]),
        ])
    }

    pub fn tags(&self) -> &[TagConfig] {
        &self.tags
    }

    pub fn get(&self, id: &str) -> Option<&TagConfig> {
        self.tags.iter().find(|t| t.id == id)
    }

    /// Every tag id in table order, including keyword-less ones
    pub fn all_tag_ids(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Scoring weights and output limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub max_chunk_length: usize,
    /// Sentences must be longer than this to count as a chunk
    pub min_chunk_length: usize,
    pub max_results: usize,
    /// Weight multiplier floor for a fully shared keyword
    pub base_weight: f64,
    /// Extra multiplier scaled by exclusivity
    pub exclusivity_boost: f64,
    /// Bonus per unit of summed hit weight
    pub multi_hit_bonus: f64,
    /// Returned when nothing matches
    pub default_tags: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_chunk_length: 800,
            min_chunk_length: 8,
            max_results: 3,
            base_weight: 0.7,
            exclusivity_boost: 0.6,
            multi_hit_bonus: 0.18,
            default_tags: vec!["other".to_string()],
        }
    }
}

/// Final score of one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagScore {
    pub id: String,
    pub score: f64,
    /// Mean exclusivity weight of the category's keywords
    pub average_weight: f64,
    /// Distinct normalized keywords that matched somewhere
    pub hits: Vec<String>,
    /// How many of `hits` occur verbatim in the normalized text
    pub exact_hits: usize,
}

impl TagScore {
    /// Ranking order: score, then exact hits, then keyword exclusivity.
    ///
    /// The 1.0 cap lets a strong fuzzy hit reach the same score as an exact
    /// one; the exact-hit count keeps the exact match ahead.
    pub fn rank_cmp(&self, other: &TagScore) -> std::cmp::Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.exact_hits.cmp(&other.exact_hits))
            .then(self.average_weight.total_cmp(&other.average_weight))
    }
}

/// Split text into scoring units.
///
/// Sentences longer than `min_len` chars are kept (and sliced if over
/// `max_len`). With fewer than two such sentences the text is cut into
/// fixed `max_len`-char slices instead.
pub fn chunk_text(text: &str, max_len: usize, min_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let sentences: Vec<&str> = text
        .split(SENTENCE_BREAKS)
        .map(str::trim)
        .filter(|s| s.chars().count() > min_len)
        .collect();

    if sentences.len() >= 2 {
        return sentences
            .into_iter()
            .flat_map(|s| slice_chars(s, max_len))
            .collect();
    }

    slice_chars(text.trim(), max_len)
}

fn slice_chars(text: &str, len: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(len)
        .map(|c| c.iter().collect::<String>())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// Keyword weights and per-category keyword lists for one call
struct KeywordIndex {
    /// Normalized keyword -> exclusivity weight
    weights: BTreeMap<String, f64>,
    /// (table position, normalized keywords) for categories with keywords
    categories: Vec<(usize, Vec<String>)>,
}

impl KeywordIndex {
    fn build(table: &TagTable) -> Self {
        let mut owners: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
        let mut categories = Vec::new();

        for (position, tag) in table.tags().iter().enumerate() {
            let mut keywords: Vec<String> = Vec::new();
            for keyword in &tag.keywords {
                let normalized = normalize(keyword);
                if normalized.is_empty() || keywords.contains(&normalized) {
                    continue;
                }
                owners.entry(normalized.clone()).or_default().insert(position);
                keywords.push(normalized);
            }
            if !keywords.is_empty() {
                categories.push((position, keywords));
            }
        }

        let weights = owners
            .into_iter()
            .map(|(keyword, tags)| (keyword, 1.0 / tags.len() as f64))
            .collect();

        Self { weights, categories }
    }

    fn weight(&self, keyword: &str) -> f64 {
        self.weights.get(keyword).copied().unwrap_or(0.0)
    }
}

/// Ranks tag categories for a text
#[derive(Debug, Clone, Default)]
pub struct TagClassifier {
    table: TagTable,
    config: ClassifierConfig,
    matcher: MatcherConfig,
}

impl TagClassifier {
    pub fn new(table: TagTable) -> Self {
        Self::with_config(table, ClassifierConfig::default(), MatcherConfig::default())
    }

    pub fn with_config(table: TagTable, config: ClassifierConfig, matcher: MatcherConfig) -> Self {
        Self {
            table,
            config,
            matcher,
        }
    }

    pub fn table(&self) -> &TagTable {
        &self.table
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Top tag ids for `text`, or the configured default tags
    pub fn generate_tags(&self, text: &str) -> Vec<String> {
        self.generate_tags_with(text, &self.config.default_tags, self.config.max_results)
    }

    /// Top `max_results` tag ids for `text`, or `default_tags` when nothing scores
    pub fn generate_tags_with(&self, text: &str, default_tags: &[String], max_results: usize) -> Vec<String> {
        let ranked: Vec<String> = self
            .score_tags(text)
            .into_iter()
            .take(max_results)
            .map(|s| s.id)
            .collect();

        if ranked.is_empty() {
            default_tags.to_vec()
        } else {
            ranked
        }
    }

    /// Every category with a positive score, best first
    pub fn score_tags(&self, text: &str) -> Vec<TagScore> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let start = Instant::now();
        let index = KeywordIndex::build(&self.table);
        let chunks: Vec<String> = chunk_text(text, self.config.max_chunk_length, self.config.min_chunk_length)
            .iter()
            .map(|c| normalize(c))
            .filter(|c| !c.is_empty())
            .collect();

        let mut scores: Vec<TagScore> = Vec::new();
        for (position, keywords) in &index.categories {
            let mut best = 0.0_f64;
            let mut hits: Vec<String> = Vec::new();
            let mut exact: Vec<&String> = Vec::new();

            for chunk in &chunks {
                for keyword in keywords {
                    let score = match_score(chunk, keyword, &self.matcher);
                    if score <= 0.0 {
                        continue;
                    }
                    let weight = index.weight(keyword);
                    let weighted = score * (self.config.base_weight + self.config.exclusivity_boost * weight);
                    best = best.max(weighted);
                    if chunk.contains(keyword.as_str()) && !exact.contains(&keyword) {
                        exact.push(keyword);
                    }
                    if !hits.contains(keyword) {
                        hits.push(keyword.clone());
                    }
                }
            }

            if hits.is_empty() {
                continue;
            }

            let hit_weight: f64 = hits.iter().map(|k| index.weight(k)).sum();
            let bonus = (self.config.multi_hit_bonus * hit_weight).min(1.0);
            let average_weight =
                keywords.iter().map(|k| index.weight(k)).sum::<f64>() / keywords.len() as f64;

            scores.push(TagScore {
                id: self.table.tags()[*position].id.clone(),
                score: (best + bonus).min(1.0),
                average_weight,
                hits,
                exact_hits: exact.len(),
            });
        }

        // Stable sort keeps table order for full ties
        scores.sort_by(|a, b| b.rank_cmp(a));

        debug!(
            "Scored {} chunks against {} categories in {:?}: {} matched",
            chunks.len(),
            index.categories.len(),
            start.elapsed(),
            scores.len()
        );
        scores
    }

    /// Per-category keyword hits using the multi-strategy matcher
    pub fn explain(&self, text: &str) -> Vec<(String, Vec<MatchResult>)> {
        self.table
            .tags()
            .iter()
            .filter(|t| !t.keywords.is_empty())
            .map(|t| (t.id.clone(), check_keywords(text, &t.keywords, &self.matcher)))
            .filter(|(_, hits)| !hits.is_empty())
            .collect()
    }
}
