//! Text normalization and keyword matching
//!
//! OCR output is noisy: stray spaces inside words, punctuation glued to
//! keywords, zero-width characters from copy/paste. Everything is compared
//! in normalized form, and lengths are counted in chars.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matching thresholds and weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Keywords shorter than this never fuzzy-match in [`match_score`]
    pub fuzzy_min_length: usize,
    /// Similarity needed for a fuzzy hit in [`match_score`]
    pub fuzzy_threshold: f64,
    /// Multiplier applied to fuzzy and window similarities
    pub fuzzy_weight: f64,
    /// Multiplier for in-order character sequence hits
    pub sequence_weight: f64,
    /// Similarity needed for fuzzy and window hits in [`check_keywords`]
    pub keyword_threshold: f64,
    /// Keywords shorter than this stop after the sequence strategy
    pub window_min_length: usize,
    /// Keywords shorter than this skip whole-text similarity
    pub global_min_length: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            fuzzy_min_length: 5,
            fuzzy_threshold: 0.85,
            fuzzy_weight: 0.7,
            sequence_weight: 0.6,
            keyword_threshold: 0.7,
            window_min_length: 2,
            global_min_length: 4,
        }
    }
}

/// How a keyword matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Sequence,
    Fuzzy,
    Window,
}

/// A keyword found in a text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Keyword as configured, before normalization
    pub keyword: String,
    pub score: f64,
    pub match_type: MatchType,
}

// Whitespace, punctuation (P*), symbols (S*), zero-width characters and BOM
static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\s\p{P}\p{S}\u{200B}-\u{200F}\u{FEFF}]+").expect("Invalid noise character regex")
});

/// Lowercase and strip whitespace, punctuation, symbols and zero-width characters.
///
/// Everything else survives, including combining marks.
pub fn normalize(text: &str) -> String {
    NOISE.replace_all(&text.to_lowercase(), "").into_owned()
}

/// Levenshtein distance over chars, keeping one row of the shorter string
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    if short.is_empty() {
        return long.len();
    }

    let mut previous: Vec<usize> = (0..=short.len()).collect();
    let mut current = vec![0; short.len() + 1];

    for (i, lc) in long.iter().enumerate() {
        current[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let cost = usize::from(lc != sc);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[short.len()]
}

/// `1 - distance / max_len`; 1 for identical strings, 0 if only one is empty
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    1.0 - edit_distance(a, b) as f64 / max_len as f64
}

/// Score a normalized keyword against normalized text.
///
/// 1.0 for containment. Short keywords get no fuzzy credit; longer ones
/// score `fuzzy_weight * similarity` when the whole text is close enough.
pub fn match_score(text: &str, keyword: &str, config: &MatcherConfig) -> f64 {
    if keyword.is_empty() {
        return 0.0;
    }
    if text.contains(keyword) {
        return 1.0;
    }
    if keyword.chars().count() < config.fuzzy_min_length {
        return 0.0;
    }
    let sim = similarity(text, keyword);
    if sim >= config.fuzzy_threshold {
        config.fuzzy_weight * sim
    } else {
        0.0
    }
}

/// True when every char of `keyword` appears in `text` in order
pub fn contains_char_sequence(text: &str, keyword: &str) -> bool {
    let mut wanted = keyword.chars().peekable();
    for c in text.chars() {
        if wanted.peek() == Some(&c) {
            wanted.next();
        }
        if wanted.peek().is_none() {
            return true;
        }
    }
    wanted.peek().is_none()
}

/// Length of the shortest window of `text` holding `keyword` as a subsequence
fn shortest_sequence_span(text: &[char], keyword: &[char]) -> Option<usize> {
    let first = *keyword.first()?;
    let mut best: Option<usize> = None;

    for (start, _) in text.iter().enumerate().filter(|(_, c)| **c == first) {
        let mut k = 1;
        let mut end = start;
        for (offset, c) in text[start + 1..].iter().enumerate() {
            if k == keyword.len() {
                break;
            }
            if *c == keyword[k] {
                k += 1;
                end = start + 1 + offset;
            }
        }
        if k == keyword.len() {
            let span = end - start + 1;
            best = Some(best.map_or(span, |b| b.min(span)));
        }
    }
    best
}

/// Best similarity between `keyword` and any same-length window of `text`
fn best_window_similarity(text: &[char], keyword: &str, len: usize) -> f64 {
    if len == 0 || len > text.len() {
        return 0.0;
    }
    text.windows(len)
        .map(|w| similarity(&w.iter().collect::<String>(), keyword))
        .fold(0.0, f64::max)
}

/// Find which `keywords` occur in `text`, trying progressively looser strategies.
///
/// Every non-exact score is below 1.0.
pub fn check_keywords<S: AsRef<str>>(text: &str, keywords: &[S], config: &MatcherConfig) -> Vec<MatchResult> {
    let normalized_text = normalize(text);
    let text_chars: Vec<char> = normalized_text.chars().collect();
    let mut matches = Vec::new();

    for keyword in keywords {
        let original = keyword.as_ref();
        let normalized = normalize(original);
        let kw_chars: Vec<char> = normalized.chars().collect();
        if kw_chars.is_empty() {
            continue;
        }

        let hit = |score: f64, match_type: MatchType| MatchResult {
            keyword: original.to_string(),
            score,
            match_type,
        };

        if normalized_text.contains(&normalized) {
            matches.push(hit(1.0, MatchType::Exact));
            continue;
        }

        if let Some(span) = shortest_sequence_span(&text_chars, &kw_chars) {
            let score = config.sequence_weight * kw_chars.len() as f64 / span as f64;
            matches.push(hit(score, MatchType::Sequence));
            continue;
        }

        if kw_chars.len() < config.window_min_length {
            continue;
        }

        if kw_chars.len() >= config.global_min_length {
            let sim = similarity(&normalized_text, &normalized);
            if sim >= config.keyword_threshold {
                matches.push(hit(config.fuzzy_weight * sim, MatchType::Fuzzy));
                continue;
            }
        }

        let sim = best_window_similarity(&text_chars, &normalized, kw_chars.len());
        if sim >= config.keyword_threshold {
            matches.push(hit(config.fuzzy_weight * sim, MatchType::Window));
        }
    }

    matches
}
