//! Heuristic relevance scoring for knowledge entries.
//!
//! A score is the sum of four independent signals, each weighted by a field of
//! [`ScoreWeights`]:
//!
//! | signal | default weight |
//! |---|---|
//! | the entry's key text occurs inside the query | 5 |
//! | some query token occurs inside the key text | 4 |
//! | each token shared by query and content | 1.5 |
//! | each phrase (key text, or content word of 3+ chars) found in the query | 3 |
//!
//! Everything is compared lowercased. Tokens are maximal runs of Unicode letters,
//! digits and underscores; combining marks (Devanagari vowel signs, decomposed
//! accents) split tokens rather than extend them. The phrase signal walks
//! content words in order and does not deduplicate them, so a word repeated in
//! the content counts each time.
//!
//! Scores only rank entries against each other. They are not probabilities and
//! are not comparable across queries.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Letters, digits and underscore. Combining marks end a token.
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}_]+").expect("word pattern is valid"));

/// Minimum length, in characters, of a content word considered as a phrase.
const MIN_PHRASE_WORD_CHARS: usize = 3;

/// Weights applied to each scoring signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    /// Key text is a substring of the query
    pub key_in_query: f64,
    /// Any query token is a substring of the key text
    pub query_token_in_key: f64,
    /// Per token present in both query and content
    pub content_token_overlap: f64,
    /// Per phrase candidate found inside the query
    pub phrase_match: f64,
}

impl ScoreWeights {
    pub const DEFAULT: Self = Self {
        key_in_query: 5.0,
        query_token_in_key: 4.0,
        content_token_overlap: 1.5,
        phrase_match: 3.0,
    };
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Word tokens of `text` in order of occurrence, duplicates included.
pub fn tokenize(text: &str) -> Vec<&str> {
    WORD.find_iter(text).map(|m| m.as_str()).collect()
}

/// A query lowercased and tokenized once, reused across every entry in a scan.
#[derive(Debug, Clone)]
pub struct QueryTerms {
    text: String,
    tokens: HashSet<String>,
}

impl QueryTerms {
    pub fn new(query: &str) -> Self {
        let text = query.to_lowercase();
        let tokens = tokenize(&text).into_iter().map(str::to_owned).collect();
        Self { text, tokens }
    }

    /// The lowercased query.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &HashSet<String> {
        &self.tokens
    }
}

/// Score one entry's key text and content against a prepared query.
pub fn score(query: &QueryTerms, key_text: &str, content: &str, weights: &ScoreWeights) -> f64 {
    let key = key_text.to_lowercase();
    let content = content.to_lowercase();
    let content_words = tokenize(&content);

    let mut total = 0.0;

    if query.text.contains(key.as_str()) {
        total += weights.key_in_query;
    }

    if query.tokens.iter().any(|token| key.contains(token.as_str())) {
        total += weights.query_token_in_key;
    }

    let content_tokens: HashSet<&str> = content_words.iter().copied().collect();
    let shared = query
        .tokens
        .iter()
        .filter(|token| content_tokens.contains(token.as_str()))
        .count();
    total += shared as f64 * weights.content_token_overlap;

    let phrases = std::iter::once(key.as_str()).chain(
        content_words
            .iter()
            .copied()
            .filter(|word| word.chars().count() >= MIN_PHRASE_WORD_CHARS),
    );
    for phrase in phrases {
        if phrase.chars().count() > 2 && query.text.contains(phrase) {
            total += weights.phrase_match;
        }
    }

    total
}

/// Convenience wrapper that prepares `query` and scores with the default weights.
pub fn score_text(query: &str, key_text: &str, content: &str) -> f64 {
    score(
        &QueryTerms::new(query),
        key_text,
        content,
        &ScoreWeights::DEFAULT,
    )
}
