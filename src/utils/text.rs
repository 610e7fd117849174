//! Small text-normalisation helpers shared by retrieval and fact checking.

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "being", "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing", "each",
    "for", "from", "had", "has", "have", "having", "he", "her", "his", "how", "i", "if", "in",
    "into", "is", "it", "its", "itself", "may", "might", "more", "most", "much", "must", "of",
    "on", "only", "or", "other", "our", "over", "shall", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "very", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nor", "neither", "cannot", "nothing", "nobody",
];

/// Lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Lowercased words joined by single spaces, punctuation removed.
pub fn normalize(text: &str) -> String {
    tokenize(text).join(" ")
}

/// SHA-256 hex digest of the normalised text; equal for texts that differ only
/// in case, whitespace or punctuation.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(normalize(text).as_bytes()))
}

/// Crude suffix stripping so "causes" and "cause" compare equal.
pub fn stem(token: &str) -> String {
    if token.len() > 4 && token.ends_with("ies") {
        format!("{}y", &token[..token.len() - 3])
    } else if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") {
        token[..token.len() - 1].to_string()
    } else {
        token.to_string()
    }
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

fn is_negation(word: &str) -> bool {
    NEGATIONS.contains(&word) || word.ends_with("n't")
}

/// The content-bearing part of a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSignature {
    /// Stemmed tokens with stopwords and negation markers removed
    pub tokens: BTreeSet<String>,
    /// Whether the claim is negated
    pub negated: bool,
}

impl ClaimSignature {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Stemmed content tokens in order of first occurrence, plus whether the text
/// contains a negation marker.
pub fn content_tokens(text: &str) -> (Vec<String>, bool) {
    let mut tokens: Vec<String> = Vec::new();
    let mut negated = false;

    let words = text
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .map(|w| w.trim_matches(|c: char| c == '\'' || c == '\u{2019}').replace('\u{2019}', "'"))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase());

    for word in words {
        if is_negation(&word) {
            negated = true;
            continue;
        }
        let word = word.strip_suffix("'s").unwrap_or(&word).replace('\'', "");
        if word.is_empty() || is_stopword(&word) {
            continue;
        }
        let token = stem(&word);
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }

    (tokens, negated)
}

/// Extract the stemmed content tokens of `text` and its polarity.
pub fn claim_signature(text: &str) -> ClaimSignature {
    let (tokens, negated) = content_tokens(text);
    ClaimSignature {
        tokens: tokens.into_iter().collect(),
        negated,
    }
}

/// Jaccard similarity of two token sets; 0 when both are empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}
