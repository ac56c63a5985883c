//! Topical relevance between content items
//!
//! Term vectors are weighted bags of normalized terms:
//! - title terms x3
//! - heading terms x2
//! - remaining visible body text x1
//!
//! Scoring uses TF-IDF over the candidate set followed by cosine similarity,
//! scaled to 0-100.

pub mod stopwords;

use crate::structure::{analyze, decode_entities};
use linkforge_common::types::{primary_language, ContentItem};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

const TITLE_WEIGHT: f64 = 3.0;
const HEADING_WEIGHT: f64 = 2.0;
const BODY_WEIGHT: f64 = 1.0;

/// Tokens shorter than this (in chars) are dropped
const MIN_TOKEN_CHARS: usize = 3;

/// Shared terms reported per scored candidate
const MAX_SHARED_TERMS: usize = 10;

/// Weighted terms of one content version
///
/// Terms are kept sorted by weight descending, then term ascending, so two
/// vectors built from the same content serialize identically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermVector {
    pub content_id: Uuid,

    /// Version marker of the content the vector was built from
    pub version: String,

    pub terms: Vec<(String, f64)>,
}

impl TermVector {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn weight(&self, term: &str) -> Option<f64> {
        self.terms.iter().find(|(t, _)| t == term).map(|(_, w)| *w)
    }
}

/// Relevance of one candidate to a source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredCandidate {
    pub candidate_id: Uuid,

    /// Cosine similarity x 100
    pub score: f64,

    /// Terms in both vectors, strongest first
    pub shared_terms: Vec<String>,
}

/// Split text into normalized terms for a language
pub fn tokenize(text: &str, language: &str) -> Vec<String> {
    let language = primary_language(language);
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_lowercase)
        .filter(|token| !stopwords::is_stop_word(&language, token))
        .collect()
}

/// Term extraction and TF-IDF scoring
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    max_terms: usize,
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self { max_terms: 100 }
    }
}

impl RelevanceScorer {
    pub fn new(max_terms: usize) -> Self {
        Self { max_terms }
    }

    /// Build the term vector of an item's current version
    pub fn extract_terms(&self, item: &ContentItem) -> TermVector {
        let analysis = analyze(&item.body);
        let mut weights: HashMap<String, f64> = HashMap::new();

        let mut add = |text: &str, weight: f64| {
            for term in tokenize(text, &item.language) {
                *weights.entry(term).or_insert(0.0) += weight;
            }
        };

        add(decode_entities(&item.title).as_ref(), TITLE_WEIGHT);
        for heading in &analysis.headings {
            add(heading.text.as_str(), HEADING_WEIGHT);
        }
        add(analysis.text.as_str(), BODY_WEIGHT);

        let mut terms: Vec<(String, f64)> = weights.into_iter().collect();
        terms.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        terms.truncate(self.max_terms);

        TermVector {
            content_id: item.id,
            version: item.version_marker(),
            terms,
        }
    }

    /// Score candidates against a source.
    ///
    /// IDF is computed over the candidate set plus the source. Results are
    /// sorted by score descending, ties by candidate id.
    pub fn score(&self, source: &TermVector, candidates: &[&TermVector]) -> Vec<ScoredCandidate> {
        let total_docs = (candidates.len() + 1) as f64;

        let mut df: HashMap<&str, usize> = HashMap::new();
        for vector in std::iter::once(source).chain(candidates.iter().copied()) {
            for (term, _) in &vector.terms {
                *df.entry(term.as_str()).or_insert(0) += 1;
            }
        }
        let idf = |term: &str| -> f64 {
            let df = df.get(term).copied().unwrap_or(1).max(1) as f64;
            (total_docs / df).ln() + 1.0
        };

        // Sums run in term-vector order so equal inputs give bit-equal scores
        let weighted = |vector: &TermVector| -> Vec<(String, f64)> {
            vector
                .terms
                .iter()
                .map(|(term, tf)| (term.clone(), tf * idf(term.as_str())))
                .collect()
        };

        let source_weights = weighted(source);
        let source_norm = norm(&source_weights);
        let source_lookup: HashMap<&str, f64> = source_weights
            .iter()
            .map(|(term, w)| (term.as_str(), *w))
            .collect();

        let mut results: Vec<ScoredCandidate> = candidates
            .iter()
            .map(|candidate| {
                let weights = weighted(candidate);
                let candidate_norm = norm(&weights);

                let mut shared: Vec<(&str, f64)> = weights
                    .iter()
                    .filter_map(|(term, w)| {
                        source_lookup.get(term.as_str()).map(|s| (term.as_str(), s * w))
                    })
                    .collect();
                let dot: f64 = shared.iter().map(|(_, product)| product).sum();

                let score = if source_norm == 0.0 || candidate_norm == 0.0 {
                    0.0
                } else {
                    (dot / (source_norm * candidate_norm) * 100.0).clamp(0.0, 100.0)
                };

                shared.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.0.cmp(b.0))
                });

                ScoredCandidate {
                    candidate_id: candidate.content_id,
                    score,
                    shared_terms: shared
                        .into_iter()
                        .take(MAX_SHARED_TERMS)
                        .map(|(term, _)| term.to_string())
                        .collect(),
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });
        results
    }
}

fn norm(weights: &[(String, f64)]) -> f64 {
    weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
}
