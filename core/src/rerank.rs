//! Context reranking of candidate entities for a spot.

use crate::id_map::IdMap;
use crate::index::ExternalId;
use crate::store::ReadView;
use crate::similarity::{Explanation, Weight};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Added to every candidate found in the index before its context score.
pub const SMOOTHING: f64 = 0.5;

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^A-Za-z0-9 ]").expect("valid regex");
}

/// A surface phrase detected in text, with its byte offsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub text: String,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
}

impl Spot {
    pub fn new(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self { text: text.into(), start, end }
    }
}

/// A scored hypothesis that a spot refers to the entity `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    pub id: ExternalId,
    pub score: f64,
    pub spot: Spot,
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

impl EntityMatch {
    pub fn new(id: ExternalId, score: f64, spot: Spot) -> Self {
        Self { id, score, spot, explanation: None }
    }
}

/// Keeps ASCII letters, digits and spaces; everything else becomes a space.
/// Non-Latin context is dropped entirely.
pub fn normalize_context(context: &str) -> String {
    NON_ALNUM.replace_all(context, " ").into_owned()
}

/// Scores candidates against one read view and the identifier map built
/// from it.
pub struct Reranker {
    view: Arc<ReadView>,
    ids: Arc<IdMap>,
    max_clauses: usize,
}

impl Reranker {
    pub fn new(view: Arc<ReadView>, ids: Arc<IdMap>, max_clauses: usize) -> Self {
        Self { view, ids, max_clauses }
    }

    /// Adds `SMOOTHING` plus the relevance of each candidate's document to
    /// `context` onto its score. Candidates missing from the index, and all
    /// candidates when the context yields no query, keep their score. Order
    /// is never changed.
    pub fn rerank(&self, spot: &Spot, candidates: &mut [EntityMatch], context: &str, field: &str) {
        if context.trim().is_empty() {
            warn!(spot = %spot.text, "no context for spot");
            return;
        }
        let view = &self.view;
        let normalized = normalize_context(context);
        let query = match view.parse_query(&normalized, field, self.max_clauses) {
            Ok(q) => q,
            Err(e) => {
                warn!(spot = %spot.text, error = %e, "cannot build a query from context");
                return;
            }
        };
        let weight = Weight::new(&query, view);
        for candidate in candidates.iter_mut() {
            let Some(doc) = self.ids.lookup(candidate.id) else {
                debug!(id = candidate.id, "candidate not indexed, score unchanged");
                continue;
            };
            let Some(explanation) = view.explain_weighted(&weight, doc) else {
                warn!(id = candidate.id, doc, "identifier map points outside the index, score unchanged");
                continue;
            };
            candidate.score += SMOOTHING + f64::from(explanation.value);
            candidate.explanation = Some(
                Explanation::new(SMOOTHING as f32 + explanation.value, "context similarity plus smoothing")
                    .with_details(vec![Explanation::new(SMOOTHING as f32, "smoothing"), explanation]),
            );
        }
    }
}
