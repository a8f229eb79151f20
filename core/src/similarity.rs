//! Classic vector-space relevance scoring for bag-of-words queries:
//!
//! `score(q,d) = coord(q,d) · Σ_t sqrt(tf) · idf(t)² · boost(t) · queryNorm · norm(d)`
//!
//! with `idf(t) = 1 + ln(N / (df + 1))`, `queryNorm = 1 / sqrt(Σ (idf·boost)²)`
//! and `norm(d) = 1 / sqrt(field length)`. Every factor is non-negative.

use crate::query::Query;
use crate::store::ReadView;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub value: f32,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Explanation>,
}

impl Explanation {
    pub fn new(value: f32, description: impl Into<String>) -> Self {
        Self { value, description: description.into(), details: Vec::new() }
    }

    pub fn with_details(mut self, details: Vec<Explanation>) -> Self {
        self.details = details;
        self
    }
}

pub fn idf(doc_freq: u32, num_docs: u32) -> f32 {
    1.0 + (num_docs.max(1) as f32 / (doc_freq as f32 + 1.0)).ln()
}

pub fn tf(freq: u32) -> f32 {
    (freq as f32).sqrt()
}

pub fn length_norm(len: u32) -> f32 {
    if len == 0 { 0.0 } else { 1.0 / (len as f32).sqrt() }
}

pub fn coord(overlap: usize, max_overlap: usize) -> f32 {
    if max_overlap == 0 { 0.0 } else { overlap as f32 / max_overlap as f32 }
}

#[derive(Debug, Clone)]
struct ClauseWeight {
    term: String,
    doc_freq: u32,
    idf: f32,
    /// idf · boost · queryNorm
    query_weight: f32,
}

/// A query bound to the collection statistics of one read view.
#[derive(Debug, Clone)]
pub struct Weight {
    field: String,
    num_docs: u32,
    clauses: Vec<ClauseWeight>,
}

impl Weight {
    pub fn new(query: &Query, view: &ReadView) -> Self {
        let num_docs = view.num_docs();
        let mut clauses: Vec<ClauseWeight> = query
            .clauses
            .iter()
            .map(|c| {
                let doc_freq = view.doc_freq(&c.term, &query.field);
                let idf = idf(doc_freq, num_docs);
                ClauseWeight { term: c.term.clone(), doc_freq, idf, query_weight: idf * c.boost }
            })
            .collect();
        let sum_of_squares: f32 = clauses.iter().map(|c| c.query_weight * c.query_weight).sum();
        let query_norm = if sum_of_squares > 0.0 { 1.0 / sum_of_squares.sqrt() } else { 0.0 };
        for c in &mut clauses {
            c.query_weight *= query_norm;
        }
        Self { field: query.field.clone(), num_docs, clauses }
    }

    pub fn field(&self) -> &str { &self.field }

    pub fn num_clauses(&self) -> usize { self.clauses.len() }

    pub fn term(&self, clause: usize) -> &str { &self.clauses[clause].term }

    /// Scores one document from its matching clauses, given as
    /// `(clause index, term frequency)` in clause order.
    pub fn score(&self, matches: &[(usize, u32)], field_len: u32) -> f32 {
        let norm = length_norm(field_len);
        let mut sum = 0.0f32;
        for &(i, freq) in matches {
            let c = &self.clauses[i];
            sum += tf(freq) * c.idf * norm * c.query_weight;
        }
        sum * coord(matches.len(), self.clauses.len())
    }

    pub fn explain(&self, matches: &[(usize, u32)], field_len: u32) -> Explanation {
        let value = self.score(matches, field_len);
        if matches.is_empty() {
            return Explanation::new(0.0, format!("no matching term in {}", self.field));
        }
        let norm = length_norm(field_len);
        let mut details: Vec<Explanation> = matches
            .iter()
            .map(|&(i, freq)| {
                let c = &self.clauses[i];
                let field_weight = tf(freq) * c.idf * norm;
                Explanation::new(c.query_weight * field_weight, format!("weight({}:{})", self.field, c.term)).with_details(vec![
                    Explanation::new(c.query_weight, "queryWeight, product of idf, boost and queryNorm"),
                    Explanation::new(field_weight, format!("fieldWeight, tf(freq={freq}) * idf(docFreq={}, maxDocs={}) * fieldNorm(len={field_len})", c.doc_freq, self.num_docs)),
                ])
            })
            .collect();
        let coord = coord(matches.len(), self.clauses.len());
        if coord < 1.0 {
            details.push(Explanation::new(coord, format!("coord({}/{})", matches.len(), self.clauses.len())));
        }
        Explanation::new(value, "sum of matching term weights times coord").with_details(details)
    }
}
