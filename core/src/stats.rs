//! Collection statistics and TF-IDF document vectors over a read view.

use crate::index::{DocId, TermVector};
use crate::store::ReadView;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TfIdfVector {
    pub weights: HashMap<String, f64>,
    pub norm: f64,
}

impl TfIdfVector {
    /// Sum over the terms present in both vectors.
    pub fn dot(&self, other: &TfIdfVector) -> f64 {
        let (small, large) = if self.weights.len() <= other.weights.len() { (self, other) } else { (other, self) };
        small
            .weights
            .iter()
            .filter_map(|(term, w)| large.weights.get(term).map(|v| w * v))
            .sum()
    }
}

pub struct TermStats<'v> {
    view: &'v ReadView,
}

impl<'v> TermStats<'v> {
    pub fn new(view: &'v ReadView) -> Self {
        Self { view }
    }

    pub fn collection_size(&self) -> u32 {
        self.view.num_docs()
    }

    pub fn document_frequency(&self, term: &str, field: &str) -> u32 {
        self.view.doc_freq(term, field)
    }

    /// `log2(N / df)`; 0 for a term no document contains.
    pub fn idf(&self, term: &str, field: &str) -> f64 {
        let df = self.document_frequency(term, field);
        if df == 0 {
            return 0.0;
        }
        (self.collection_size() as f64 / df as f64).log2()
    }

    pub fn tfidf_vector(&self, tv: &TermVector, field: &str) -> TfIdfVector {
        let mut weights = HashMap::with_capacity(tv.terms.len());
        let mut sum = 0.0;
        for (term, freq) in tv.frequencies() {
            let w = freq as f64 * self.idf(term, field);
            sum += w * w;
            weights.insert(term.to_string(), w);
        }
        TfIdfVector { weights, norm: sum.sqrt() }
    }

    pub fn document_vector(&self, doc: DocId, field: &str) -> Option<TfIdfVector> {
        self.view.term_vector(doc, field).map(|tv| self.tfidf_vector(tv, field))
    }

    /// Cosine of the TF-IDF vectors of two documents' `field`. `None` when
    /// either document has no term vector there or its vector has zero norm
    /// (no terms, or only terms every document contains).
    pub fn cosine_similarity(&self, x: DocId, y: DocId, field: &str) -> Option<f64> {
        let vx = self.document_vector(x, field)?;
        let vy = self.document_vector(y, field)?;
        if vx.norm == 0.0 || vy.norm == 0.0 {
            return None;
        }
        Some((vx.dot(&vy) / (vx.norm * vy.norm)).min(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(pairs: &[(&str, f64)]) -> TfIdfVector {
        let weights: HashMap<String, f64> = pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect();
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        TfIdfVector { weights, norm }
    }

    #[test]
    fn dot_sums_every_shared_term() {
        let a = vector(&[("rock", 2.0), ("band", 3.0), ("guitar", 1.0)]);
        let b = vector(&[("rock", 1.0), ("band", 1.0), ("drum", 5.0)]);
        assert_eq!(a.dot(&b), 5.0);
        assert_eq!(b.dot(&a), 5.0);
    }

    #[test]
    fn disjoint_vectors_have_zero_dot() {
        let a = vector(&[("rock", 2.0)]);
        let b = vector(&[("football", 1.0)]);
        assert_eq!(a.dot(&b), 0.0);
    }
}
