use crate::document::{Document, StoredDocument, StoredField};
use crate::tokenizer::Analyzer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type DocId = u32;
pub type ExternalId = u32;

/// Positions of consecutive values of one field are this far apart, so a
/// phrase never spans two values.
pub const POSITION_GAP: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    /// Segment-local document number.
    pub doc: DocId,
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn freq(&self) -> u32 { self.positions.len() as u32 }
}

/// Per-document, per-field terms with their positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermVector {
    pub terms: BTreeMap<String, Vec<u32>>,
}

impl TermVector {
    pub fn is_empty(&self) -> bool { self.terms.is_empty() }

    /// Raw frequency of every term.
    pub fn frequencies(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.terms.iter().map(|(t, p)| (t.as_str(), p.len() as u32))
    }

    pub fn freq(&self, term: &str) -> u32 {
        self.terms.get(term).map_or(0, |p| p.len() as u32)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FieldIndex {
    pub postings: HashMap<String, Vec<Posting>>, // postings sorted by doc
    /// Number of tokens per document, for length normalization.
    pub lengths: HashMap<DocId, u32>,
    pub term_vectors: HashMap<DocId, TermVector>,
}

impl FieldIndex {
    pub fn postings(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map_or(&[], Vec::as_slice)
    }

    pub fn doc_freq(&self, term: &str) -> u32 {
        self.postings(term).len() as u32
    }

    pub fn length(&self, doc: DocId) -> u32 {
        self.lengths.get(&doc).copied().unwrap_or(0)
    }

    /// The posting of `term` in `doc`, if any.
    pub fn posting(&self, term: &str, doc: DocId) -> Option<&Posting> {
        let list = self.postings(term);
        list.binary_search_by_key(&doc, |p| p.doc).ok().map(|i| &list[i])
    }
}

/// An immutable slice of the index produced by one flush.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Segment {
    pub docs: Vec<StoredDocument>,
    pub fields: HashMap<String, FieldIndex>,
}

impl Segment {
    pub fn num_docs(&self) -> u32 { self.docs.len() as u32 }

    pub fn field(&self, name: &str) -> Option<&FieldIndex> { self.fields.get(name) }
}

/// Accumulates analyzed documents in memory until flushed as a [`Segment`].
pub struct SegmentBuilder {
    analyzer: Analyzer,
    segment: Segment,
}

impl SegmentBuilder {
    pub fn new(analyzer: Analyzer) -> Self {
        Self { analyzer, segment: Segment::default() }
    }

    pub fn num_docs(&self) -> u32 { self.segment.num_docs() }

    pub fn is_empty(&self) -> bool { self.segment.docs.is_empty() }

    pub fn add(&mut self, doc: &Document) {
        let local = self.segment.num_docs();
        let mut stored = StoredDocument::default();
        // field -> term -> positions, for this document only
        let mut inverted: BTreeMap<&str, BTreeMap<String, Vec<u32>>> = BTreeMap::new();
        let mut next_pos: HashMap<&str, u32> = HashMap::new();
        let mut lengths: HashMap<&str, u32> = HashMap::new();
        let mut with_vectors: Vec<&str> = Vec::new();

        for field in &doc.fields {
            let name = field.name.as_str();
            if field.options.stored {
                stored.fields.push(StoredField { name: field.name.clone(), value: field.value.clone() });
            }
            if !field.options.indexed {
                continue;
            }
            if field.options.term_vectors && !with_vectors.contains(&name) {
                with_vectors.push(name);
            }
            let tokens = if field.options.tokenized {
                match field.value.as_text() {
                    Some(text) => self.analyzer.analyze(text),
                    None => vec![(field.value.to_term(), 0)],
                }
            } else {
                vec![(field.value.to_term(), 0)]
            };
            let base = next_pos.entry(name).or_insert(0);
            let start = *base;
            let mut last = 0;
            let terms = inverted.entry(name).or_default();
            for (term, pos) in &tokens {
                terms.entry(term.clone()).or_default().push(start + pos);
                last = *pos;
            }
            if !tokens.is_empty() {
                *base = start + last + 1 + POSITION_GAP;
            }
            *lengths.entry(name).or_insert(0) += tokens.len() as u32;
        }

        for (name, terms) in inverted {
            let fi = self.segment.fields.entry(name.to_string()).or_default();
            let len = lengths.get(name).copied().unwrap_or(0);
            if len > 0 {
                fi.lengths.insert(local, len);
            }
            if with_vectors.contains(&name) {
                fi.term_vectors.insert(local, TermVector { terms: terms.clone() });
            }
            for (term, positions) in terms {
                fi.postings.entry(term).or_default().push(Posting { doc: local, positions });
            }
        }
        self.segment.docs.push(stored);
    }

    /// Hands over the accumulated segment and starts a fresh one.
    pub fn take(&mut self) -> Segment {
        std::mem::take(&mut self.segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldOptions;

    #[test]
    fn repeated_values_are_separated_by_a_gap() {
        let mut doc = Document::new();
        doc.add_text("desc", "barack", FieldOptions::VECTORS_STORED);
        doc.add_text("desc", "obama", FieldOptions::VECTORS_STORED);
        let mut b = SegmentBuilder::new(Analyzer::default());
        b.add(&doc);
        let seg = b.take();
        let fi = seg.field("desc").unwrap();
        let p0 = &fi.posting("barack", 0).unwrap().positions;
        let p1 = &fi.posting("obama", 0).unwrap().positions;
        assert_eq!(p0, &vec![0]);
        assert_eq!(p1, &vec![1 + POSITION_GAP]);
        assert_eq!(fi.length(0), 2);
    }

    #[test]
    fn keyword_values_are_single_terms() {
        let mut doc = Document::new();
        doc.add_int("wiki-id", 42);
        doc.add_text("wiki-title", "Barack_Obama", FieldOptions::KEYWORD_STORED);
        let mut b = SegmentBuilder::new(Analyzer::default());
        b.add(&doc);
        let seg = b.take();
        assert_eq!(seg.field("wiki-id").unwrap().doc_freq("42"), 1);
        assert_eq!(seg.field("wiki-title").unwrap().doc_freq("Barack_Obama"), 1);
        assert_eq!(seg.docs[0].fields.len(), 2);
    }

    #[test]
    fn term_vectors_only_for_flagged_fields() {
        let mut doc = Document::new();
        doc.add_text("title", "rock band", FieldOptions::TEXT_STORED);
        doc.add_text("content", "rock rock band", FieldOptions::VECTORS);
        let mut b = SegmentBuilder::new(Analyzer::default());
        b.add(&doc);
        let seg = b.take();
        assert!(seg.field("title").unwrap().term_vectors.is_empty());
        let tv = &seg.field("content").unwrap().term_vectors[&0];
        assert_eq!(tv.freq("rock"), 2);
        assert!(seg.docs[0].get("content").is_none());
    }
}
