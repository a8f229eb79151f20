use crate::document::{StoredDocument, CONTENT};
use crate::index::{DocId, Posting};
use crate::query::{Query, QueryParseError, QueryParser};
use crate::similarity::{Explanation, Weight};
use crate::store::{IndexStore, ReadView};
use crate::error::Result;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on ranked results, to bound memory.
pub const DEFAULT_MAX_RESULTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredDoc {
    pub doc: DocId,
    pub score: f32,
}

impl ReadView {
    pub fn parse_query(&self, text: &str, field: &str, max_clauses: usize) -> std::result::Result<Query, QueryParseError> {
        QueryParser::new(self.analyzer(), field).with_max_clauses(max_clauses).parse(text)
    }

    /// Number of documents in which `terms`, analyzed as one text, occur as a
    /// phrase in `field`.
    pub fn phrase_frequency<S: AsRef<str>>(&self, terms: &[S], field: &str) -> u32 {
        let text = terms.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
        let tokens = self.analyzer().analyze(&text);
        let Some(first) = tokens.first().map(|(_, p)| *p) else { return 0 };
        let offsets: Vec<(&str, u32)> = tokens.iter().map(|(t, p)| (t.as_str(), p - first)).collect();

        let mut count = 0;
        for (_, seg) in self.segments() {
            let Some(fi) = seg.field(field) else { continue };
            let lists: Vec<&[Posting]> = offsets.iter().map(|(t, _)| fi.postings(t)).collect();
            // drive the intersection from the rarest term
            let Some(lead) = lists.iter().min_by_key(|l| l.len()) else { continue };
            for candidate in lead.iter() {
                let mut per_term = Vec::with_capacity(offsets.len());
                for (term, _) in &offsets {
                    match fi.posting(term, candidate.doc) {
                        Some(p) => per_term.push(p),
                        None => break,
                    }
                }
                if per_term.len() == offsets.len() && phrase_matches(&per_term, &offsets) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Documents matching any query term, best first, ties by internal id.
    pub fn search(&self, query: &Query, limit: usize) -> Vec<ScoredDoc> {
        let weight = Weight::new(query, self);
        let mut hits = Vec::new();
        for (base, seg) in self.segments() {
            let Some(fi) = seg.field(weight.field()) else { continue };
            let mut matches: HashMap<DocId, Vec<(usize, u32)>> = HashMap::new();
            for i in 0..weight.num_clauses() {
                for p in fi.postings(weight.term(i)) {
                    matches.entry(p.doc).or_default().push((i, p.freq()));
                }
            }
            for (local, m) in matches {
                hits.push(ScoredDoc { doc: base + local, score: weight.score(&m, fi.length(local)) });
            }
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc.cmp(&b.doc)));
        hits.truncate(limit);
        debug!(field = weight.field(), clauses = weight.num_clauses(), hits = hits.len(), "search");
        hits
    }

    /// How `search` would score `doc` for `query`. `None` if `doc` is not in
    /// this view.
    pub fn explain(&self, query: &Query, doc: DocId) -> Option<Explanation> {
        self.explain_weighted(&Weight::new(query, self), doc)
    }

    pub fn explain_weighted(&self, weight: &Weight, doc: DocId) -> Option<Explanation> {
        self.fetch_document(doc)?;
        let Some((fi, local)) = self.field_of(doc, weight.field()) else {
            return Some(weight.explain(&[], 0));
        };
        let matches: Vec<(usize, u32)> = (0..weight.num_clauses())
            .filter_map(|i| fi.posting(weight.term(i), local).map(|p| (i, p.freq())))
            .collect();
        Some(weight.explain(&matches, fi.length(local)))
    }

    pub fn explain_score(&self, query: &Query, doc: DocId) -> f32 {
        self.explain(query, doc).map_or(0.0, |e| e.value)
    }
}

/// True if some position of the first term starts the whole phrase.
fn phrase_matches(per_term: &[&Posting], offsets: &[(&str, u32)]) -> bool {
    per_term[0].positions.iter().any(|&start| {
        per_term
            .iter()
            .zip(offsets)
            .skip(1)
            .all(|(p, (_, off))| p.positions.binary_search(&(start + off)).is_ok())
    })
}

/// Query entry point holding a read view that lags the latest commit until
/// [`Searcher::refresh`] is called.
pub struct Searcher {
    store: Arc<IndexStore>,
    view: RwLock<Arc<ReadView>>,
    max_results: usize,
    max_clauses: usize,
}

impl Searcher {
    pub fn new(store: Arc<IndexStore>, max_results: usize, max_clauses: usize) -> Result<Self> {
        let view = store.open_read_view()?;
        Ok(Self { store, view: RwLock::new(Arc::new(view)), max_results, max_clauses })
    }

    /// The current view. Holding it keeps its snapshot alive across refreshes.
    pub fn view(&self) -> Arc<ReadView> {
        Arc::clone(&self.view.read())
    }

    /// Reopens the view on the latest commit. Returns its generation.
    pub fn refresh(&self) -> Result<u64> {
        let fresh = Arc::new(self.store.open_read_view()?);
        let generation = fresh.generation();
        self.install(fresh);
        Ok(generation)
    }

    /// Replaces the current view with one opened elsewhere.
    pub fn install(&self, fresh: Arc<ReadView>) {
        let generation = fresh.generation();
        let previous = std::mem::replace(&mut *self.view.write(), fresh);
        if previous.generation() != generation {
            debug!(from = previous.generation(), to = generation, "refreshed read view");
        }
    }

    pub fn max_clauses(&self) -> usize { self.max_clauses }

    pub fn num_documents(&self) -> u32 {
        self.view().num_docs()
    }

    pub fn fetch_document(&self, doc: DocId) -> Option<StoredDocument> {
        self.view().fetch_document(doc).cloned()
    }

    pub fn phrase_frequency<S: AsRef<str>>(&self, terms: &[S], field: &str) -> u32 {
        self.view().phrase_frequency(terms, field)
    }

    /// Phrase frequency of `text` in the body content.
    pub fn frequency(&self, text: &str) -> u32 {
        self.phrase_frequency(&[text], CONTENT)
    }

    pub fn parse_query(&self, text: &str, field: &str) -> std::result::Result<Query, QueryParseError> {
        self.view().parse_query(text, field, self.max_clauses)
    }

    /// Ranked internal ids for free text; empty when the text cannot be
    /// turned into a query.
    pub fn similarity_query(&self, text: &str, field: &str) -> Vec<DocId> {
        self.search(text, field, self.max_results).into_iter().map(|h| h.doc).collect()
    }

    pub fn search(&self, text: &str, field: &str, limit: usize) -> Vec<ScoredDoc> {
        let view = self.view();
        match view.parse_query(text, field, self.max_clauses) {
            Ok(q) => view.search(&q, limit.min(self.max_results)),
            Err(e) => {
                warn!(error = %e, field, "unparsable query, returning no results");
                Vec::new()
            }
        }
    }

    pub fn explain(&self, query: &Query, doc: DocId) -> Option<Explanation> {
        self.view().explain(query, doc)
    }

    pub fn explain_score(&self, query: &Query, doc: DocId) -> f32 {
        self.view().explain_score(query, doc)
    }
}
