use crate::tokenizer::Analyzer;
use std::collections::HashMap;
use thiserror::Error;

/// Default bound on distinct terms in one free-text query.
pub const DEFAULT_MAX_CLAUSES: usize = 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryParseError {
    #[error("query text has no indexable terms")]
    NoTerms,
    #[error("query has {count} distinct terms, more than the limit of {max}")]
    TooManyClauses { count: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermClause {
    pub term: String,
    /// How many times the term occurred in the query text.
    pub boost: f32,
}

/// A bag-of-words query over one field. Clauses are optional; a document
/// matches if it contains any of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub field: String,
    pub clauses: Vec<TermClause>,
}

pub struct QueryParser<'a> {
    analyzer: &'a Analyzer,
    field: String,
    max_clauses: usize,
}

impl<'a> QueryParser<'a> {
    pub fn new(analyzer: &'a Analyzer, field: &str) -> Self {
        Self { analyzer, field: field.to_string(), max_clauses: DEFAULT_MAX_CLAUSES }
    }

    pub fn with_max_clauses(mut self, max: usize) -> Self {
        self.max_clauses = max;
        self
    }

    /// Analyzes free text into a query. Stopwords never become clauses,
    /// whatever the index keeps. Repeated terms collapse into one clause;
    /// clauses keep first-occurrence order.
    pub fn parse(&self, text: &str) -> Result<Query, QueryParseError> {
        let mut clauses: Vec<TermClause> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        for term in self.analyzer.query_terms(text) {
            match seen.get(&term) {
                Some(&i) => clauses[i].boost += 1.0,
                None => {
                    seen.insert(term.clone(), clauses.len());
                    clauses.push(TermClause { term, boost: 1.0 });
                }
            }
        }
        if clauses.is_empty() {
            return Err(QueryParseError::NoTerms);
        }
        if clauses.len() > self.max_clauses {
            return Err(QueryParseError::TooManyClauses { count: clauses.len(), max: self.max_clauses });
        }
        Ok(Query { field: self.field.clone(), clauses })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_terms_become_boosts() {
        let a = Analyzer::default();
        let q = QueryParser::new(&a, "content").parse("guitar rock guitar").unwrap();
        assert_eq!(q.clauses.len(), 2);
        assert_eq!(q.clauses[0].term, "guitar");
        assert_eq!(q.clauses[0].boost, 2.0);
    }

    #[test]
    fn stopwords_only_is_an_error() {
        let a = Analyzer::default();
        assert_eq!(QueryParser::new(&a, "content").parse("the of and").unwrap_err(), QueryParseError::NoTerms);
        assert_eq!(QueryParser::new(&a, "content").parse("  !!! ").unwrap_err(), QueryParseError::NoTerms);
    }

    #[test]
    fn clause_limit() {
        let a = Analyzer::default();
        let err = QueryParser::new(&a, "content").with_max_clauses(2).parse("alpha beta gamma").unwrap_err();
        assert_eq!(err, QueryParseError::TooManyClauses { count: 3, max: 2 });
    }
}
