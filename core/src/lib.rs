pub mod builder;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod id_map;
pub mod index;
pub mod persist;
pub mod query;
pub mod rerank;
pub mod search;
pub mod similarity;
pub mod stats;
pub mod store;
pub mod tokenizer;

pub use builder::Article;
pub use config::EngineConfig;
pub use document::{Document, FieldValue, StoredDocument};
pub use engine::Engine;
pub use error::{Error, Result};
pub use id_map::{BuildReport, IdMap, IdMapHandle};
pub use index::{DocId, ExternalId, TermVector};
pub use query::{Query, QueryParseError};
pub use rerank::{EntityMatch, Reranker, Spot};
pub use search::{ScoredDoc, Searcher};
pub use similarity::Explanation;
pub use stats::{TermStats, TfIdfVector};
pub use store::{IndexStore, IndexWriter, ReadView};
pub use tokenizer::{Analyzer, AnalyzerConfig};
