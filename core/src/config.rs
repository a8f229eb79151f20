use crate::error::{Error, Result};
use crate::query::DEFAULT_MAX_CLAUSES;
use crate::search::DEFAULT_MAX_RESULTS;
use crate::tokenizer::AnalyzerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub index_dir: PathBuf,
    /// Defaults to `<index_dir>/id_map.bin`.
    pub id_map_path: Option<PathBuf>,
    pub max_results: usize,
    pub max_clause_count: usize,
    /// Documents buffered in memory before the writer flushes a segment.
    pub max_buffered_docs: usize,
    /// Applies to newly created indexes; existing ones keep theirs.
    pub analyzer: AnalyzerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("./index"),
            id_map_path: None,
            max_results: DEFAULT_MAX_RESULTS,
            max_clause_count: DEFAULT_MAX_CLAUSES,
            max_buffered_docs: 10_000,
            analyzer: AnalyzerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new<P: AsRef<Path>>(index_dir: P) -> Self {
        Self { index_dir: index_dir.as_ref().to_path_buf(), ..Self::default() }
    }

    /// Reads a JSON config file; missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(Error::storage(format!("reading config {}", path.display())))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(Error::Config("max_results must be positive".into()));
        }
        if self.max_clause_count == 0 {
            return Err(Error::Config("max_clause_count must be positive".into()));
        }
        if self.max_buffered_docs == 0 {
            return Err(Error::Config("max_buffered_docs must be positive".into()));
        }
        Ok(())
    }

    pub fn id_map_path(&self) -> PathBuf {
        self.id_map_path.clone().unwrap_or_else(|| self.index_dir.join("id_map.bin"))
    }
}
