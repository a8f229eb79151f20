use crate::builder::{self, Article};
use crate::config::EngineConfig;
use crate::document::StoredDocument;
use crate::error::{Error, Result};
use crate::id_map::{IdMap, IdMapHandle};
use crate::index::ExternalId;
use crate::rerank::Reranker;
use crate::search::Searcher;
use crate::stats::TermStats;
use crate::store::{IndexStore, IndexWriter, ReadView};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{info, warn};

/// Owns the store, the searcher and the identifier map of one index
/// directory. Cheap to share behind an `Arc`.
///
/// The searcher's view and the identifier map move together: every refresh
/// builds the map for the new view before either is installed, and readers
/// that need both only ever see a matching pair.
pub struct Engine {
    config: EngineConfig,
    store: Arc<IndexStore>,
    searcher: Searcher,
    ids: IdMapHandle,
    /// Serializes refreshes and map builds.
    refresh_lock: Mutex<()>,
    /// Write-held only while a view and its map are installed.
    swap: RwLock<()>,
}

impl Engine {
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(IndexStore::open(&config.index_dir, config.analyzer)?);
        let searcher = Searcher::new(Arc::clone(&store), config.max_results, config.max_clause_count)?;
        let ids = IdMapHandle::new(config.id_map_path());
        Ok(Self { config, store, searcher, ids, refresh_lock: Mutex::new(()), swap: RwLock::new(()) })
    }

    /// Dropping the engine releases the same resources: it holds no file
    /// handles or locks of its own. Writers obtained from [`Engine::writer`]
    /// are independent and release `write.lock` when they are dropped.
    pub fn close(self) {
        if self.store.paths().write_lock().exists() {
            warn!(lock = %self.store.paths().write_lock().display(), "closing index while a writer holds the lock");
        }
        info!(root = %self.store.paths().root.display(), "closed index");
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn store(&self) -> &IndexStore { &self.store }

    pub fn searcher(&self) -> &Searcher { &self.searcher }

    pub fn id_map(&self) -> &IdMapHandle { &self.ids }

    pub fn writer(&self) -> Result<IndexWriter> {
        self.store.writer(self.config.max_buffered_docs)
    }

    /// Builds and buffers one article. Visible after the writer commits.
    pub fn add_article(&self, writer: &mut IndexWriter, article: &Article) -> Result<()> {
        writer.add_document(&builder::build(article))
    }

    /// Reopens the searcher's view on the latest commit. A loaded identifier
    /// map of another generation is rebuilt from the new view first; if that
    /// fails, neither the view nor the map changes.
    pub fn refresh(&self) -> Result<u64> {
        let _refresh = self.refresh_lock.lock();
        let fresh = Arc::new(self.store.open_read_view()?);
        let generation = fresh.generation();
        let map = match self.ids.get() {
            Some(current) if current.generation() != generation => {
                let (map, report) = self.ids.rebuild(&fresh)?;
                info!(generation, entries = map.len(), skipped = report.skipped, "rebuilt identifier map for refreshed view");
                Some(map)
            }
            _ => None,
        };
        self.install(fresh, map);
        Ok(generation)
    }

    /// The identifier map for the current view: memoized, else persisted,
    /// else built and persisted. A persisted map of another generation is
    /// rebuilt.
    pub fn ensure_id_map(&self) -> Result<Arc<IdMap>> {
        let _refresh = self.refresh_lock.lock();
        let view = self.searcher.view();
        match self.ids.try_load()? {
            Some(map) if map.generation() == view.generation() => return Ok(map),
            Some(map) => info!(map = map.generation(), view = view.generation(), "identifier map is stale, rebuilding"),
            None => info!(path = %self.ids.path().display(), "no identifier map found, building"),
        }
        let (map, _) = self.ids.build_and_persist(&view)?;
        Ok(map)
    }

    /// Reopens the view and replaces the identifier map with one built from
    /// it, even if a map of that generation is already loaded.
    pub fn rebuild_id_map(&self) -> Result<Arc<IdMap>> {
        let _refresh = self.refresh_lock.lock();
        let fresh = Arc::new(self.store.open_read_view()?);
        let (map, report) = self.ids.rebuild(&fresh)?;
        info!(entries = map.len(), skipped = report.skipped, generation = fresh.generation(), "rebuilt identifier map");
        self.install(fresh, Some(Arc::clone(&map)));
        Ok(map)
    }

    fn install(&self, view: Arc<ReadView>, map: Option<Arc<IdMap>>) {
        let _swap = self.swap.write();
        self.searcher.install(view);
        if let Some(map) = map {
            self.ids.install(map);
        }
    }

    /// The current view with the identifier map of the same generation.
    fn pinned(&self) -> Result<(Arc<ReadView>, Arc<IdMap>)> {
        let _swap = self.swap.read();
        let view = self.searcher.view();
        let ids = self.ids.get().ok_or_else(|| Error::MapNotFound(self.ids.path().to_path_buf()))?;
        if ids.generation() != view.generation() {
            return Err(Error::StaleIdMap { map: ids.generation(), view: view.generation() });
        }
        Ok((view, ids))
    }

    /// Requires a loaded identifier map (see [`Engine::ensure_id_map`]) of
    /// the current view's generation.
    pub fn reranker(&self) -> Result<Reranker> {
        let (view, ids) = self.pinned()?;
        Ok(Reranker::new(view, ids, self.searcher.max_clauses()))
    }

    /// Stored fields of the document with external id `id`.
    pub fn document(&self, id: ExternalId) -> Option<StoredDocument> {
        let (view, ids) = self.pinned().ok()?;
        view.fetch_document(ids.lookup(id)?).cloned()
    }

    /// Cosine similarity of two documents addressed by external id.
    pub fn cosine_similarity(&self, x: ExternalId, y: ExternalId, field: &str) -> Option<f64> {
        let (view, ids) = self.pinned().ok()?;
        let (dx, dy) = (ids.lookup(x)?, ids.lookup(y)?);
        let stats = TermStats::new(&view);
        stats.cosine_similarity(dx, dy, field)
    }
}
