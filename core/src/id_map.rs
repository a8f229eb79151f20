//! External id → internal id mapping, derived from the stored `wiki-id`
//! field of every document in one index generation.

use crate::document::{FieldValue, WIKI_ID};
use crate::error::{Error, Result};
use crate::index::{DocId, ExternalId};
use crate::persist;
use crate::store::ReadView;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMap {
    /// Index generation of the view the map was built from. Internal ids are
    /// only meaningful on a view of the same generation.
    generation: u64,
    map: HashMap<ExternalId, DocId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub scanned: u32,
    /// Documents without a usable external id.
    pub skipped: u32,
    /// External ids seen on more than one document; the later one is kept.
    pub duplicates: u32,
}

impl IdMap {
    pub fn lookup(&self, external: ExternalId) -> Option<DocId> {
        self.map.get(&external).copied()
    }

    pub fn generation(&self) -> u64 { self.generation }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (ExternalId, DocId)> + '_ {
        self.map.iter().map(|(e, d)| (*e, *d))
    }

    /// Scans every document of the view once. Bad documents are logged,
    /// counted and skipped.
    pub fn build(view: &ReadView) -> (Self, BuildReport) {
        let mut map = HashMap::with_capacity(view.num_docs() as usize);
        let mut report = BuildReport::default();
        for doc in 0..view.num_docs() {
            report.scanned += 1;
            if report.scanned % 100_000 == 0 {
                info!(scanned = report.scanned, "building identifier map");
            }
            match external_id(view, doc) {
                Ok(ext) => {
                    if let Some(previous) = map.insert(ext, doc) {
                        warn!(external = ext, previous, doc, "duplicate external id");
                        report.duplicates += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "skipping document while building identifier map");
                    report.skipped += 1;
                }
            }
        }
        info!(entries = map.len(), skipped = report.skipped, generation = view.generation(), "built identifier map");
        (Self { generation: view.generation(), map }, report)
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        persist::save_doc_id_map(path, self)?;
        info!(path = %path.display(), entries = self.map.len(), generation = self.generation, "stored identifier map");
        Ok(())
    }

    /// Fails with [`Error::MapNotFound`] when nothing was persisted at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let map: Self = persist::load_doc_id_map(path)?;
        info!(path = %path.display(), entries = map.len(), generation = map.generation, "loaded identifier map");
        Ok(map)
    }
}

fn external_id(view: &ReadView, doc: DocId) -> Result<ExternalId> {
    let corrupt = |reason: String| Error::CorruptDocument { doc, reason };
    let stored = view.fetch_document(doc).ok_or_else(|| corrupt("not in view".into()))?;
    let value = stored.get(WIKI_ID).ok_or_else(|| corrupt(format!("no {WIKI_ID} field")))?;
    let raw = value.as_int().ok_or_else(|| match value {
        FieldValue::Text(s) => corrupt(format!("unparsable {WIKI_ID} {s:?}")),
        FieldValue::Int(_) => corrupt(format!("unparsable {WIKI_ID}")),
    })?;
    match ExternalId::try_from(raw) {
        Ok(ext) if ext > 0 => Ok(ext),
        _ => Err(corrupt(format!("{WIKI_ID} {raw} is not a positive 32-bit id"))),
    }
}

/// Holds the identifier map for the lifetime of an engine. The map is never
/// refreshed on its own: after a reindex the owner rebuilds it from the new
/// view and installs it together with that view.
pub struct IdMapHandle {
    path: PathBuf,
    current: RwLock<Option<Arc<IdMap>>>,
    build_guard: Mutex<()>,
}

impl IdMapHandle {
    pub fn new(path: PathBuf) -> Self {
        Self { path, current: RwLock::new(None), build_guard: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path { &self.path }

    /// The memoized map, if one was loaded or built.
    pub fn get(&self) -> Option<Arc<IdMap>> {
        self.current.read().clone()
    }

    /// Memoized map, else the persisted one. `Ok(None)` means a build is
    /// needed.
    pub fn try_load(&self) -> Result<Option<Arc<IdMap>>> {
        if let Some(map) = self.get() {
            return Ok(Some(map));
        }
        match IdMap::load(&self.path) {
            Ok(map) => {
                let map = Arc::new(map);
                *self.current.write() = Some(Arc::clone(&map));
                Ok(Some(map))
            }
            Err(Error::MapNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Scans `view`, persists the result and memoizes it. Concurrent callers
    /// are serialized; a caller that finds a map of the view's generation
    /// already memoized gets it back with no report instead of scanning again.
    pub fn build_and_persist(&self, view: &ReadView) -> Result<(Arc<IdMap>, Option<BuildReport>)> {
        let _guard = self.build_guard.lock();
        if let Some(map) = self.get().filter(|m| m.generation() == view.generation()) {
            return Ok((map, None));
        }
        let (map, report) = Self::scan_and_persist(&self.path, view)?;
        *self.current.write() = Some(Arc::clone(&map));
        Ok((map, Some(report)))
    }

    /// Scans `view` and persists the result without touching the memoized
    /// map; the caller installs it with [`IdMapHandle::install`]. On error the
    /// previous map stays in place, in memory and on disk.
    pub fn rebuild(&self, view: &ReadView) -> Result<(Arc<IdMap>, BuildReport)> {
        let _guard = self.build_guard.lock();
        Self::scan_and_persist(&self.path, view)
    }

    pub fn install(&self, map: Arc<IdMap>) {
        *self.current.write() = Some(map);
    }

    fn scan_and_persist(path: &Path, view: &ReadView) -> Result<(Arc<IdMap>, BuildReport)> {
        let (map, report) = IdMap::build(view);
        map.persist(path)?;
        Ok((Arc::new(map), report))
    }
}
