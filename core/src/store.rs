//! Durable term index: one writer appending immutable segments, any number
//! of point-in-time read views.

use crate::document::{Document, StoredDocument};
use crate::error::{Error, Result};
use crate::index::{DocId, FieldIndex, Segment, SegmentBuilder, TermVector};
use crate::persist::{self, IndexPaths, Manifest, SegmentMeta};
use crate::tokenizer::{Analyzer, AnalyzerConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const OPEN_VIEW_ATTEMPTS: usize = 5;

pub struct IndexStore {
    paths: IndexPaths,
    /// Used only when the directory holds no index yet.
    analyzer: AnalyzerConfig,
    /// Loaded segments, shared by every view that references them.
    cache: Mutex<HashMap<String, Arc<Segment>>>,
}

impl IndexStore {
    /// Opens the index in `dir`, creating an empty one if none exists.
    pub fn open<P: AsRef<Path>>(dir: P, analyzer: AnalyzerConfig) -> Result<Self> {
        let paths = IndexPaths::new(dir);
        fs::create_dir_all(&paths.root).map_err(Error::storage(format!("creating {}", paths.root.display())))?;
        let manifest = match persist::load_manifest(&paths)? {
            Some(m) => m,
            None => {
                let m = Manifest::empty(analyzer);
                persist::save_manifest(&paths, &m)?;
                m
            }
        };
        info!(root = %paths.root.display(), generation = manifest.generation, docs = manifest.num_docs(), "opened index");
        Ok(Self { paths, analyzer, cache: Mutex::new(HashMap::new()) })
    }

    pub fn paths(&self) -> &IndexPaths { &self.paths }

    /// The last committed manifest.
    pub fn manifest(&self) -> Result<Manifest> {
        Ok(persist::load_manifest(&self.paths)?.unwrap_or_else(|| Manifest::empty(self.analyzer)))
    }

    /// Acquires the single write handle. Fails with [`Error::WriterBusy`]
    /// instead of waiting when another writer holds the lock.
    pub fn writer(&self, max_buffered_docs: usize) -> Result<IndexWriter> {
        IndexWriter::open(self.paths.clone(), self.analyzer, max_buffered_docs)
    }

    /// A consistent view of the last commit. Later commits stay invisible to
    /// it.
    pub fn open_read_view(&self) -> Result<ReadView> {
        for attempt in 0..OPEN_VIEW_ATTEMPTS {
            let manifest = self.manifest()?;
            match self.load_segments(&manifest.segments)? {
                Some(segments) => return Ok(ReadView::new(&manifest, segments)),
                None => debug!(attempt, "segment removed by a concurrent commit, rereading manifest"),
            }
        }
        Err(Error::CorruptIndex("segments kept disappearing while opening a read view".into()))
    }

    fn load_segments(&self, metas: &[SegmentMeta]) -> Result<Option<Vec<Arc<Segment>>>> {
        let mut cache = self.cache.lock();
        let mut out = Vec::with_capacity(metas.len());
        for meta in metas {
            if let Some(seg) = cache.get(&meta.name) {
                out.push(Arc::clone(seg));
                continue;
            }
            let Some(seg) = persist::load_segment(&self.paths, &meta.name)? else { return Ok(None) };
            if seg.num_docs() != meta.num_docs {
                return Err(Error::CorruptIndex(format!(
                    "segment {} holds {} documents, manifest says {}",
                    meta.name,
                    seg.num_docs(),
                    meta.num_docs
                )));
            }
            let seg = Arc::new(seg);
            cache.insert(meta.name.clone(), Arc::clone(&seg));
            out.push(seg);
        }
        cache.retain(|name, _| metas.iter().any(|m| &m.name == name));
        Ok(Some(out))
    }
}

/// Snapshot of the index at one commit. Internal ids are dense over the
/// concatenated segments.
pub struct ReadView {
    generation: u64,
    analyzer: Analyzer,
    segments: Vec<Arc<Segment>>,
    bases: Vec<DocId>,
    num_docs: u32,
}

impl ReadView {
    fn new(manifest: &Manifest, segments: Vec<Arc<Segment>>) -> Self {
        let mut bases = Vec::with_capacity(segments.len());
        let mut num_docs = 0;
        for seg in &segments {
            bases.push(num_docs);
            num_docs += seg.num_docs();
        }
        Self { generation: manifest.generation, analyzer: Analyzer::new(manifest.analyzer), segments, bases, num_docs }
    }

    pub fn generation(&self) -> u64 { self.generation }

    /// The analyzer the index was written with.
    pub fn analyzer(&self) -> &Analyzer { &self.analyzer }

    pub fn num_docs(&self) -> u32 { self.num_docs }

    /// Every segment with the internal id of its first document.
    pub fn segments(&self) -> impl Iterator<Item = (DocId, &Segment)> + '_ {
        self.bases.iter().copied().zip(self.segments.iter().map(|s| s.as_ref()))
    }

    fn locate(&self, doc: DocId) -> Option<(&Segment, DocId)> {
        let i = self.bases.partition_point(|&b| b <= doc).checked_sub(1)?;
        let seg = self.segments[i].as_ref();
        let local = doc - self.bases[i];
        (local < seg.num_docs()).then_some((seg, local))
    }

    pub fn fetch_document(&self, doc: DocId) -> Option<&StoredDocument> {
        let (seg, local) = self.locate(doc)?;
        seg.docs.get(local as usize)
    }

    /// The field index holding `doc`, with the document's segment-local id.
    pub fn field_of(&self, doc: DocId, field: &str) -> Option<(&FieldIndex, DocId)> {
        let (seg, local) = self.locate(doc)?;
        Some((seg.field(field)?, local))
    }

    /// Number of documents containing the (already analyzed) term in `field`.
    pub fn doc_freq(&self, term: &str, field: &str) -> u32 {
        self.segments.iter().filter_map(|s| s.field(field)).map(|f| f.doc_freq(term)).sum()
    }

    pub fn term_vector(&self, doc: DocId, field: &str) -> Option<&TermVector> {
        let (fi, local) = self.field_of(doc, field)?;
        fi.term_vectors.get(&local)
    }
}

/// The single write handle. Added documents are buffered and become visible
/// to new read views only after [`IndexWriter::commit`].
pub struct IndexWriter {
    paths: IndexPaths,
    lock: PathBuf,
    manifest: Manifest,
    /// Flushed but not yet committed.
    pending: Vec<SegmentMeta>,
    builder: SegmentBuilder,
    max_buffered_docs: usize,
}

impl IndexWriter {
    pub fn open(paths: IndexPaths, analyzer: AnalyzerConfig, max_buffered_docs: usize) -> Result<Self> {
        fs::create_dir_all(&paths.root).map_err(Error::storage(format!("creating {}", paths.root.display())))?;
        let lock = paths.write_lock();
        let mut f = match OpenOptions::new().write(true).create_new(true).open(&lock) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(Error::WriterBusy(lock)),
            Err(e) => return Err(Error::storage("acquiring the write lock")(e)),
        };
        // best effort; the file's existence is the lock
        let _ = writeln!(f, "{}", std::process::id());

        let manifest = match persist::load_manifest(&paths) {
            Ok(m) => m.unwrap_or_else(|| Manifest::empty(analyzer)),
            Err(e) => {
                let _ = fs::remove_file(&lock);
                return Err(e);
            }
        };
        let builder = SegmentBuilder::new(Analyzer::new(manifest.analyzer));
        debug!(generation = manifest.generation, "index writer opened");
        Ok(Self { paths, lock, manifest, pending: Vec::new(), builder, max_buffered_docs: max_buffered_docs.max(1) })
    }

    /// Documents in the last commit plus everything added since.
    pub fn num_docs(&self) -> u32 {
        self.manifest.num_docs() + self.pending.iter().map(|s| s.num_docs).sum::<u32>() + self.builder.num_docs()
    }

    pub fn add_document(&mut self, doc: &Document) -> Result<()> {
        self.builder.add(doc);
        debug!(buffered = self.builder.num_docs(), "added document");
        if self.builder.num_docs() as usize >= self.max_buffered_docs {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes the buffer out as a segment file. Not visible until committed.
    fn flush(&mut self) -> Result<()> {
        if self.builder.is_empty() {
            return Ok(());
        }
        let name = format!("seg_{:08}", self.manifest.next_segment);
        self.manifest.next_segment += 1;
        let segment = self.builder.take();
        persist::save_segment(&self.paths, &name, &segment)?;
        debug!(segment = %name, docs = segment.num_docs(), "flushed segment");
        self.pending.push(SegmentMeta { name, num_docs: segment.num_docs() });
        Ok(())
    }

    /// Makes every buffered write durable and visible to read views opened
    /// afterwards. Returns the new generation.
    pub fn commit(&mut self) -> Result<u64> {
        self.flush()?;
        let mut next = self.manifest.clone();
        next.segments.extend(self.pending.iter().cloned());
        next.generation += 1;
        next.created_at = persist::now_rfc3339();
        persist::save_manifest(&self.paths, &next)?;
        self.pending.clear();
        self.manifest = next;
        match persist::remove_stale_segments(&self.paths, &self.manifest.segments) {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "removed stale segments"),
            Err(e) => warn!(error = %e, "could not remove stale segments"),
        }
        info!(generation = self.manifest.generation, docs = self.manifest.num_docs(), "committed");
        Ok(self.manifest.generation)
    }

    /// Drops every document, buffered or committed, and commits the empty
    /// index.
    pub fn delete_all(&mut self) -> Result<u64> {
        info!("deleting all indexed documents");
        self.builder.take();
        self.pending.clear();
        self.manifest.segments.clear();
        self.commit()
    }

    /// Commits and releases the write lock.
    pub fn close(mut self) -> Result<u64> {
        self.commit()
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock) {
            warn!(lock = %self.lock.display(), error = %e, "could not release write lock");
        }
    }
}
