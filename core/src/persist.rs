use crate::error::{Error, Result};
use crate::index::Segment;
use crate::tokenizer::AnalyzerConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub name: String,
    pub num_docs: u32,
}

/// The committed state of the index: which segments are live, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub generation: u64,
    pub next_segment: u64,
    pub segments: Vec<SegmentMeta>,
    pub analyzer: AnalyzerConfig,
    pub created_at: String,
}

impl Manifest {
    pub fn empty(analyzer: AnalyzerConfig) -> Self {
        Self { version: FORMAT_VERSION, generation: 0, next_segment: 0, segments: Vec::new(), analyzer, created_at: now_rfc3339() }
    }

    pub fn num_docs(&self) -> u32 {
        self.segments.iter().map(|s| s.num_docs).sum()
    }
}

pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn manifest(&self) -> PathBuf { self.root.join("manifest.json") }
    pub fn segments_dir(&self) -> PathBuf { self.root.join("segments") }
    pub fn segment(&self, name: &str) -> PathBuf { self.segments_dir().join(format!("{name}.seg")) }
    pub fn write_lock(&self) -> PathBuf { self.root.join("write.lock") }
    pub fn default_id_map(&self) -> PathBuf { self.root.join("id_map.bin") }
}

/// Writes `bytes` next to `path` and renames over it, so readers see either
/// the old or the new content.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut f = File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(&tmp, path)
}

fn read_all(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn save_manifest(paths: &IndexPaths, manifest: &Manifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest)?;
    write_atomic(&paths.manifest(), json.as_bytes()).map_err(Error::storage("writing the manifest"))
}

/// `Ok(None)` when the directory holds no index yet.
pub fn load_manifest(paths: &IndexPaths) -> Result<Option<Manifest>> {
    let buf = match read_all(&paths.manifest()) {
        Ok(buf) => buf,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::storage("reading the manifest")(e)),
    };
    let manifest: Manifest = serde_json::from_slice(&buf).map_err(|e| Error::CorruptIndex(format!("manifest: {e}")))?;
    if manifest.version != FORMAT_VERSION {
        return Err(Error::CorruptIndex(format!("unsupported manifest version {}", manifest.version)));
    }
    Ok(Some(manifest))
}

pub fn save_segment(paths: &IndexPaths, name: &str, segment: &Segment) -> Result<()> {
    let bytes = bincode::serialize(segment)?;
    write_atomic(&paths.segment(name), &bytes).map_err(|e| Error::IndexWrite(format!("segment {name}: {e}")))
}

/// `Ok(None)` if the file is gone, which happens when a concurrent commit
/// dropped the segment after the manifest was read.
pub fn load_segment(paths: &IndexPaths, name: &str) -> Result<Option<Segment>> {
    let buf = match read_all(&paths.segment(name)) {
        Ok(buf) => buf,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::storage(format!("reading segment {name}"))(e)),
    };
    let segment = bincode::deserialize(&buf).map_err(|e| Error::CorruptIndex(format!("segment {name}: {e}")))?;
    Ok(Some(segment))
}

/// Deletes segment files not named in `live`. Returns how many were removed.
pub fn remove_stale_segments(paths: &IndexPaths, live: &[SegmentMeta]) -> Result<usize> {
    let dir = paths.segments_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(Error::storage("listing segments")(e)),
    };
    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(Error::storage("listing segments"))?;
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
        if path.extension().and_then(|s| s.to_str()) != Some("seg") {
            continue;
        }
        if live.iter().any(|s| s.name == stem) {
            continue;
        }
        fs::remove_file(&path).map_err(Error::storage(format!("removing segment {stem}")))?;
        removed += 1;
    }
    Ok(removed)
}

pub fn save_doc_id_map<T: Serialize>(path: &Path, map: &T) -> Result<()> {
    let bytes = bincode::serialize(map)?;
    write_atomic(path, &bytes).map_err(Error::storage(format!("writing identifier map {}", path.display())))
}

pub fn load_doc_id_map<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let buf = match read_all(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::MapNotFound(path.to_path_buf())),
        Err(e) => return Err(Error::storage(format!("reading identifier map {}", path.display()))(e)),
    };
    let map = bincode::deserialize(&buf)?;
    Ok(map)
}
