//! Pristine baselines and pre-run snapshots of managed files
//!
//! Every percentage directive is relative to the first content ever seen for
//! a file. The store captures that content once and hands it back on every
//! run, which is what keeps repeated runs from compounding their changes.
//! Each run also appends a timestamped copy of what was on disk before the
//! run, for manual rollback inspection.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const SNAPSHOT_TIME_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// A timestamped copy of a file taken before a run mutated it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the copy was taken
    pub taken_at: DateTime<Utc>,
    /// File content at that time
    pub content: Vec<u8>,
}

impl Snapshot {
    pub fn now(content: &[u8]) -> Self {
        Self {
            taken_at: Utc::now(),
            content: content.to_vec(),
        }
    }
}

/// Everything the store knows about one managed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineRecord {
    pub file_id: String,
    pub pristine: Vec<u8>,
    pub history: Vec<Snapshot>,
}

/// Persistence behind a [`BaselineStore`]
pub trait BaselineBackend {
    /// Load the pristine content, if captured
    fn load_pristine(&self, file_id: &str) -> Result<Option<Vec<u8>>>;

    /// Durably persist the pristine content
    fn store_pristine(&mut self, file_id: &str, content: &[u8]) -> Result<()>;

    /// Remove the pristine content; absent content is not an error
    fn remove_pristine(&mut self, file_id: &str) -> Result<()>;

    /// Append a snapshot to the file's history
    fn append_snapshot(&mut self, file_id: &str, snapshot: &Snapshot) -> Result<()>;

    /// History in the order it was taken
    fn snapshots(&self, file_id: &str) -> Result<Vec<Snapshot>>;

    /// Discard the history, returning how many snapshots were removed
    fn clear_snapshots(&mut self, file_id: &str) -> Result<usize>;

    /// Ids that currently have a pristine baseline, sorted
    fn file_ids(&self) -> Result<Vec<String>>;
}

/// Write-once pristine baselines over an injected backend
#[derive(Debug)]
pub struct BaselineStore<B> {
    backend: B,
}

impl<B: BaselineBackend> BaselineStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Capture `current` as pristine unless a baseline exists; return the pristine content
    pub fn ensure_baseline(&mut self, file_id: &str, current: &[u8]) -> Result<Vec<u8>> {
        validate_file_id(file_id)?;
        if let Some(existing) = self.backend.load_pristine(file_id)? {
            return Ok(existing);
        }
        self.backend.store_pristine(file_id, current)?;
        info!(file_id, bytes = current.len(), "captured pristine baseline");
        Ok(current.to_vec())
    }

    /// Record what was on disk before this run touched it
    pub fn snapshot_before_run(&mut self, file_id: &str, current: &[u8]) -> Result<()> {
        validate_file_id(file_id)?;
        self.backend.append_snapshot(file_id, &Snapshot::now(current))?;
        debug!(file_id, "recorded pre-run snapshot");
        Ok(())
    }

    /// Pristine content for `file_id`
    pub fn restore(&self, file_id: &str) -> Result<Vec<u8>> {
        validate_file_id(file_id)?;
        self.backend
            .load_pristine(file_id)?
            .ok_or_else(|| Error::BaselineMissing {
                file_id: file_id.to_string(),
            })
    }

    /// Pristine content if one was captured
    pub fn pristine(&self, file_id: &str) -> Result<Option<Vec<u8>>> {
        validate_file_id(file_id)?;
        self.backend.load_pristine(file_id)
    }

    /// Discard run history; the pristine baseline is kept
    pub fn reset(&mut self, file_id: &str) -> Result<usize> {
        validate_file_id(file_id)?;
        let removed = self.backend.clear_snapshots(file_id)?;
        info!(file_id, removed, "cleared snapshot history");
        Ok(removed)
    }

    /// Discard run history and the pristine baseline
    ///
    /// The next [`BaselineStore::ensure_baseline`] captures whatever content is
    /// passed to it, so only call this when that content is meant to become
    /// the new ground truth.
    pub fn full_reset(&mut self, file_id: &str) -> Result<()> {
        self.reset(file_id)?;
        self.backend.remove_pristine(file_id)?;
        info!(file_id, "discarded pristine baseline");
        Ok(())
    }

    pub fn history(&self, file_id: &str) -> Result<Vec<Snapshot>> {
        validate_file_id(file_id)?;
        self.backend.snapshots(file_id)
    }

    pub fn record(&self, file_id: &str) -> Result<BaselineRecord> {
        Ok(BaselineRecord {
            file_id: file_id.to_string(),
            pristine: self.restore(file_id)?,
            history: self.history(file_id)?,
        })
    }

    pub fn file_ids(&self) -> Result<Vec<String>> {
        self.backend.file_ids()
    }
}

/// File ids double as file names, so keep them to a portable character set
pub fn validate_file_id(file_id: &str) -> Result<()> {
    let valid = !file_id.is_empty()
        && !file_id.starts_with('.')
        && file_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidFileId(file_id.to_string()))
    }
}

/// In-memory backend for tests and previews
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    pristine: HashMap<String, Vec<u8>>,
    history: HashMap<String, Vec<Snapshot>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaselineBackend for MemoryBackend {
    fn load_pristine(&self, file_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.pristine.get(file_id).cloned())
    }

    fn store_pristine(&mut self, file_id: &str, content: &[u8]) -> Result<()> {
        self.pristine.insert(file_id.to_string(), content.to_vec());
        Ok(())
    }

    fn remove_pristine(&mut self, file_id: &str) -> Result<()> {
        self.pristine.remove(file_id);
        Ok(())
    }

    fn append_snapshot(&mut self, file_id: &str, snapshot: &Snapshot) -> Result<()> {
        self.history
            .entry(file_id.to_string())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    fn snapshots(&self, file_id: &str) -> Result<Vec<Snapshot>> {
        Ok(self.history.get(file_id).cloned().unwrap_or_default())
    }

    fn clear_snapshots(&mut self, file_id: &str) -> Result<usize> {
        Ok(self.history.remove(file_id).map_or(0, |v| v.len()))
    }

    fn file_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.pristine.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Backup directory backend
///
/// Layout:
/// - `<root>/pristine/<file_id>.orig`
/// - `<root>/history/<file_id>/<timestamp>_<seq>.snap`
#[derive(Debug, Clone)]
pub struct DirectoryBackend {
    root: PathBuf,
}

impl DirectoryBackend {
    /// Open (and create if needed) a backup directory
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("pristine"))?;
        fs::create_dir_all(root.join("history"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pristine_path(&self, file_id: &str) -> PathBuf {
        self.root.join("pristine").join(format!("{file_id}.orig"))
    }

    fn history_dir(&self, file_id: &str) -> PathBuf {
        self.root.join("history").join(file_id)
    }

    fn snapshot_paths(&self, file_id: &str) -> Result<Vec<PathBuf>> {
        let dir = self.history_dir(file_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if entry.path().extension().is_some_and(|ext| ext == "snap") {
                paths.push(entry.into_path());
            }
        }
        Ok(paths)
    }
}

impl BaselineBackend for DirectoryBackend {
    fn load_pristine(&self, file_id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.pristine_path(file_id);
        if !path.exists() {
            return Ok(None);
        }
        fs::read(&path)
            .map(Some)
            .map_err(|source| Error::FileRead { path, source })
    }

    fn store_pristine(&mut self, file_id: &str, content: &[u8]) -> Result<()> {
        let path = self.pristine_path(file_id);
        let tmp = path.with_extension("orig.tmp");
        write_synced(&tmp, content)?;
        fs::rename(&tmp, &path).map_err(|source| Error::FileWrite { path, source })
    }

    fn remove_pristine(&mut self, file_id: &str) -> Result<()> {
        let path = self.pristine_path(file_id);
        if path.exists() {
            fs::remove_file(&path).map_err(|source| Error::FileWrite { path, source })?;
        }
        Ok(())
    }

    fn append_snapshot(&mut self, file_id: &str, snapshot: &Snapshot) -> Result<()> {
        let dir = self.history_dir(file_id);
        fs::create_dir_all(&dir)?;
        let seq = self.snapshot_paths(file_id)?.len();
        let name = format!(
            "{}_{:04}.snap",
            snapshot.taken_at.format(SNAPSHOT_TIME_FORMAT),
            seq
        );
        write_synced(&dir.join(name), &snapshot.content)
    }

    fn snapshots(&self, file_id: &str) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        for path in self.snapshot_paths(file_id)? {
            let taken_at = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.split('_').next())
                .and_then(|s| NaiveDateTime::parse_from_str(s, SNAPSHOT_TIME_FORMAT).ok())
                .map(|naive| naive.and_utc())
                .ok_or_else(|| {
                    Error::Config(format!("unrecognised snapshot name {}", path.display()))
                })?;
            let content = fs::read(&path).map_err(|source| Error::FileRead {
                path: path.clone(),
                source,
            })?;
            snapshots.push(Snapshot { taken_at, content });
        }
        Ok(snapshots)
    }

    fn clear_snapshots(&mut self, file_id: &str) -> Result<usize> {
        let removed = self.snapshot_paths(file_id)?.len();
        let dir = self.history_dir(file_id);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(removed)
    }

    fn file_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in WalkDir::new(self.root.join("pristine"))
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "orig") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }
}

fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
    let write = || -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(content)?;
        file.sync_all()
    };
    write().map_err(|source| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}
