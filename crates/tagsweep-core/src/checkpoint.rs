//! Durable checkpoint file with atomic tmp→rename writes

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::record::{Cursor, Position};

/// Snapshot of everything needed to resume a run.
///
/// `item_cursors` values: a cursor means "next page starts here", `null`
/// means the item is exhausted; items never fetched are absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub processed_identities: Vec<String>,
    pub item_cursors: BTreeMap<String, Option<Cursor>>,
    pub total_accepted: u64,
}

impl CheckpointState {
    pub fn position(&self, item: &str) -> Position {
        position_of(&self.item_cursors, item)
    }

    pub fn set_position(&mut self, item: &str, position: Position) {
        apply_position(&mut self.item_cursors, item, position);
    }

    pub fn exhausted_items(&self) -> usize {
        self.item_cursors.values().filter(|c| c.is_none()).count()
    }
}

pub(crate) fn position_of(cursors: &BTreeMap<String, Option<Cursor>>, item: &str) -> Position {
    match cursors.get(item) {
        None => Position::Start,
        Some(None) => Position::Exhausted,
        Some(Some(c)) => Position::At(c.clone()),
    }
}

pub(crate) fn apply_position(
    cursors: &mut BTreeMap<String, Option<Cursor>>,
    item: &str,
    position: Position,
) {
    match position {
        Position::Start => {
            cursors.remove(item);
        }
        Position::At(c) => {
            cursors.insert(item.to_string(), Some(c));
        }
        Position::Exhausted => {
            cursors.insert(item.to_string(), None);
        }
    }
}

/// Reads and writes a [`CheckpointState`] as pretty-printed JSON.
#[derive(Clone, Debug)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Load state. Absent, unreadable or corrupt files yield an empty state.
    ///
    /// Read-only: a tmp file left next to the checkpoint may belong to a
    /// writer mid-save and is not touched here.
    pub fn load(&self) -> CheckpointState {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No checkpoint at {}, starting fresh", self.path.display());
                return CheckpointState::default();
            }
            Err(e) => {
                log::warn!(
                    "Cannot read checkpoint {}: {e}; starting fresh",
                    self.path.display()
                );
                return CheckpointState::default();
            }
        };

        match serde_json::from_str::<CheckpointState>(&content) {
            Ok(state) => {
                log::info!(
                    "Loaded checkpoint {}: total_accepted={} identities={} items={}",
                    self.path.display(),
                    state.total_accepted,
                    state.processed_identities.len(),
                    state.item_cursors.len()
                );
                state
            }
            Err(e) => {
                log::warn!(
                    "Corrupt checkpoint {}: {e}; starting fresh",
                    self.path.display()
                );
                CheckpointState::default()
            }
        }
    }

    /// Remove a tmp file left by an interrupted save. Only the process that
    /// owns the checkpoint for writing may call this.
    pub fn cleanup_tmp(&self) {
        let tmp = self.tmp_path();
        if tmp.exists() {
            log::warn!("Removing stale checkpoint tmp file: {}", tmp.display());
            if let Err(e) = fs::remove_file(&tmp) {
                log::warn!("Cannot remove {}: {e}", tmp.display());
            }
        }
    }

    /// Atomically replace the checkpoint: write tmp, fsync, rename.
    pub fn save(&self, state: &CheckpointState) -> io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_vec_pretty(state).map_err(io::Error::other)?;
        let tmp = self.tmp_path();
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&json)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        log::trace!(
            "checkpoint saved: total_accepted={} items={}",
            state.total_accepted,
            state.item_cursors.len()
        );
        Ok(())
    }

    /// Delete the checkpoint file. Returns whether a file was removed.
    pub fn remove(&self) -> io::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
