//! `tagsweep reset` - forget progress

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tagsweep_core::{CheckpointStore, Position};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Only forget this item's cursor (e.g. `travel` or `instagram/travel`);
    /// published identities and the total are kept
    #[arg(long)]
    pub item: Option<String>,

    /// Checkpoint file (default: [run] checkpoint)
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
}

pub fn run(args: ResetArgs, config: &Config) -> Result<()> {
    let path = args.checkpoint.unwrap_or_else(|| config.run.checkpoint.clone());
    let message = match args.item {
        Some(item) => reset_item(&path, &item)?,
        None => reset_all(&path)?,
    };
    println!("{message}");
    Ok(())
}

fn reset_item(path: &Path, item: &str) -> Result<String> {
    let store = CheckpointStore::new(path);
    let mut state = store.load();
    if !state.item_cursors.contains_key(item) {
        return Ok(format!("{item} is not tracked in {}", path.display()));
    }
    state.set_position(item, Position::Start);
    store
        .save(&state)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("item={item} cursor cleared");
    Ok(format!("Cleared cursor of {item}; it restarts from the first page"))
}

fn reset_all(path: &Path) -> Result<String> {
    let removed = CheckpointStore::new(path)
        .remove()
        .with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(if removed {
        format!("Removed {}", path.display())
    } else {
        format!("No checkpoint at {}", path.display())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsweep_core::{CheckpointState, Cursor};
    use tempfile::TempDir;

    fn seeded(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("cp.json");
        let mut state = CheckpointState {
            processed_identities: vec!["a".into()],
            total_accepted: 1,
            ..Default::default()
        };
        state.set_position("travel", Position::Exhausted);
        state.set_position("food", Position::At(Cursor::Offset(40)));
        CheckpointStore::new(&path).save(&state).unwrap();
        path
    }

    #[test]
    fn item_reset_keeps_identities() {
        let dir = TempDir::new().unwrap();
        let path = seeded(&dir);
        reset_item(&path, "travel").unwrap();

        let state = CheckpointStore::new(&path).load();
        assert_eq!(state.position("travel"), Position::Start);
        assert_eq!(state.position("food"), Position::At(Cursor::Offset(40)));
        assert_eq!(state.processed_identities, vec!["a"]);
        assert_eq!(state.total_accepted, 1);
    }

    #[test]
    fn unknown_item_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = seeded(&dir);
        let msg = reset_item(&path, "nope").unwrap();
        assert!(msg.contains("not tracked"));
        assert_eq!(CheckpointStore::new(&path).load().item_cursors.len(), 2);
    }

    #[test]
    fn full_reset_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = seeded(&dir);
        assert!(reset_all(&path).unwrap().starts_with("Removed"));
        assert!(!path.exists());
        assert!(reset_all(&path).unwrap().starts_with("No checkpoint"));
    }
}
