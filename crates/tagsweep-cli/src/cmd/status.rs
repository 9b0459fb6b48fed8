//! `tagsweep status` - summarize the checkpoint file

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use comfy_table::Table;
use tagsweep_core::CheckpointState;
use tagsweep_core::progress::fmt_num;

use crate::config::Config;

/// In-progress items listed individually up to this count
const MAX_LISTED: usize = 20;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Checkpoint file (default: [run] checkpoint)
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
}

pub fn run(args: StatusArgs, config: &Config) -> Result<()> {
    let path = args.checkpoint.unwrap_or_else(|| config.run.checkpoint.clone());
    if !path.exists() {
        println!("No checkpoint at {}", path.display());
        return Ok(());
    }
    let state = tagsweep_core::CheckpointStore::new(&path).load();
    println!("{}", format_status(&state, config.run.target_total));
    Ok(())
}

fn format_status(state: &CheckpointState, target: Option<u64>) -> Table {
    let mut table = super::table(["Checkpoint", "Value"]);
    let accepted = match target {
        Some(t) => format!("{} / {}", fmt_num(state.total_accepted as usize), fmt_num(t as usize)),
        None => fmt_num(state.total_accepted as usize),
    };
    table.add_row(vec!["Total accepted", &accepted]);
    table.add_row(vec![
        "Identities",
        &fmt_num(state.processed_identities.len()),
    ]);

    let exhausted = state.exhausted_items();
    let in_progress: Vec<(&String, String)> = state
        .item_cursors
        .iter()
        .filter_map(|(item, cursor)| cursor.as_ref().map(|c| (item, c.to_string())))
        .collect();
    table.add_row(vec!["Items exhausted", &exhausted.to_string()]);
    table.add_row(vec!["Items in progress", &in_progress.len().to_string()]);

    for (item, cursor) in in_progress.iter().take(MAX_LISTED) {
        table.add_row(vec![format!("  {item}"), format!("cursor {cursor}")]);
    }
    if in_progress.len() > MAX_LISTED {
        table.add_row(vec![
            "  ...".to_string(),
            format!("{} more", in_progress.len() - MAX_LISTED),
        ]);
    }
    table
}
