use std::path::Path;

use fleet_core::QueueStore;

use crate::commands::common::{format_queue_lines, open_queue, queue_entry_to_item, QueueItem};
use crate::error::CliError;

pub async fn run_queue_list(all: bool, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_queue(db_path).await?;
    let entries = if all {
        store.list_all().await?
    } else {
        store.list_pending().await?
    };

    if as_json {
        let json_items = entries
            .iter()
            .map(queue_entry_to_item)
            .collect::<Vec<QueueItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No queued trips.");
        return Ok(());
    }

    for line in format_queue_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_queue_prune(db_path: &Path) -> Result<(), CliError> {
    let removed = prune_queue(db_path).await?;
    println!("Removed {removed} synced trip(s)");
    Ok(())
}

pub async fn prune_queue(db_path: &Path) -> Result<usize, CliError> {
    let store = open_queue(db_path).await?;
    Ok(store.prune_synced().await?)
}
