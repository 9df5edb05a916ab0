//! MCP server startup: open storage, reconcile registered folders in the
//! background, then serve JSON-RPC on stdio.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use docsearch::{ContentIndexer, SearchError, Settings};

use crate::mcp;

pub fn cmd_serve(settings: Settings) -> Result<(), SearchError> {
    info!(
        storage = %settings.storage_dir().display(),
        everything_url = %settings.everything_url,
        watcher = settings.enable_watcher,
        "Starting MCP server"
    );

    let ctx = super::open_context(settings)?;
    let folders = ctx.engine.list_folders();
    let indexer = Arc::clone(ctx.engine.indexer());

    // ─── Startup reconciliation: don't block the event loop ───
    std::thread::Builder::new()
        .name("docsearch-rescan".to_string())
        .spawn(move || rescan_registered(&indexer, &folders))?;

    mcp::server::run_server(ctx);
    Ok(())
}

/// Re-scan every registered folder so changes made while the server was
/// down are picked up. The watcher, if enabled, attaches to the first
/// folder that scans successfully.
fn rescan_registered(indexer: &ContentIndexer, folders: &[String]) {
    if folders.is_empty() {
        info!("No registered folders, skipping startup scan");
        return;
    }
    let start = Instant::now();
    let mut total = 0usize;
    for folder in folders {
        match indexer.index_folder(&PathBuf::from(folder)) {
            Ok(count) => total += count,
            Err(e) => warn!(folder = %folder, error = %e, "Startup scan failed"),
        }
    }
    info!(
        folders = folders.len(),
        indexed = total,
        documents = indexer.index().snapshot().len(),
        elapsed_ms = format_args!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
        "Startup scan complete"
    );
}
