//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use trellis_core::{Broadcaster, GraphCache};
use trellis_indexer::{GraphSource, ProcessRunner, RecomputeCoordinator, ToolConfig, ToolSource, Trigger};
use trellis_server::{ServerConfig, TrellisServer};
use trellis_watcher::{WatchConfig, WatcherService};

pub async fn serve(
    root: PathBuf,
    tool: ToolConfig,
    server_config: ServerConfig,
    watch_config: WatchConfig,
) -> anyhow::Result<()> {
    tracing::info!("Watching: {}", root.display());

    let source = Arc::new(ToolSource::new(ProcessRunner::new(tool), &root));
    let coordinator = RecomputeCoordinator::new(source, Arc::new(GraphCache::new()), Broadcaster::default());

    // Start the watcher before the first run so no change slips between them
    let mut watcher = WatcherService::new(&root, &watch_config, Arc::clone(&coordinator))?;
    watcher.start_watching()?;
    tokio::spawn(async move {
        if let Err(e) = watcher.process_events().await {
            tracing::error!("File watcher error: {}", e);
        }
    });

    coordinator.request_recompute(Trigger::Startup);

    TrellisServer::new(coordinator, server_config).start().await
}

/// Run the tool a single time and print the decoded graph on stdout.
pub async fn once(root: PathBuf, tool: ToolConfig) -> anyhow::Result<()> {
    let source = ToolSource::new(ProcessRunner::new(tool), root);

    let started = Instant::now();
    let graph = source.compute().await?;
    tracing::info!(
        "Graph computed: {} nodes in {}ms",
        graph.node_count(),
        started.elapsed().as_millis()
    );

    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}
