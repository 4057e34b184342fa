//! Trellis CLI entry point

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trellis_indexer::ToolConfig;
use trellis_server::ServerConfig;
use trellis_watcher::WatchConfig;

mod commands;

const CRATES: &[&str] = &[
    "trellis",
    "trellis_core",
    "trellis_indexer",
    "trellis_server",
    "trellis_watcher",
    "tower_http",
];

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Live graph relay: reruns an analysis tool on every change and streams the graph to viewers", long_about = None)]
struct Cli {
    /// Directory to watch; the analysis tool runs with it as working directory
    dir: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "TRELLIS_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Analysis tool executable [default: draveur next to this binary]
    #[arg(long, env = "TRELLIS_TOOL")]
    tool: Option<PathBuf>,

    /// Extra argument passed to the analysis tool (repeatable)
    #[arg(long = "tool-arg", allow_hyphen_values = true)]
    tool_args: Vec<String>,

    /// File extension that triggers a recompute (repeatable)
    #[arg(long = "ext", default_value = "py")]
    extensions: Vec<String>,

    /// Kill a tool run after this many seconds (0 disables)
    #[arg(long, env = "TRELLIS_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,

    /// Quiet window collapsing bursts of file events, in milliseconds (0 disables)
    #[arg(long, env = "TRELLIS_DEBOUNCE_MS", default_value_t = 0)]
    debounce_ms: u64,

    /// Compute the graph once, print it as JSON and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn tool_config(&self) -> anyhow::Result<ToolConfig> {
        let program = match &self.tool {
            Some(program) => program.clone(),
            None => ToolConfig::default_program()?,
        };
        let timeout = (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));
        Ok(ToolConfig::new(program)
            .with_args(self.tool_args.iter().cloned())
            .with_timeout(timeout))
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }

    fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            extensions: self.extensions.clone(),
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env values act as defaults for the env-backed flags
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging; stdout stays clean for --once output
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives: Vec<String> = CRATES.iter().map(|krate| format!("{}={}", krate, log_level)).collect();
        EnvFilter::new(directives.join(","))
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Trellis v{}", env!("CARGO_PKG_VERSION"));

    let root = cli
        .dir
        .canonicalize()
        .with_context(|| format!("cannot resolve watch directory {}", cli.dir.display()))?;
    anyhow::ensure!(root.is_dir(), "{} is not a directory", root.display());

    let tool = cli.tool_config()?;
    tracing::info!("Analysis tool: {}", tool.program.display());

    if cli.once {
        commands::once(root, tool).await
    } else {
        commands::serve(root, tool, cli.server_config(), cli.watch_config()).await
    }
}
