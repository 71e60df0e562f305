//! Netscribe — targeted network and console capture host.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use netscribe_capture::{read_network_report, SystemClock};
use netscribe_core::NetscribeConfig;
use netscribe_server::{routes, watcher, AppState};
use netscribe_store::SqliteStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn resolve_data_dir() -> PathBuf {
    std::env::var("NETSCRIBE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

fn build_state(data_dir: &Path) -> anyhow::Result<Arc<AppState>> {
    let config = NetscribeConfig::from_env(data_dir)?;
    let store = SqliteStore::open(&config.data_paths.storage)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;
    let state = AppState::new(config, Arc::new(store), Arc::new(SystemClock))
        .map_err(|e| anyhow::anyhow!("Failed to initialize state: {}", e))?;
    Ok(Arc::new(state))
}

/// Write the reports for everything persisted so far.
fn export_once(data_dir: &Path) -> anyhow::Result<bool> {
    let state = build_state(data_dir)?;
    let report = state.panel.download()?;
    println!("{}", report.status.text);
    for path in &report.saved {
        println!("  {}", path.display());
    }
    Ok(!report.status.is_error)
}

/// Parse a network report and print it as JSON.
fn inspect_report(path: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)?;
    let entries = read_network_report(&text)?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    // Handle CLI subcommands
    if args.len() > 1 {
        match args[1].as_str() {
            "--export" | "export" => {
                let data_dir = if args.len() > 2 {
                    PathBuf::from(&args[2])
                } else {
                    resolve_data_dir()
                };
                let wrote = export_once(&data_dir)?;
                std::process::exit(if wrote { 0 } else { 1 });
            }
            "--inspect" | "inspect" => {
                if args.len() < 3 {
                    eprintln!("Usage: netscribe inspect <network-log.txt>");
                    std::process::exit(1);
                }
                inspect_report(Path::new(&args[2]))?;
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("Netscribe: targeted network and console capture");
                println!();
                println!("Usage: netscribe [command]");
                println!();
                println!("Commands:");
                println!("  (none)                   Start the host");
                println!("  export [data-dir]        Write reports for persisted logs");
                println!("  inspect <report>         Print a network report as JSON");
                println!("  help                     Show this help message");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'netscribe help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let state = build_state(&data_dir)?;
    let port = state.config.port;

    watcher::start_settings_watcher(state.clone());

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Netscribe host listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
