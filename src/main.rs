//! Pagecount CLI
//!
//! Drives the counter engine from the command line:
//! - Count a page visit (local store or remote API)
//! - Read a count without counting
//! - Follow navigation read from stdin
//! - Query service statistics

use anyhow::Context;
use clap::{Parser, Subcommand};
use pagecount::config::{generate_default_config, Config};
use pagecount::counter::{
    backend_from_config, CounterController, CounterUpdated, FileStore, LocalCounter,
    NavigationSignal, PageModel, SharedLocation, SystemClock,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "pagecount")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Privacy-friendly page view counter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations, then environment)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Count through this counter API instead of the local store
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Local store file
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count a visit to a page and show the rendered counter
    Visit {
        /// Page path, e.g. /docs/intro/
        path: String,
        /// Print the HTML fragment
        #[arg(long)]
        html: bool,
    },

    /// Show a page's count without counting a visit
    Count {
        /// Page path
        path: String,
    },

    /// Count the start page, then every path read from stdin
    Watch {
        /// Initial page path
        #[arg(short, long, default_value = "/")]
        start: String,
    },

    /// Show site statistics from a running counter API
    Stats {
        /// Site hostname
        #[arg(short, long)]
        site: String,
        /// API base URL (default: configured endpoint)
        #[arg(long)]
        api_url: Option<String>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.counter.use_local_counter = false;
        config.counter.api_endpoint = Some(endpoint.clone());
    }
    if let Some(store) = &cli.store {
        config.storage.store_path = store.to_string_lossy().to_string();
    }
    config.logging.init_tracing();

    match cli.command {
        Commands::Visit { path, html } => {
            let (controller, page, _) = build_controller(&config, &path)?;

            match controller.activate().await {
                Some(update) => {
                    print_update(&update, &cli.format)?;
                    if html {
                        let page = page.lock().unwrap_or_else(|p| p.into_inner());
                        if let Some(fragment) = page.counter() {
                            println!("{}", fragment.to_html());
                        }
                    }
                }
                None => {
                    eprintln!("Counter did not update for {}", path);
                    std::process::exit(1);
                }
            }
        }

        Commands::Count { path } => {
            let (controller, _, _) = build_controller(&config, &path)?;
            let count = controller.current_count(Some(&path)).await;
            let update = CounterUpdated {
                count,
                page_path: controller.current_page().to_string(),
            };
            print_update(&update, &cli.format)?;
        }

        Commands::Watch { start } => {
            let (controller, _, location) = build_controller(&config, &start)?;
            let controller = Arc::new(controller);
            let mut updates = controller.subscribe();

            let (tx, rx) = mpsc::channel(16);
            let handle = Arc::clone(&controller).spawn(rx);

            let format = cli.format.clone();
            let printer = tokio::spawn(async move {
                while let Ok(update) = updates.recv().await {
                    if let Err(e) = print_update(&update, &format) {
                        eprintln!("Failed to print update: {}", e);
                    }
                }
            });

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let path = line.trim();
                if path.is_empty() {
                    continue;
                }
                location.set(path);
                tx.send(NavigationSignal::LocationChanged)
                    .await
                    .context("navigation loop stopped")?;
            }

            // Let the last navigation settle before stopping
            let settle = config.counter.navigation_delay_ms + config.counter.request_timeout_ms;
            tokio::time::sleep(std::time::Duration::from_millis(settle.min(2000))).await;

            drop(tx);
            handle.await?;
            drop(controller);
            printer.abort();
        }

        Commands::Stats { site, api_url } => {
            let base = api_url
                .or_else(|| config.counter.api_endpoint.clone())
                .context("no API URL: pass --api-url or configure counter.api_endpoint")?;

            let response = reqwest::Client::new()
                .get(format!("{}/stats", base.trim_end_matches('/')))
                .query(&[("site", site.as_str())])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                eprintln!("Stats request failed ({}): {}", status, text);
                std::process::exit(1);
            }

            let stats: serde_json::Value = response.json().await?;
            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

type Built = (CounterController, Arc<Mutex<PageModel>>, SharedLocation);

fn build_controller(config: &Config, path: &str) -> anyhow::Result<Built> {
    let store = Arc::new(
        FileStore::open(&config.storage.store_path)
            .with_context(|| format!("opening local store {}", config.storage.store_path))?,
    );
    let local = Arc::new(LocalCounter::new(
        store,
        Arc::new(SystemClock),
        config.counter.debounce_ms,
    ));
    tracing::debug!(
        remote = config.counter.uses_remote(),
        store = %config.storage.store_path,
        "Counter engine configured"
    );
    let backend = backend_from_config(&config.counter, local);

    let page = Arc::new(Mutex::new(PageModel::documentation_page()));
    let location = SharedLocation::new(path);

    let controller = CounterController::new(
        config.counter.clone(),
        backend,
        page.clone(),
        Arc::new(location.clone()),
    );

    Ok((controller, page, location))
}

fn print_update(update: &CounterUpdated, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string(update)?);
    } else {
        println!(
            "{}: {}",
            update.page_path,
            pagecount::counter::CounterFragment::new(update.count).label()
        );
    }
    Ok(())
}

fn print_stats(stats: &serde_json::Value) {
    println!("Site: {}", stats["site"].as_str().unwrap_or("unknown"));
    println!("Pages: {}", stats["total_pages"].as_u64().unwrap_or(0));
    println!("Views: {}", stats["total_views"].as_u64().unwrap_or(0));

    if let Some(top) = stats["top_pages"].as_array() {
        if !top.is_empty() {
            println!();
            println!("{:<50} {:>10}", "PAGE", "VIEWS");
            println!("{}", "-".repeat(61));
            for entry in top {
                println!(
                    "{:<50} {:>10}",
                    entry["page"].as_str().unwrap_or(""),
                    entry["views"].as_u64().unwrap_or(0)
                );
            }
        }
    }
}
