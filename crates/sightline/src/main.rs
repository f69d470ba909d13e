mod http;
mod service;
mod telemetry;

use std::path::PathBuf;

use anyhow::Context;
use chrono::SecondsFormat;
use clap::{Parser, Subcommand};
use sightline_core::config::{Config, ConfigOverrides};
use sightline_core::query::StatusResponse;
use sightline_store::Store;

use crate::http::{AppState, router};
use crate::service::{IssueService, ServiceSettings};
use crate::telemetry::{init_cli_tracing, init_serve_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "sightline")]
#[command(about = "Issue and incident query service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Serve the HTTP query API")]
    Serve {
        #[arg(long)]
        db_path: Option<PathBuf>,
        #[arg(long)]
        http_addr: Option<String>,
        #[arg(long, help = "Include internal error text in error responses")]
        debug: bool,
        #[arg(long)]
        max_page_limit: Option<u64>,
        #[arg(long, help = "Per-query timeout (e.g. 5s, 500ms)")]
        query_timeout: Option<String>,
        #[arg(long, help = "Velocity unit: second, minute, hour or day")]
        velocity_unit: Option<String>,
        #[arg(long, help = "Log output format: compact (or text) or json")]
        log_format: Option<String>,
    },
    #[command(about = "Show store status")]
    Status {
        #[arg(long)]
        db_path: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            db_path,
            http_addr,
            debug,
            max_page_limit,
            query_timeout,
            velocity_unit,
            log_format,
        } => {
            let mut cfg = Config::load().context("load config")?;
            cfg.apply(
                ConfigOverrides {
                    db_path,
                    http_addr,
                    debug: debug.then_some(true),
                    max_page_limit,
                    query_timeout,
                    velocity_unit,
                    log_format,
                },
                "command line",
            )?;
            run_server(cfg).await
        }
        Commands::Status { db_path, json } => {
            init_cli_tracing();
            let mut cfg = Config::load().context("load config")?;
            if let Some(v) = db_path {
                cfg.db_path = v;
            }
            let store = Store::open(&cfg.db_path)
                .with_context(|| format!("open store at {}", cfg.db_path.display()))?;
            let status = store.status()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status_human(&status);
            }
            Ok(())
        }
    }
}

async fn run_server(cfg: Config) -> anyhow::Result<()> {
    init_serve_tracing(cfg.log_format);

    let store = Store::open(&cfg.db_path)
        .with_context(|| format!("open store at {}", cfg.db_path.display()))?;
    let service = IssueService::new(store, ServiceSettings::from(&cfg));
    let app = router(AppState {
        service,
        debug: cfg.debug,
    });

    let listener = tokio::net::TcpListener::bind(&cfg.http_addr)
        .await
        .with_context(|| format!("bind {}", cfg.http_addr))?;

    eprintln!("sightline serve");
    eprintln!("  db: {}", cfg.db_path.display());
    eprintln!("  http: {}", cfg.http_addr);
    eprintln!("  max page limit: {}", cfg.max_page_limit);
    eprintln!(
        "  query timeout: {}",
        humantime::format_duration(cfg.query_timeout)
    );
    if cfg.debug {
        eprintln!("  debug: error details are included in responses");
    }
    tracing::info!(addr = %cfg.http_addr, "query api listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await;

    shutdown_tracing();
    result.context("http server")
}

fn print_status_human(v: &StatusResponse) {
    println!("db_path={}", v.db_path);
    println!("db_size_bytes={}", v.db_size_bytes);
    println!(
        "issues={} incidents={} spans={}",
        v.issues_count, v.incidents_count, v.spans_count
    );
    if let Some(oldest) = v.oldest_span {
        println!(
            "oldest={}",
            oldest.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
    }
    if let Some(newest) = v.newest_span {
        println!(
            "newest={}",
            newest.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
    }
}
