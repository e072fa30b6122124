//! gqlscope CLI - GraphQL traffic log for intercepting proxies.
//!
//! Usage:
//!   gqlscope serve               # Run the feed daemon in the foreground
//!   gqlscope rows                # Print the call log
//!   gqlscope show <row>          # Request/response detail for one row
//!   gqlscope stats               # Ingest counters
//!   gqlscope clear               # Clear the log
//!   gqlscope stop                # Stop the daemon
//!   gqlscope replay <file>       # Ingest a JSON-lines capture offline

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gqlscope::daemon::{self, Request, Response, RowDetail, WireEvent};
use gqlscope::{CallRegistry, Column, Config, Http1Analyzer, IngestPipeline, TrafficEvent, ViewerFacade};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gqlscope")]
#[command(about = "gqlscope - GraphQL traffic inspector", long_about = None)]
struct Cli {
    /// Working directory holding gqlscope.toml and the state directory
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Config file (default: <root>/gqlscope.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the feed daemon in the foreground
    Serve,

    /// Print the call log as a table
    Rows {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one row with its raw request and response
    Show {
        /// Row number as printed by `rows` (0-based)
        row: usize,
    },

    /// Show ingest counters
    Stats,

    /// Clear the call log
    Clear,

    /// Check whether the daemon is up
    Ping,

    /// Stop the daemon
    Stop,

    /// Ingest a JSON-lines file of traffic events and print the result
    Replay {
        /// One traffic event object per line
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = cli.root.canonicalize().unwrap_or(cli.root);
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&root)?,
    };
    init_tracing(&config);

    let sock = config.socket_path(&root);

    match cli.command {
        Commands::Serve => {
            if daemon::is_daemon_running(&root, &config) {
                bail!("daemon already running ({})", sock.display());
            }
            info!(root = %root.display(), "starting daemon");
            daemon::start_daemon(&root, &config)?;
        }

        Commands::Rows { json } => {
            let data = query(&sock, Request::Rows)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_rows_json(&data);
            }
        }

        Commands::Show { row } => {
            let data = query(&sock, Request::Row { row })?;
            let detail: RowDetail = serde_json::from_value(data)?;
            print_detail(&detail);
        }

        Commands::Stats => {
            let data = query(&sock, Request::Stats)?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }

        Commands::Clear => {
            let data = query(&sock, Request::Clear)?;
            println!("Cleared {} rows", data["cleared"]);
        }

        Commands::Ping => match daemon::send_request(&sock, &Request::Ping) {
            Ok(Response::Pong) => println!("daemon is running ({})", sock.display()),
            Ok(other) => bail!("unexpected reply: {:?}", other),
            Err(_) => {
                println!("daemon is not running");
                std::process::exit(1);
            }
        },

        Commands::Stop => match daemon::send_request(&sock, &Request::Shutdown)? {
            Response::Goodbye => println!("daemon stopped"),
            other => bail!("unexpected reply: {:?}", other),
        },

        Commands::Replay { file } => replay(&file, &config)?,
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Send a request and unwrap an `ok` reply.
fn query(sock: &Path, request: Request) -> Result<serde_json::Value> {
    match daemon::send_request(sock, &request).context("is the daemon running? (gqlscope serve)")? {
        Response::Ok { data } => Ok(data),
        Response::Error { message } => bail!(message),
        other => bail!("unexpected reply: {:?}", other),
    }
}

// Offline mode: fresh registry, same pipeline as the daemon
fn replay(file: &Path, config: &Config) -> Result<()> {
    let registry = Arc::new(CallRegistry::new());
    let pipeline = IngestPipeline::with_config(Arc::clone(&registry), Arc::new(Http1Analyzer), config);
    let viewer = ViewerFacade::new(registry);

    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WireEvent>(&line) {
            Ok(event) => {
                pipeline.on_traffic_event(&TrafficEvent::from(event));
            }
            Err(e) => warn!(line = n + 1, error = %e, "skipping unreadable event"),
        }
    }

    let table: Vec<Vec<String>> = viewer
        .rows()
        .into_iter()
        .map(|row| row.into_iter().map(|v| v.to_string()).collect())
        .collect();
    print_table(&table);

    let stats = pipeline.stats();
    eprintln!(
        "{} events: {} calls, {} responses matched, {} empty, {} ignored, {} unmatched, {} rejected",
        stats.seen,
        stats.inserted,
        stats.updated,
        stats.empty,
        stats.ignored,
        stats.unmatched,
        stats.rejected
    );
    Ok(())
}

fn print_rows_json(data: &serde_json::Value) {
    let rows = data["rows"].as_array().cloned().unwrap_or_default();
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let text = |key: &str| r[key].as_str().unwrap_or_default().to_string();
            vec![
                r["sequence_id"].to_string(),
                text("host"),
                text("method"),
                text("url"),
                text("operation_name"),
                r["status_code"].as_u64().map(|s| s.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&table);
}

fn print_table(rows: &[Vec<String>]) {
    let headers: Vec<&str> = Column::ALL.iter().map(|c| c.header()).collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(headers.clone()));
    println!("{}", line(widths.iter().map(|_| "").collect()).replace(' ', "-"));
    for row in rows {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
    if rows.is_empty() {
        println!("(no GraphQL calls yet)");
    }
}

fn print_detail(detail: &RowDetail) {
    let call = &detail.call;
    println!("#{} {} {}", call.sequence_id, call.method, call.url);
    println!("  Service:   {}", detail.service);
    println!(
        "  Operation: {}",
        if call.operation_name.is_empty() { "-" } else { &call.operation_name }
    );
    match call.status_code {
        Some(code) => println!("  Status:    {}", code),
        None => println!("  Status:    (awaiting response)"),
    }
    println!("  Requested: {}", call.requested_at.to_rfc3339());
    if let Some(at) = call.responded_at {
        println!("  Responded: {}", at.to_rfc3339());
    }
    println!();
    println!("── Request ──────────────────────────────");
    println!("{}", detail.request);
    if let Some(response) = &detail.response {
        println!();
        println!("── Response ─────────────────────────────");
        println!("{}", response);
    }
}
