//! Daemon server: Unix socket server fed by proxy plugins and queried by the CLI.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::ingest::IngestPipeline;
use crate::registry::CallRegistry;
use crate::traffic::{Http1Analyzer, TrafficEvent};
use crate::viewer::ViewerFacade;

use super::protocol::{Request, Response, RowDetail};

/// Everything a connection handler needs.
struct Session {
    pipeline: IngestPipeline,
    viewer: ViewerFacade,
}

/// Start the daemon server and block until it is told to shut down.
pub fn start_daemon(root: &Path, config: &Config) -> Result<()> {
    let root = root.canonicalize()?;
    let sock_path = config.socket_path(&root);
    let pid_file = config.pid_path(&root);

    // Ensure state directory exists
    if let Some(dir) = sock_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    // Remove stale socket if exists
    if sock_path.exists() {
        std::fs::remove_file(&sock_path)?;
    }

    std::fs::write(&pid_file, std::process::id().to_string())?;

    let listener = UnixListener::bind(&sock_path)
        .with_context(|| format!("binding {}", sock_path.display()))?;
    info!(socket = %sock_path.display(), "daemon listening");

    let result = serve(listener, config);

    info!("daemon shutting down");
    let _ = std::fs::remove_file(&sock_path);
    let _ = std::fs::remove_file(&pid_file);

    result
}

/// Accept connections on `listener` until a `shutdown` request arrives.
pub fn serve(listener: UnixListener, config: &Config) -> Result<()> {
    let registry = Arc::new(CallRegistry::new());
    let session = Arc::new(Session {
        pipeline: IngestPipeline::with_config(
            Arc::clone(&registry),
            Arc::new(Http1Analyzer),
            config,
        ),
        viewer: ViewerFacade::new(registry),
    });
    let local_addr = listener.local_addr()?;
    let shutdown = Arc::new(AtomicBool::new(false));

    for stream in listener.incoming() {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match stream {
            Ok(stream) => {
                let session = Arc::clone(&session);
                let shutdown = Arc::clone(&shutdown);
                let wake = local_addr.as_pathname().map(Path::to_path_buf);

                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, &session, &shutdown) {
                        debug!(error = %e, "client handler error");
                    }
                    // Unblock the accept loop so it sees the flag.
                    if shutdown.load(Ordering::Relaxed) {
                        if let Some(path) = wake {
                            let _ = UnixStream::connect(path);
                        }
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "accept error");
            }
        }
    }

    Ok(())
}

/// Handle one connection: any number of request lines, one response each.
fn handle_client(stream: UnixStream, session: &Session, shutdown: &AtomicBool) -> Result<()> {
    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let stop = matches!(request, Request::Shutdown);
                let response = process_request(request, session, shutdown);
                if stop {
                    writeln!(writer, "{}", serde_json::to_string(&response)?)?;
                    return Ok(());
                }
                response
            }
            Err(e) => Response::error(format!("bad request: {}", e)),
        };

        writeln!(writer, "{}", serde_json::to_string(&response)?)?;
    }

    Ok(())
}

/// Process a request and return a response.
fn process_request(request: Request, session: &Session, shutdown: &AtomicBool) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Shutdown => {
            shutdown.store(true, Ordering::Relaxed);
            Response::Goodbye
        }

        // ─── Ingest ────────────────────────────────────────────
        Request::Traffic { event } => {
            let outcome = session.pipeline.on_traffic_event(&TrafficEvent::from(event));
            Response::ok(serde_json::json!({ "outcome": format!("{:?}", outcome) }))
        }

        // ─── Queries ───────────────────────────────────────────
        Request::Rows => {
            let rows = session.pipeline.registry().summaries();
            Response::ok(serde_json::json!({
                "count": rows.len(),
                "session_id": session.pipeline.registry().session_id(),
                "rows": rows,
            }))
        }

        Request::Row { row } => match session.viewer.select_row(row) {
            Some(record) => Response::ok(RowDetail {
                row,
                call: record.summary(),
                service: record.service.clone(),
                request: String::from_utf8_lossy(&record.request).into_owned(),
                response: record
                    .response
                    .as_deref()
                    .map(|r| String::from_utf8_lossy(r).into_owned()),
            }),
            None => Response::error(format!(
                "row {} out of range (log has {} rows)",
                row,
                session.viewer.row_count()
            )),
        },

        Request::Stats => Response::ok(serde_json::json!({
            "rows": session.viewer.row_count(),
            "ingest": session.pipeline.stats(),
        })),

        Request::Clear => {
            let cleared = session.viewer.row_count();
            session.pipeline.registry().reset();
            Response::ok(serde_json::json!({ "cleared": cleared }))
        }
    }
}

/// Check if daemon is running by checking PID file and process.
pub fn is_daemon_running(root: &Path, config: &Config) -> bool {
    let pid_file = config.pid_path(root);

    if !pid_file.exists() {
        return false;
    }

    if let Ok(pid_str) = std::fs::read_to_string(&pid_file) {
        if let Ok(pid) = pid_str.trim().parse::<i32>() {
            // Signal 0 only checks that the process exists.
            unsafe {
                return libc::kill(pid, 0) == 0;
            }
        }
    }

    false
}

/// Send a request to the daemon and get a response.
pub fn send_request(sock_path: &Path, request: &Request) -> Result<Response> {
    let mut stream = UnixStream::connect(sock_path)
        .with_context(|| format!("connecting to {}", sock_path.display()))?;

    let request_json = serde_json::to_string(request)?;
    writeln!(stream, "{}", request_json)?;
    stream.shutdown(std::net::Shutdown::Write)?;

    let mut reader = BufReader::new(stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: Response = serde_json::from_str(&response_line)?;
    Ok(response)
}
