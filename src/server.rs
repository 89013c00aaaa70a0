//! Local HTTP server for the renderer.
//!
//! Serves the configured root directory as static files, plus documents
//! registered with [`BodyServer::serve_once`] that can be fetched exactly one
//! time from `/?id=<token>`.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

use crate::{Error, RendererConfig, Result};

type BodyMap = Arc<Mutex<HashMap<String, String>>>;
type ServeTask = JoinHandle<std::io::Result<()>>;

/// HTTP server handing out one-shot HTML documents.
pub struct BodyServer {
    addr: SocketAddr,
    bodies: BodyMap,
    next_id: AtomicU64,
    running: Mutex<Option<(oneshot::Sender<()>, ServeTask)>>,
}

impl BodyServer {
    /// Bind and start serving in a background task.
    pub async fn start(config: &RendererConfig) -> Result<Self> {
        let bodies: BodyMap = Arc::default();

        let app = Router::new()
            .fallback_service(ServeDir::new(&config.root_dir))
            .layer(middleware::from_fn_with_state(bodies.clone(), serve_pending_body));

        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|e| {
                Error::ServerError(format!("Failed to bind {}:{}: {}", config.host, config.port, e))
            })?;
        let mut addr = listener.local_addr()?;
        if addr.ip().is_unspecified() {
            addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(
            "Body server listening on http://{} (root: {})",
            addr,
            config.root_dir.display()
        );

        Ok(Self {
            addr,
            bodies,
            next_id: AtomicU64::new(0),
            running: Mutex::new(Some((shutdown_tx, task))),
        })
    }

    /// Base URL of the server, without a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Generate a URL that will serve the given HTML body exactly one time.
    /// Once the URL has been requested, it falls through to static serving.
    pub fn serve_once(&self, body: impl Into<String>) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let url = format!("{}/?id={}", self.url(), id);
        self.bodies.lock().insert(id, body.into());
        url
    }

    /// Bodies registered but not fetched yet.
    pub fn pending(&self) -> usize {
        self.bodies.lock().len()
    }

    /// Shut the server down and wait for it to finish. Further calls are no-ops.
    pub async fn stop(&self) -> Result<()> {
        let running = self.running.lock().take();
        let Some((shutdown_tx, task)) = running else {
            return Ok(());
        };

        let _ = shutdown_tx.send(());
        task.await
            .map_err(|e| Error::ServerError(format!("Server task failed: {}", e)))?
            .map_err(|e| Error::ServerError(format!("Server shutdown failed: {}", e)))?;

        let leftover = self.pending();
        if leftover > 0 {
            debug!("Body server stopped with {} unfetched bodies", leftover);
        }
        info!("Body server on {} stopped", self.addr);
        Ok(())
    }
}

impl Drop for BodyServer {
    fn drop(&mut self) {
        if let Some((shutdown_tx, _task)) = self.running.get_mut().take() {
            warn!("Body server on {} dropped without stop()", self.addr);
            let _ = shutdown_tx.send(());
        }
    }
}

async fn serve_pending_body(State(bodies): State<BodyMap>, req: Request, next: Next) -> Response {
    if req.uri().path() == "/" {
        if let Some(id) = query_id(req.uri().query()) {
            let body = bodies.lock().remove(&id);
            match body {
                Some(body) => {
                    debug!("Serving one-shot body {}", id);
                    return ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body)
                        .into_response();
                }
                None => debug!("No pending body for id {}; falling through", id),
            }
        }
    }
    next.run(req).await
}

fn query_id(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
}
