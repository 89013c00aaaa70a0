//! Async renderer over a single shared editor page.
//!
//! One editor element on one tab is reused across all renders because the
//! browser has a large startup cost. Renders therefore take turns through a
//! [`PageLock`]; the backend itself is blocking and runs on tokio's blocking
//! pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::lock::PageLock;
use crate::server::BodyServer;
use crate::{EditorBackend, Error, Language, RenderedCode, RendererConfig, Result, RENDERED_CODE_SELECTOR};

#[cfg(feature = "cdp")]
use crate::cdp::CdpEditor;

/// A running render session: one browser tab, one body server.
pub struct Renderer<B: EditorBackend> {
    backend: Arc<B>,
    server: BodyServer,
    lock: Arc<PageLock>,
    stopped: AtomicBool,
    editor_tag: String,
}

#[cfg(feature = "cdp")]
impl Renderer<CdpEditor> {
    /// Launch headless Chrome, start the body server and load the editor.
    pub async fn start(config: RendererConfig) -> Result<Self> {
        let launch_config = config.clone();
        let backend = run_blocking(move || CdpEditor::launch(&launch_config)).await?;
        Self::with_backend(config, backend).await
    }
}

impl<B: EditorBackend> Renderer<B> {
    /// Start a session over an already launched backend.
    ///
    /// Serves the bootstrap document once and points the backend's page at
    /// it. On failure the server and backend are dropped, which shuts both
    /// down.
    pub async fn with_backend(config: RendererConfig, backend: B) -> Result<Self> {
        let backend = Arc::new(backend);
        let server = BodyServer::start(&config).await?;

        let url = server.serve_once(config.bootstrap_html());
        let loader = backend.clone();
        run_blocking(move || loader.load_url(&url)).await?;

        info!("Renderer ready (server {})", server.url());
        Ok(Self {
            backend,
            server,
            lock: Arc::new(PageLock::new()),
            stopped: AtomicBool::new(false),
            editor_tag: config.editor_tag,
        })
    }

    /// Highlight `code` as `language`.
    ///
    /// Renders are serialized in the order they reach the page lock. A
    /// failed render still releases the lock. If the returned future is
    /// dropped mid-render, the page stays locked until the browser call
    /// it started has returned.
    pub async fn render(&self, language: Language, code: &str) -> Result<RenderedCode> {
        if self.is_stopped() {
            return Err(Error::Stopped);
        }

        let page = self.lock.clone().acquire_owned().await;
        // stop() may have run while we were queued.
        if self.is_stopped() {
            return Err(Error::Stopped);
        }

        debug!("Rendering {} bytes of {}", code.len(), language);
        let backend = self.backend.clone();
        let code = code.to_string();
        let inner = run_blocking(move || {
            let _page = page;
            backend.update_editor(language, &code)
        })
        .await?
        .ok_or_else(|| {
            Error::MissingElement(format!(
                "<{}> did not render a \"{}\" element",
                self.editor_tag, RENDERED_CODE_SELECTOR
            ))
        })?;

        debug!("Rendered {} bytes of markup", inner.len());
        Ok(RenderedCode::wrap(&inner))
    }

    /// Stop the body server and close the browser, concurrently. Calling it
    /// again does nothing.
    pub async fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let backend = self.backend.clone();
        let (server_res, backend_res) =
            futures::join!(self.server.stop(), run_blocking(move || backend.close()));
        server_res?;
        backend_res?;

        info!("Renderer stopped");
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// The body server backing this session
    pub fn server(&self) -> &BodyServer {
        &self.server
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Other(format!("Browser worker failed: {}", e)))?
}
