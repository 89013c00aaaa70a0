//! Playground Renderer
//!
//! Renders syntax-highlighted code for a documentation site's code playground
//! by pushing source text into a `<codemirror-editor>` web component running
//! in headless Chrome and scraping back the markup it produces.
//!
//! # Features
//!
//! - **CDP Backend** (default): Uses Chrome DevTools Protocol via headless Chrome
//! - **One-shot pages**: HTML documents are served exactly once from a local
//!   static file server
//! - **Serialized renders**: a FIFO page lock time-slices the single shared tab
//!
//! # Example
//!
//! ```no_run
//! use playground_renderer::{Language, Renderer, RendererConfig};
//!
//! # async fn run() -> playground_renderer::Result<()> {
//! let config = RendererConfig {
//!     root_dir: "site".into(),
//!     ..Default::default()
//! };
//!
//! let renderer = Renderer::start(config).await?;
//! let out = renderer.render(Language::Ts, "const x: number = 1;").await?;
//! println!("{}", out.html);
//! renderer.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod lock;
pub mod renderer;
pub mod server;
pub mod visual;

#[cfg(feature = "cdp")]
pub mod cdp;

// Browser driver for the hosted playground page (end-to-end scenarios)
#[cfg(feature = "cdp")]
pub mod playground;

pub use lock::{OwnedPageLockGuard, PageLock, PageLockGuard};
pub use renderer::Renderer;
pub use server::BodyServer;

/// Class list of the wrapper element placed around the scraped markup.
pub const WRAPPER_CLASS: &str = "CodeMirror cm-s-default";

/// Selector of the element inside the editor's shadow root holding the
/// highlighted lines.
pub const RENDERED_CODE_SELECTOR: &str = ".CodeMirror-code";

/// Configuration for the renderer
///
/// The defaults serve files from the current directory on a free port of
/// the loopback interface and load the editor component from the location
/// the documentation site installs it to.
///
/// # Examples
///
/// ```
/// let cfg = playground_renderer::RendererConfig::default();
/// assert_eq!(cfg.port, 0);
/// assert!(cfg.bootstrap_html().contains("codemirror-editor"));
/// ```
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Directory served by the static file fallback
    pub root_dir: PathBuf,
    /// Interface the body server binds to (also used in generated URLs)
    pub host: String,
    /// Port to listen on (0 picks a free port)
    pub port: u16,
    /// Browser window dimensions
    pub viewport: Viewport,
    /// Module URL that defines the editor custom element
    pub editor_module: String,
    /// Tag name of the editor custom element
    pub editor_tag: String,
    /// How long the browser may sit idle before `headless_chrome` gives up on it
    pub idle_browser_timeout: Duration,
    /// Explicit Chrome binary; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            host: "127.0.0.1".to_string(),
            port: 0,
            viewport: Viewport::default(),
            editor_module: "/node_modules/code-sample-editor/lib/codemirror-editor.js".to_string(),
            editor_tag: "codemirror-editor".to_string(),
            idle_browser_timeout: Duration::from_secs(30),
            chrome_path: None,
        }
    }
}

impl RendererConfig {
    /// The document that instantiates the editor as `window.editor`.
    pub fn bootstrap_html(&self) -> String {
        format!(
            r#"<!doctype html>
<script type="module">
  import "{module}";
  window.editor = document.createElement('{tag}');
  document.body.appendChild(window.editor);
</script>
"#,
            module = self.editor_module,
            tag = self.editor_tag,
        )
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Languages the editor component knows how to highlight
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Html,
    Css,
    Js,
    Ts,
}

impl Language {
    /// Value assigned to the editor's `type` property
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Html => "html",
            Language::Css => "css",
            Language::Js => "js",
            Language::Ts => "ts",
        }
    }

    /// Guess the language from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "html" | "htm" => Some(Language::Html),
            "css" => Some(Language::Css),
            "js" | "mjs" => Some(Language::Js),
            "ts" => Some(Language::Ts),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "html" => Ok(Language::Html),
            "css" => Ok(Language::Css),
            "js" => Ok(Language::Js),
            "ts" => Ok(Language::Ts),
            other => Err(Error::Other(format!("Unsupported language: {}", other))),
        }
    }
}

/// Highlighted markup produced by a render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedCode {
    /// `<div class="CodeMirror cm-s-default">` wrapping the editor's lines
    pub html: String,
}

impl RenderedCode {
    /// Wrap the inner markup scraped from the editor.
    pub fn wrap(inner: &str) -> Self {
        Self {
            html: format!(r#"<div class="{}">{}</div>"#, WRAPPER_CLASS, inner),
        }
    }
}

/// The page-side half of a render session.
///
/// Implementations own one browser tab. Calls are blocking; the `Renderer`
/// runs them off the async executor and never issues two at once.
pub trait EditorBackend: Send + Sync + 'static {
    /// Navigate the tab to `url` and wait for it to load
    fn load_url(&self, url: &str) -> Result<()>;

    /// Set the editor's language and source text, wait for its update to
    /// complete and return the inner HTML of the rendered code container,
    /// or `None` when that container does not exist.
    fn update_editor(&self, language: Language, code: &str) -> Result<Option<String>>;

    /// Close the browser. Must tolerate being called more than once.
    fn close(&self) -> Result<()>;
}
