//! Error types for the playground renderer

use thiserror::Error;

/// Result type alias for renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering or driving the playground
#[derive(Error, Debug)]
pub enum Error {
    /// `render` was called after `stop`
    #[error("Renderer has already stopped")]
    Stopped,

    /// The editor finished updating but the expected container is absent
    #[error("{0}")]
    MissingElement(String),

    /// Failed to launch the browser or open a tab
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load a URL
    #[error("Failed to load URL: {0}")]
    LoadError(String),

    /// Failed to execute JavaScript or read back its value
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// The one-shot body server failed to bind, serve or shut down
    #[error("Body server error: {0}")]
    ServerError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// A screenshot differs from its baseline beyond the threshold
    #[error("Visual regression: {name} differs by {diff_percent:.2}% (threshold: {threshold:.2}%)")]
    VisualRegression {
        name: String,
        diff_percent: f64,
        threshold: f64,
    },

    /// No baseline screenshot exists and updating is disabled
    #[error("Baseline not found: {0}")]
    BaselineNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
