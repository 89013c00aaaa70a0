//! Chrome DevTools Protocol backend for the editor page

use std::sync::Arc;

use headless_chrome::{Browser, LaunchOptions, Tab};
use log::{debug, info};
use parking_lot::Mutex;
use serde_json::Value;

use crate::{EditorBackend, Error, Language, RendererConfig, Result, RENDERED_CODE_SELECTOR};

/// Headless Chrome with a single tab hosting the editor element (uses the
/// `headless_chrome` crate)
///
/// The browser process lives until `close` is called or the value is
/// dropped.
pub struct CdpEditor {
    browser: Mutex<Option<Browser>>,
    tab: Arc<Tab>,
    editor_tag: String,
}

impl CdpEditor {
    /// Launch the browser and open the tab. Blocking.
    pub fn launch(config: &RendererConfig) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(config.idle_browser_timeout)
            .path(config.chrome_path.clone())
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        info!("Launched headless Chrome for <{}>", config.editor_tag);

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            tab,
            editor_tag: config.editor_tag.clone(),
        })
    }

    /// The tab the editor lives in
    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }
}

impl EditorBackend for CdpEditor {
    fn load_url(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;

        // The bootstrap module defines the element asynchronously.
        let ready = format!(
            "customElements.whenDefined({}).then(() => !!window.editor)",
            js_string(&self.editor_tag)?
        );
        let eval = self
            .tab
            .evaluate(&ready, true)
            .map_err(|e| Error::LoadError(format!("Editor never became ready: {}", e)))?;

        match eval.value {
            Some(Value::Bool(true)) => {
                debug!("<{}> ready at {}", self.editor_tag, url);
                Ok(())
            }
            other => Err(Error::LoadError(format!(
                "window.editor is not set after loading {} (got {:?})",
                url, other
            ))),
        }
    }

    fn update_editor(&self, language: Language, code: &str) -> Result<Option<String>> {
        let script = format!(
            r#"(async () => {{
                const editor = window.editor;
                editor.type = {lang};
                editor.value = {code};
                await editor.updateComplete;
                const cm = editor.shadowRoot.querySelector({selector});
                return cm === null ? null : cm.innerHTML;
            }})()"#,
            lang = js_string(language.as_str())?,
            code = js_string(code)?,
            selector = js_string(RENDERED_CODE_SELECTOR)?,
        );

        let eval = self
            .tab
            .evaluate(&script, true)
            .map_err(|e| Error::ScriptError(format!("Editor update failed: {}", e)))?;

        rendered_markup(eval.value)
    }

    fn close(&self) -> Result<()> {
        // Dropping the browser terminates the child process.
        if let Some(browser) = self.browser.lock().take() {
            drop(browser);
            info!("Closed headless Chrome");
        }
        Ok(())
    }
}

/// Interpret the value the update script resolved to.
///
/// CDP reports a JS `null` result as a remote object with subtype `null`
/// and no `value`, so an absent value means the container was missing.
fn rendered_markup(value: Option<Value>) -> Result<Option<String>> {
    match value {
        Some(Value::String(inner)) => Ok(Some(inner)),
        None | Some(Value::Null) => Ok(None),
        Some(other) => Err(Error::ScriptError(format!(
            "Unexpected value returned from editor update: {}",
            other
        ))),
    }
}

/// Quote `s` as a JavaScript string literal.
fn js_string(s: &str) -> Result<String> {
    serde_json::to_string(s).map_err(|e| Error::ScriptError(format!("Failed to encode script argument: {}", e)))
}
