//! Browser driver for the hosted playground page.
//!
//! Used by the end-to-end scenarios in `tests/playground.rs`. Most of the
//! playground lives in shadow DOM and the preview runs in a cross-origin
//! iframe, so lookups go through a small in-page helper that walks shadow
//! roots, and the browser is launched with same-origin checks disabled so
//! the preview document is reachable from the top frame.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use log::debug;
use serde_json::Value;

use crate::{Error, Result, Viewport};

/// Shadow-piercing path to the preview's loading bar once it has finished.
pub const PREVIEW_LOADED: &[&str] = &[
    "playground-preview",
    r#"[part="preview-loading-indicator"][aria-hidden="true"]"#,
];

/// Shadow-piercing path to the preview iframe.
pub const PREVIEW_FRAME: &[&str] = &["playground-preview", "iframe"];

// `__pierce(steps, root)` resolves each selector inside the matches of the
// previous one, descending into every open shadow root on the way.
const PIERCE_JS: &str = r#"
const __pierceAll = (root, sel) => {
  const out = [...root.querySelectorAll(sel)];
  for (const el of root.querySelectorAll('*')) {
    if (el.shadowRoot) out.push(...__pierceAll(el.shadowRoot, sel));
  }
  return out;
};
const __pierce = (steps, root) => {
  let scopes = [root || document];
  for (const sel of steps) {
    const next = [];
    for (const scope of scopes) {
      next.push(...__pierceAll(scope, sel));
      if (scope.shadowRoot) next.push(...__pierceAll(scope.shadowRoot, sel));
    }
    if (next.length === 0) return null;
    scopes = next;
  }
  return scopes[0];
};
"#;

/// Configuration for [`PlaygroundDriver`]
#[derive(Debug, Clone)]
pub struct PlaygroundConfig {
    /// Origin of the documentation site, e.g. `http://localhost:8080`
    pub base_url: String,
    pub viewport: Viewport,
    /// Pause after the loading bar hides, covering its fade-out transition
    pub settle: Duration,
    /// Deadline for every wait and auto-retrying assertion
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("PLAYGROUND_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            viewport: Viewport::default(),
            settle: Duration::from_millis(250),
            wait_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Drives one tab of headless Chrome against the playground.
pub struct PlaygroundDriver {
    _browser: Browser,
    tab: Arc<Tab>,
    config: PlaygroundConfig,
}

impl PlaygroundDriver {
    pub fn launch(config: PlaygroundConfig) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .args(vec![
                OsStr::new("--force-device-scale-factor=1"),
                OsStr::new("--hide-scrollbars"),
                OsStr::new("--disable-web-security"),
                OsStr::new("--disable-site-isolation-trials"),
                OsStr::new("--disable-features=IsolateOrigins,site-per-process"),
            ])
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        Ok(Self {
            _browser: browser,
            tab,
            config,
        })
    }

    /// Navigate to `path` relative to the base URL.
    pub fn goto(&self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        debug!("Navigating to {}", url);
        self.tab
            .navigate_to(&url)
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;
        Ok(())
    }

    /// Wait until an element exists at the shadow-piercing path `steps`.
    pub fn wait_for(&self, steps: &[&str]) -> Result<()> {
        self.poll_until(|| Ok(self.query(steps, None, "true")? == Value::Bool(true)))
    }

    /// Wait for the preview's loading bar to report hidden, then let its
    /// fade-out finish.
    pub fn wait_for_preview_loaded(&self) -> Result<()> {
        self.wait_for(PREVIEW_LOADED)?;
        std::thread::sleep(self.config.settle);
        Ok(())
    }

    /// `className` of the element at `steps`.
    pub fn class_name(&self, steps: &[&str]) -> Result<String> {
        self.query_string(steps, None, "el.className")
    }

    /// `textContent` of the element at `steps`.
    pub fn text_content(&self, steps: &[&str]) -> Result<String> {
        self.query_string(steps, None, "el.textContent")
    }

    /// Trimmed text of an element inside the preview iframe.
    pub fn preview_text(&self, steps: &[&str]) -> Result<String> {
        self.query_string(steps, Some(PREVIEW_FRAME), "el.textContent.trim()")
    }

    /// Computed `color` of an element inside the preview iframe.
    pub fn preview_color(&self, steps: &[&str]) -> Result<String> {
        self.query_string(
            steps,
            Some(PREVIEW_FRAME),
            "el.ownerDocument.defaultView.getComputedStyle(el).color",
        )
    }

    /// Retry `preview_text` until it equals `expected`.
    pub fn expect_preview_text(&self, steps: &[&str], expected: &str) -> Result<()> {
        self.poll_until(|| Ok(self.preview_text(steps).ok().as_deref() == Some(expected)))
    }

    /// Retry `preview_color` until it equals `expected`.
    pub fn expect_preview_color(&self, steps: &[&str], expected: &str) -> Result<()> {
        self.poll_until(|| Ok(self.preview_color(steps).ok().as_deref() == Some(expected)))
    }

    /// Select the first occurrence of `needle` in the code editor and type
    /// `replacement` over it with real key events.
    pub fn replace_in_editor(&self, needle: &str, replacement: &str) -> Result<()> {
        let needle_js = serde_json::to_string(needle)
            .map_err(|e| Error::ScriptError(format!("Failed to encode needle: {}", e)))?;
        let body = format!(
            r#"(() => {{
                const host = el.shadowRoot ? el.shadowRoot.querySelector('.CodeMirror') : null;
                const cm = host ? host.CodeMirror : null;
                if (!cm) return false;
                const needle = {needle};
                const at = cm.getValue().indexOf(needle);
                if (at < 0) return false;
                cm.focus();
                cm.setSelection(cm.posFromIndex(at), cm.posFromIndex(at + needle.length));
                return true;
            }})()"#,
            needle = needle_js
        );

        match self.query(&["playground-code-editor"], None, &body)? {
            Value::Bool(true) => {}
            _ => {
                return Err(Error::ScriptError(format!(
                    "Could not select {:?} in the code editor",
                    needle
                )))
            }
        }

        self.tab.type_str(replacement)?;
        Ok(())
    }

    /// PNG of the element matched by the light-DOM `selector`.
    pub fn screenshot(&self, selector: &str) -> Result<Vec<u8>> {
        let selector_js = serde_json::to_string(selector)
            .map_err(|e| Error::ScriptError(format!("Failed to encode selector: {}", e)))?;
        let rect = self.eval(&format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return null;
                el.scrollIntoView();
                const r = el.getBoundingClientRect();
                return JSON.stringify({{ x: r.x + window.scrollX, y: r.y + window.scrollY, width: r.width, height: r.height }});
            }})()"#,
            sel = selector_js
        ))?;

        let rect = match rect {
            Value::String(s) => serde_json::from_str::<Value>(&s)
                .map_err(|e| Error::ScriptError(format!("Bad bounding box: {}", e)))?,
            _ => return Err(Error::ScriptError(format!("No element matches {}", selector))),
        };
        let coord = |key: &str| rect.get(key).and_then(Value::as_f64).unwrap_or(0.0);

        let clip = Page::Viewport {
            x: coord("x"),
            y: coord("y"),
            width: coord("width"),
            height: coord("height"),
            scale: 1.0,
        };

        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::ScriptError(format!("Screenshot failed: {}", e)))
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    /// Evaluate `body` with `el` bound to the element at `steps`. When
    /// `frame` is given, `steps` are resolved inside that iframe's document.
    /// Yields `null` when nothing matches.
    fn query(&self, steps: &[&str], frame: Option<&[&str]>, body: &str) -> Result<Value> {
        let steps_js = serde_json::to_string(steps)
            .map_err(|e| Error::ScriptError(format!("Failed to encode selectors: {}", e)))?;
        let root_js = match frame {
            None => "document".to_string(),
            Some(frame) => {
                let frame_js = serde_json::to_string(frame)
                    .map_err(|e| Error::ScriptError(format!("Failed to encode selectors: {}", e)))?;
                format!(
                    "(() => {{ const f = __pierce({}); return f ? f.contentDocument : null; }})()",
                    frame_js
                )
            }
        };

        self.eval(&format!(
            r#"(() => {{
                {pierce}
                const root = {root};
                if (!root) return null;
                const el = __pierce({steps}, root);
                if (!el) return null;
                return {body};
            }})()"#,
            pierce = PIERCE_JS,
            root = root_js,
            steps = steps_js,
            body = body
        ))
    }

    fn query_string(&self, steps: &[&str], frame: Option<&[&str]>, body: &str) -> Result<String> {
        match self.query(steps, frame, body)? {
            Value::String(s) => Ok(s),
            Value::Null => Err(Error::ScriptError(format!("No element at {}", steps.join(" >> ")))),
            other => Err(Error::ScriptError(format!("Expected a string, got {}", other))),
        }
    }

    fn eval(&self, script: &str) -> Result<Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| Error::ScriptError(format!("Evaluation failed: {}", e)))?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn poll_until<F>(&self, mut check: F) -> Result<()>
    where
        F: FnMut() -> Result<bool>,
    {
        let start = Instant::now();
        loop {
            if check()? {
                return Ok(());
            }
            if start.elapsed() >= self.config.wait_timeout {
                return Err(timeout_error(self.config.wait_timeout));
            }
            std::thread::sleep(self.config.poll_interval);
        }
    }
}

fn timeout_error(waited: Duration) -> Error {
    Error::Timeout(u64::try_from(waited.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_reports_whole_millis_without_wrapping() {
        assert!(matches!(timeout_error(Duration::from_secs(30)), Error::Timeout(30_000)));
        assert!(matches!(timeout_error(Duration::MAX), Error::Timeout(u64::MAX)));
    }

    #[test]
    fn default_config_waits_for_the_fade_out() {
        let config = PlaygroundConfig::default();
        assert_eq!(config.settle, Duration::from_millis(250));
        assert!(config.wait_timeout > config.settle);
    }

    #[test]
    fn preview_loaded_path_targets_the_hidden_indicator() {
        assert_eq!(PREVIEW_LOADED[0], "playground-preview");
        assert!(PREVIEW_LOADED[1].contains(r#"aria-hidden="true""#));
    }
}
