//! Renders through real headless Chrome.
//!
//! Needs Chrome and a directory containing
//! `node_modules/code-sample-editor`, given by `PLAYGROUND_RENDERER_ROOT`.
//! The missing-container case only needs Chrome; it serves its own editor.

use playground_renderer::{Error, Language, Renderer, RendererConfig};
use scraper::{Html, Selector};

const GREETING: &str = r#"import {LitElement, html, css} from 'lit';
import {customElement, property} from 'lit/decorators.js';

@customElement('simple-greeting')
export class SimpleGreeting extends LitElement {
  static styles = css`p { color: blue }`;

  @property()
  name = 'Somebody';

  render() {
    return html`<p>Hello, ${this.name}!</p>`;
  }
}
"#;

// Minimal editor element: renders a `.CodeMirror-code` container unless
// the source contains BREAK.
const STUB_EDITOR: &str = r#"customElements.define('stub-editor', class extends HTMLElement {
  constructor() {
    super();
    this.attachShadow({mode: 'open'});
    this.updateComplete = Promise.resolve(true);
  }
  set value(v) {
    this.shadowRoot.innerHTML = '';
    if (!v.includes('BREAK')) {
      const code = document.createElement('div');
      code.className = 'CodeMirror-code';
      code.textContent = v;
      this.shadowRoot.appendChild(code);
    }
    this.updateComplete = Promise.resolve(true);
  }
});
"#;

fn config() -> Option<RendererConfig> {
    let root = std::env::var("PLAYGROUND_RENDERER_ROOT").ok()?;
    Some(RendererConfig {
        root_dir: root.into(),
        ..Default::default()
    })
}

async fn start() -> Option<Renderer<playground_renderer::cdp::CdpEditor>> {
    let Some(config) = config() else {
        eprintln!("PLAYGROUND_RENDERER_ROOT not set; skipping");
        return None;
    };
    match Renderer::start(config).await {
        Ok(r) => Some(r),
        Err(e) => {
            eprintln!("Skipping because Chrome is not available or failed to launch: {}", e);
            None
        }
    }
}

#[tokio::test]
#[ignore] // Requires Chrome and the editor package
async fn typescript_with_decorators_is_highlighted() {
    let Some(renderer) = start().await else { return };

    let out = renderer.render(Language::Ts, GREETING).await.expect("render");
    assert!(!out.html.is_empty());

    let doc = Html::parse_fragment(&out.html);
    let wrapper = Selector::parse("div.CodeMirror.cm-s-default").unwrap();
    assert_eq!(doc.select(&wrapper).count(), 1);

    // CodeMirror marks tokens with cm-* classes.
    let token = Selector::parse("span[class^=\"cm-\"]").unwrap();
    assert!(doc.select(&token).next().is_some(), "no highlighted tokens in {}", out.html);
    assert!(out.html.contains("simple-greeting"));

    renderer.stop().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Chrome and the editor package
async fn every_language_renders_and_stop_rejects_further_work() {
    let Some(renderer) = start().await else { return };

    let samples = [
        (Language::Html, "<p class=\"x\">hi</p>"),
        (Language::Css, "p { color: red; }"),
        (Language::Js, "const a = 1;"),
        (Language::Ts, "let b: string = 'b';"),
    ];
    for (lang, code) in samples {
        let out = renderer.render(lang, code).await.expect("render");
        assert!(out.html.starts_with(r#"<div class="CodeMirror cm-s-default">"#));
    }

    renderer.stop().await.unwrap();
    renderer.stop().await.unwrap();
    assert!(matches!(
        renderer.render(Language::Js, "1").await,
        Err(Error::Stopped)
    ));
}

#[tokio::test]
#[ignore] // Requires Chrome
async fn missing_container_reports_the_selector_and_session_survives() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("stub-editor.js"), STUB_EDITOR).unwrap();
    let config = RendererConfig {
        root_dir: root.path().to_path_buf(),
        editor_module: "/stub-editor.js".into(),
        editor_tag: "stub-editor".into(),
        ..Default::default()
    };
    let renderer = match Renderer::start(config).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Skipping because Chrome is not available or failed to launch: {}", e);
            return;
        }
    };

    let err = renderer.render(Language::Js, "BREAK").await.unwrap_err();
    assert!(matches!(err, Error::MissingElement(_)), "got {:?}", err);
    assert_eq!(
        err.to_string(),
        r#"<stub-editor> did not render a ".CodeMirror-code" element"#
    );

    let out = renderer.render(Language::Js, "still here").await.expect("render");
    assert_eq!(
        out.html,
        r#"<div class="CodeMirror cm-s-default">still here</div>"#
    );

    renderer.stop().await.unwrap();
}
