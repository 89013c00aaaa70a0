use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use playground_renderer::{Language, Renderer, RendererConfig};
use serde::Serialize;

/// Render source files to syntax-highlighted HTML with the playground's
/// code editor component.
#[derive(Parser, Debug)]
#[command(name = "playground-render", version)]
struct Cli {
    /// Directory served to the browser (must contain node_modules/code-sample-editor)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Language for every file; guessed from the extension when omitted
    #[arg(long, value_enum)]
    lang: Option<Language>,

    /// Print one JSON object per file instead of raw HTML
    #[arg(long)]
    json: bool,

    /// Files to render, in order
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Output<'a> {
    file: &'a str,
    lang: Language,
    html: &'a str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config = RendererConfig {
        root_dir: cli.root.clone(),
        ..Default::default()
    };
    let renderer = Renderer::start(config)
        .await
        .context("Failed to start renderer")?;

    let result = render_all(&renderer, &cli).await;
    renderer.stop().await.context("Failed to stop renderer")?;
    result
}

async fn render_all<B: playground_renderer::EditorBackend>(
    renderer: &Renderer<B>,
    cli: &Cli,
) -> anyhow::Result<()> {
    for file in &cli.files {
        let lang = cli
            .lang
            .or_else(|| Language::from_path(file))
            .ok_or_else(|| anyhow!("Cannot tell the language of {}; pass --lang", file.display()))?;
        let code = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;

        let rendered = renderer
            .render(lang, &code)
            .await
            .with_context(|| format!("Failed to render {}", file.display()))?;

        if cli.json {
            let name = file.display().to_string();
            let line = serde_json::to_string(&Output {
                file: &name,
                lang,
                html: &rendered.html,
            })?;
            println!("{}", line);
        } else {
            println!("{}", rendered.html);
        }
    }
    Ok(())
}
