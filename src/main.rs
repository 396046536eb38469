use std::path::PathBuf;

use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

mod compose;
mod config;
mod errors;
mod handlers;
mod llm;
mod pipeline;
mod state;
mod stats;
mod utils;

use compose::{CompositionLayout, StoryAssets, StoryComposer};
use config::CONFIG;
use state::AppState;
use utils::logging::init_logging;

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Serve,
    Compose(ComposeArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct ComposeArgs {
    top: PathBuf,
    bottom: PathBuf,
    out: PathBuf,
}

fn usage() -> &'static str {
    "Usage: portrait-campaign [serve]\n       portrait-campaign compose --top <file> --bottom <file> --out <file>"
}

fn parse_args(args: &[String]) -> anyhow::Result<CliCommand> {
    match args.get(1).map(|value| value.as_str()) {
        None | Some("serve") => Ok(CliCommand::Serve),
        Some("compose") => parse_compose_args(&args[2..]).map(CliCommand::Compose),
        Some("--help") | Some("-h") => Err(anyhow!(usage())),
        Some(other) => Err(anyhow!("Unknown command: {other}\n{}", usage())),
    }
}

fn parse_compose_args(args: &[String]) -> anyhow::Result<ComposeArgs> {
    let mut top = None;
    let mut bottom = None;
    let mut out = None;

    let mut index = 0;
    while index < args.len() {
        let flag = args[index].as_str();
        let slot = match flag {
            "--top" => &mut top,
            "--bottom" => &mut bottom,
            "--out" => &mut out,
            "--help" | "-h" => return Err(anyhow!(usage())),
            other => return Err(anyhow!("Unknown compose argument: {other}\n{}", usage())),
        };
        index += 1;
        let value = args
            .get(index)
            .ok_or_else(|| anyhow!("Missing value for {flag}"))?;
        *slot = Some(PathBuf::from(value));
        index += 1;
    }

    Ok(ComposeArgs {
        top: top.ok_or_else(|| anyhow!("--top is required"))?,
        bottom: bottom.ok_or_else(|| anyhow!("--bottom is required"))?,
        out: out.ok_or_else(|| anyhow!("--out is required"))?,
    })
}

fn run_compose(args: &ComposeArgs) -> anyhow::Result<()> {
    let top = std::fs::read(&args.top).with_context(|| format!("reading {}", args.top.display()))?;
    let bottom =
        std::fs::read(&args.bottom).with_context(|| format!("reading {}", args.bottom.display()))?;

    let design = CONFIG.campaign.design();
    let assets = StoryAssets::discover(
        CONFIG.font_path.as_deref(),
        CONFIG.logo_path.as_deref(),
        &design.logo_file_name,
    );
    let composer = StoryComposer::new(CompositionLayout::default(), design, assets);
    let story = composer.compose(&top, &bottom)?;
    std::fs::write(&args.out, &story).with_context(|| format!("writing {}", args.out.display()))?;
    info!("Story written to {} ({} bytes)", args.out.display(), story.len());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn serve() -> anyhow::Result<()> {
    if CONFIG.gemini_api_key.is_empty() {
        warn!("GEMINI_API_KEY is not set; generation requests will fail until it is configured");
    }

    let state = AppState::from_config(&CONFIG);
    let stats = state.stats.clone();
    let router = handlers::build_router(state, CONFIG.max_upload_bytes);

    let listener = TcpListener::bind(&CONFIG.bind_addr)
        .await
        .with_context(|| format!("binding {}", CONFIG.bind_addr))?;
    info!(
        "Starting portrait campaign service ({}) on {}",
        CONFIG.campaign.service_name(),
        CONFIG.bind_addr
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(err) = stats.flush().await {
        warn!("Failed to flush stats on shutdown: {err:#}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _guards = init_logging(&CONFIG.log_dir, &CONFIG.log_level);

    let args: Vec<String> = std::env::args().collect();
    match parse_args(&args)? {
        CliCommand::Serve => serve().await,
        CliCommand::Compose(compose_args) => run_compose(&compose_args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        std::iter::once("portrait-campaign")
            .chain(values.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn serve_is_the_default_command() {
        assert_eq!(parse_args(&args(&[])).unwrap(), CliCommand::Serve);
        assert_eq!(parse_args(&args(&["serve"])).unwrap(), CliCommand::Serve);
    }

    #[test]
    fn compose_requires_all_paths() {
        let parsed =
            parse_args(&args(&["compose", "--top", "a.png", "--bottom", "b.png", "--out", "c.png"]))
                .unwrap();
        assert_eq!(
            parsed,
            CliCommand::Compose(ComposeArgs {
                top: PathBuf::from("a.png"),
                bottom: PathBuf::from("b.png"),
                out: PathBuf::from("c.png"),
            })
        );

        let err = parse_args(&args(&["compose", "--top", "a.png"])).unwrap_err();
        assert!(err.to_string().contains("--bottom is required"));
        let err = parse_args(&args(&["compose", "--top"])).unwrap_err();
        assert!(err.to_string().contains("Missing value for --top"));
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(parse_args(&args(&["import-history"])).is_err());
    }
}
