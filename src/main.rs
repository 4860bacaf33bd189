//! LLM Request Normalizer - command line entry point
//!
//! Reads one request body from a file (or stdin), normalizes it for the
//! configured upstream target and prints the result to stdout.
//!
//! ```text
//! llm-normalizer <model> [input.json] [--stream] [--config config.yaml]
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use llm_normalizer_rust::{
    core::{generate_request_id, init_tracing, AppConfig},
    with_request_context, RequestNormalizer,
};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "llm-normalizer")]
#[command(about = "Normalize a Gemini request body for the configured upstream")]
#[command(version)]
struct Cli {
    /// Target model id (e.g. gemini-2.5-pro, claude-sonnet-4-5)
    model: String,

    /// Request body file ("-" or omitted reads stdin)
    input: Option<PathBuf>,

    /// Normalize for a streaming request
    #[arg(long)]
    stream: bool,

    /// YAML config file (environment variables are used when omitted)
    #[arg(long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,
}

fn read_body(input: Option<&Path>) -> Result<Vec<u8>> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read(path)
            .with_context(|| format!("Failed to read request body: {}", path.display())),
        _ => {
            let mut body = Vec::new();
            std::io::stdin()
                .read_to_end(&mut body)
                .context("Failed to read request body from stdin")?;
            Ok(body)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(&path.to_string_lossy()),
        None => AppConfig::from_env(),
    }
}

fn main() -> Result<()> {
    // Load .env file if present (before reading any environment variables)
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let body = read_body(cli.input.as_deref())?;

    tracing::info!(
        target_kind = %config.target,
        model = %cli.model,
        stream = cli.stream,
        "Normalizing request"
    );

    let normalizer = RequestNormalizer::from_config(&config);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let request_id = generate_request_id();
    let output = runtime.block_on(async {
        with_request_context!(request_id, async {
            normalizer.normalize_bytes(&cli.model, &body, cli.stream)
        })
    })?;

    println!("{}", String::from_utf8_lossy(&output));
    Ok(())
}
