//! `veracity` command-line entry point.

use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use veracity::batch;
use veracity_config::VeracityConfig;
use veracity_core::{ClaimDecomposer, Pipeline};
use veracity_providers::{ApiConfig, HttpReasoningClient, ReasoningClient};
use veracity_retrieval::HttpRetrievalService;
use veracity_types::{Claim, NonEmptyString, Provider};

#[derive(Parser)]
#[command(name = "veracity")]
#[command(about = "Check narrative backstories for consistency with a trusted corpus")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.veracity/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reasoning provider override: gemini, claude or openai
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model override (must belong to the provider)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check every backstory in a JSONL file
    Run {
        /// One `{"id", "content"}` object per line
        #[arg(long)]
        input: PathBuf,

        /// Write per-claim records here
        #[arg(long)]
        claims_out: Option<PathBuf>,

        /// Write per-backstory records here (default: stdout)
        #[arg(long)]
        verdicts_out: Option<PathBuf>,
    },
    /// Print the atomic claims of a text, one per line
    Decompose {
        #[arg(long)]
        text: String,
    },
    /// Retrieve context for one claim and print its verdict as JSON
    Verify {
        #[arg(long)]
        claim: String,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout carries JSONL output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<VeracityConfig> {
    let mut config = match &cli.config {
        Some(path) => VeracityConfig::load_from(path)?,
        None => VeracityConfig::load()?.unwrap_or_default(),
    };

    if cli.provider.is_some() || cli.model.is_some() {
        let reasoning = config.reasoning.get_or_insert_with(Default::default);
        if let Some(provider) = &cli.provider {
            reasoning.provider = Some(provider.clone());
            // A provider switch invalidates a configured model of another provider.
            if cli.model.is_none() {
                reasoning.model = None;
            }
        }
        if let Some(model) = &cli.model {
            reasoning.model = Some(model.clone());
        }
    }

    Ok(config)
}

fn build_reasoning(config: &VeracityConfig) -> Result<Arc<dyn ReasoningClient>> {
    let provider: Provider = config.provider()?;
    let model = config.model(provider)?;
    let api_key = config.api_key(provider)?;
    let api = ApiConfig::new(api_key, model)?;

    tracing::info!(
        provider = provider.as_str(),
        model = %api.model(),
        "Reasoning service configured"
    );

    let client = HttpReasoningClient::new(api, config.client_options())
        .context("failed to build reasoning client")?;
    Ok(Arc::new(client))
}

fn build_pipeline(config: &VeracityConfig) -> Result<Pipeline> {
    let reasoning = build_reasoning(config)?;
    let endpoint = config.retrieval_endpoint();
    let retrieval = HttpRetrievalService::new(&endpoint, config.retrieval_timeout())
        .with_context(|| format!("invalid retrieval endpoint {endpoint}"))?;
    let policy = config.backoff_policy()?;

    Ok(Pipeline::new(
        reasoning,
        Arc::new(retrieval),
        policy,
        config.pipeline_config(),
    ))
}

async fn run_batch(
    config: &VeracityConfig,
    input: PathBuf,
    claims_out: Option<PathBuf>,
    verdicts_out: Option<PathBuf>,
) -> Result<()> {
    let backstories = batch::read_backstories_from_path(&input)?;
    if backstories.is_empty() {
        bail!("no backstories in {}", input.display());
    }

    let pipeline = build_pipeline(config)?;
    let verdicts = pipeline.check_batch(&backstories).await;

    if let Some(path) = &claims_out {
        let writer = batch::create_output(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        batch::write_claim_records(writer, &verdicts)?;
    }

    match &verdicts_out {
        Some(path) => {
            let writer = batch::create_output(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            batch::write_backstory_records(writer, &verdicts)?;
        }
        None => batch::write_backstory_records(stdout().lock(), &verdicts)?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Run {
            input,
            claims_out,
            verdicts_out,
        } => run_batch(&config, input, claims_out, verdicts_out).await,
        Command::Decompose { text } => {
            let decomposer = ClaimDecomposer::new(build_reasoning(&config)?);
            let claims = decomposer.decompose(&text).await;
            batch::write_claim_lines(stdout().lock(), &claims)?;
            Ok(())
        }
        Command::Verify { claim } => {
            let claim = NonEmptyString::new(claim).context("--claim must not be blank")?;
            let pipeline = build_pipeline(&config)?;
            let verdict = pipeline.verify_claim(Claim::standalone(claim)).await?;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(())
        }
    }
}
