//! streamtrace CLI — replay recorded provider streams through the telemetry
//! wrapper and inspect what they report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use futures::StreamExt as _;
use genai_streamtrace::config::Config;
use genai_streamtrace::pricing::{CostLookup, PricingTable};
use genai_streamtrace::stream::{
    Provider, RequestContext, RequestOptions, StreamInstrumentor, format_prompt,
};
use genai_streamtrace::telemetry::emit::{Emitter, OtelEmitter, RecordingEmitter};
use genai_streamtrace::telemetry::{TelemetryConfig, init_telemetry};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "streamtrace", about = "Streaming GenAI response telemetry")]
struct Cli {
    /// TOML config file (defaults to environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSONL file of recorded stream chunks
    Replay {
        /// One decoded SSE payload per line; `data: ` prefixes and `[DONE]` are accepted
        file: PathBuf,
        /// Chunk format: openai, anthropic or mistral
        #[arg(long, default_value = "openai")]
        provider: Provider,
        /// Requested model
        #[arg(long)]
        model: String,
        /// Prompt text to report when content capture is on
        #[arg(long, conflicts_with = "request")]
        prompt: Option<String>,
        /// JSON request body; its messages and sampling options are reported
        #[arg(long)]
        request: Option<PathBuf>,
        /// Drive the replay through the async stream interface
        #[arg(long = "async")]
        use_async: bool,
        /// Stop after this many chunks, abandoning the rest
        #[arg(long)]
        take: Option<usize>,
        /// Print the telemetry instead of exporting it
        #[arg(long)]
        dry_run: bool,
    },
    /// Compute the cost of a call
    Price {
        model: String,
        input_tokens: u64,
        output_tokens: u64,
        /// Pricing JSON file (overrides config)
        #[arg(long)]
        pricing: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::from_env()?,
    };

    match cli.command {
        Command::Replay {
            file,
            provider,
            model,
            prompt,
            request,
            use_async,
            take,
            dry_run,
        } => {
            let replay = Replay {
                file,
                provider,
                model,
                prompt,
                request,
                use_async,
                take,
            };
            cmd_replay(&config, replay, dry_run).await
        }
        Command::Price {
            model,
            input_tokens,
            output_tokens,
            pricing,
        } => cmd_price(&config, pricing, &model, input_tokens, output_tokens),
    }
}

struct Replay {
    file: PathBuf,
    provider: Provider,
    model: String,
    prompt: Option<String>,
    request: Option<PathBuf>,
    use_async: bool,
    take: Option<usize>,
}

fn load_pricing(config: &Config, override_path: Option<&Path>) -> anyhow::Result<PricingTable> {
    match override_path.or(config.pricing_json.as_deref()) {
        Some(path) => Ok(PricingTable::from_path(path)?),
        None => Ok(PricingTable::empty()),
    }
}

/// Decoded chunk payloads, one per non-empty line.
fn read_chunks(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    Ok(content
        .lines()
        .map(|line| line.trim())
        .map(|line| line.strip_prefix("data:").map(str::trim).unwrap_or(line))
        .filter(|line| !line.is_empty() && *line != "[DONE]")
        .map(str::to_owned)
        .collect())
}

async fn cmd_replay(config: &Config, replay: Replay, dry_run: bool) -> anyhow::Result<()> {
    let guard = init_telemetry(TelemetryConfig {
        endpoint: if dry_run {
            None
        } else {
            config.otel_endpoint.clone()
        },
        service_name: config.application_name.clone(),
        log_level: config.log_level.clone(),
    })?;

    let recorder = RecordingEmitter::new();
    let emitter: Arc<dyn Emitter> = if dry_run {
        Arc::new(recorder.clone())
    } else {
        Arc::new(OtelEmitter::global())
    };
    let pricing = Arc::new(load_pricing(config, None)?);
    let instrumentor =
        StreamInstrumentor::new(emitter, pricing).with_defaults(config.request_defaults());

    let mut ctx = instrumentor.context(replay.provider, &replay.model);
    if let Some(prompt) = replay.prompt {
        ctx = ctx.prompt(prompt);
    }
    if let Some(path) = &replay.request {
        ctx = apply_request_body(ctx, path)?;
    }

    let limit = replay.take.unwrap_or(usize::MAX);
    let chunks: Vec<Result<Value, serde_json::Error>> = read_chunks(&replay.file)?
        .iter()
        .map(|line| serde_json::from_str(line))
        .collect();

    let (text, forwarded, failure) = if replay.use_async {
        let mut stream =
            instrumentor.wrap(futures::stream::iter(chunks), replay.provider, ctx);
        let mut forwarded = 0usize;
        let mut failure = None;
        while forwarded < limit {
            match stream.next().await {
                Some(Ok(_)) => forwarded += 1,
                Some(Err(e)) => {
                    failure = Some(e);
                    break;
                }
                None => break,
            }
        }
        stream.close();
        (stream.accumulated().text, forwarded, failure)
    } else {
        let mut proxy = instrumentor.wrap(chunks.into_iter(), replay.provider, ctx);
        let mut forwarded = 0usize;
        let mut failure = None;
        for item in (&mut proxy).take(limit) {
            match item {
                Ok(_) => forwarded += 1,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        proxy.close();
        (proxy.accumulated().text, forwarded, failure)
    };

    println!("{text}");
    eprintln!("forwarded {forwarded} chunk(s)");
    if let Some(e) = failure {
        eprintln!("stream failed: {e}");
    }

    if dry_run {
        for span in recorder.spans() {
            println!("{}", serde_json::to_string_pretty(&span.to_json())?);
        }
        for metric in recorder.metrics() {
            println!("{} {:?}", metric.update.instrument().name(), metric.update);
        }
    }

    guard.force_flush();
    Ok(())
}

fn apply_request_body(ctx: RequestContext, path: &Path) -> anyhow::Result<RequestContext> {
    let body: Value = serde_json::from_str(
        &std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?,
    )?;
    let prompt = body.get("messages").map(format_prompt).unwrap_or_default();
    Ok(ctx
        .prompt(prompt)
        .options(RequestOptions::from_request_body(&body)))
}

fn cmd_price(
    config: &Config,
    pricing: Option<PathBuf>,
    model: &str,
    input_tokens: u64,
    output_tokens: u64,
) -> anyhow::Result<()> {
    let table = load_pricing(config, pricing.as_deref())?;
    let cost = table.cost(model, input_tokens, output_tokens)?;
    if table.chat_price(model).is_none() {
        eprintln!("no price entry for {model}");
    }
    println!("{cost:.6}");
    Ok(())
}
