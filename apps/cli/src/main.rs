use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use pageon_core::{DurationFilter, PageonConfig, Provider};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod analyze;
mod chat;
mod search;

const DEFAULT_LOG_FILTER: &str = "pageon=info,pageon_core=info";

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Copy, ValueEnum)]
enum CliProvider {
    Grok,
    Openai,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliDuration {
    Any,
    Short,
    Medium,
    Long,
}

impl From<CliDuration> for DurationFilter {
    fn from(cli: CliDuration) -> Self {
        match cli {
            CliDuration::Any => DurationFilter::Any,
            CliDuration::Short => DurationFilter::Short,
            CliDuration::Medium => DurationFilter::Medium,
            CliDuration::Long => DurationFilter::Long,
        }
    }
}

#[derive(Parser)]
#[command(name = "pageon")]
#[command(about = "Stream structured AI summaries of video transcripts and chat about them")]
struct Cli {
    /// AI provider (overrides PAGEON_PROVIDER)
    #[arg(short, long, global = true)]
    provider: Option<CliProvider>,

    /// Model name (overrides the provider default)
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a transcript into a summary and timestamped sections
    Analyze(AnalyzeArgs),
    /// Chat about an analyzed video
    Chat(ChatArgs),
    /// Search YouTube through SerpAPI
    Search(SearchArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// JSON file with an array of {"start": seconds, "text": "..."} lines
    transcript: PathBuf,

    /// Video identifier used for caching and storage
    #[arg(long)]
    video_id: String,

    /// Video title
    #[arg(short, long)]
    title: Option<String>,

    /// Character budget for the transcript preview
    #[arg(long)]
    max_chars: Option<usize>,

    /// Number of transcript segments to sample
    #[arg(long)]
    segments: Option<usize>,

    /// Maximum lines per sampled segment
    #[arg(long)]
    max_lines_per_segment: Option<usize>,

    /// Force re-analysis even if a saved document exists
    #[arg(short, long)]
    force: bool,

    /// Print the analysis translated into this language (zh, en, ja, ko, es, fr, de)
    #[arg(long, value_name = "LANG")]
    translate: Option<String>,
}

#[derive(Args)]
struct ChatArgs {
    /// Video the conversation is about
    #[arg(long)]
    video_id: String,

    /// Session key; without one every question is answered without memory
    #[arg(short, long)]
    session: Option<String>,
}

#[derive(Args)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Video length bucket
    #[arg(short, long)]
    duration: Option<CliDuration>,

    /// Maximum number of results
    #[arg(short, long)]
    limit: Option<usize>,

    /// Country code (e.g. "us")
    #[arg(long)]
    gl: Option<String>,

    /// Interface language (e.g. "en")
    #[arg(long)]
    hl: Option<String>,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Cancels the returned token on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    cancel
}

fn load_config(cli: &Cli) -> Result<PageonConfig> {
    let mut config = PageonConfig::from_env()?;
    if let Some(provider) = cli.provider {
        config.generation.provider = provider.into();
    }
    if let Some(model) = &cli.model {
        config.generation.model = Some(model.clone());
    }
    if let Command::Analyze(args) = &cli.command {
        if let Some(max_chars) = args.max_chars {
            config.sampling.max_chars = max_chars;
        }
        if let Some(segments) = args.segments {
            config.sampling.segments = segments;
        }
        if args.max_lines_per_segment.is_some() {
            config.sampling.max_lines_per_segment = args.max_lines_per_segment;
        }
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    println!(
        "\n{}  {}\n",
        style("pageon").cyan().bold(),
        style("Video Analyzer").dim()
    );

    match cli.command {
        Command::Analyze(args) => analyze::run(args, config).await,
        Command::Chat(args) => chat::run(args, config).await,
        Command::Search(args) => search::run(args, config).await,
    }
}
