use std::{path::Path, sync::Arc, time::Instant};

use anyhow::{Context, Result};
use console::style;
use pageon_core::{
    AnalysisEvent, AnalysisRequest, DocumentStore, FsDocumentStore, OpenAiCompatibleGenerator,
    PageonConfig, TranscriptLine, VideoAnalysisDocument, VideoAnalyzer, format_document_readable,
    prompts::language_name,
};
use tokio::{fs, sync::mpsc};

use crate::{AnalyzeArgs, cancel_on_ctrl_c, create_spinner, format_duration};

type Analyzer = VideoAnalyzer<OpenAiCompatibleGenerator>;

pub async fn run(args: AnalyzeArgs, config: PageonConfig) -> Result<()> {
    let store = Arc::new(FsDocumentStore::default());
    let saved_path = store.document_path(&args.video_id);

    let saved = if args.force {
        None
    } else {
        store.load(&args.video_id).await?
    };

    let (document, analyzer) = match saved {
        Some(document) => {
            println!(
                "{} Analysis loaded {}",
                style("✓").green().bold(),
                style("(cached)").dim()
            );
            (document, None)
        }
        None => {
            let analyzer = build_analyzer(&config, store.clone())?;
            let document = analyze(&args, &analyzer, &config).await?;
            (document, Some(analyzer))
        }
    };

    let document = match &args.translate {
        Some(language) => {
            let analyzer = match analyzer {
                Some(analyzer) => analyzer,
                None => build_analyzer(&config, store.clone())?,
            };
            let spinner = create_spinner(&format!("Translating to {}...", language_name(language)));
            match analyzer.translate(&document, language).await {
                Ok(translated) => {
                    spinner.finish_with_message(format!("{} Translated", style("✓").green().bold()));
                    translated
                }
                Err(e) => {
                    spinner.abandon_with_message(format!("{} {}", style("✗").red().bold(), e));
                    return Err(e.into());
                }
            }
        }
        None => document,
    };

    print_document(&document, &saved_path);
    Ok(())
}

fn build_analyzer(config: &PageonConfig, store: Arc<FsDocumentStore>) -> Result<Analyzer> {
    let generator = Arc::new(OpenAiCompatibleGenerator::new(
        config.generation.provider,
        config.generation.model.clone(),
    )?);
    Ok(VideoAnalyzer::new(generator, store, config.clone()))
}

async fn analyze(
    args: &AnalyzeArgs,
    analyzer: &Analyzer,
    config: &PageonConfig,
) -> Result<VideoAnalysisDocument> {
    let content = fs::read_to_string(&args.transcript)
        .await
        .with_context(|| format!("failed to read {}", args.transcript.display()))?;
    let transcript: Vec<TranscriptLine> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a transcript line array", args.transcript.display()))?;

    let provider = config.generation.provider;
    let request = AnalysisRequest {
        video_id: args.video_id.clone(),
        title: args.title.clone(),
        transcript,
    };

    println!("{}", style("─".repeat(60)).dim());
    let started = Instant::now();
    let spinner = create_spinner(&format!("Analyzing with {}...", provider.name()));
    let cancel = cancel_on_ctrl_c();
    let (tx, mut rx) = mpsc::channel(32);

    let analysis = async {
        let tx = tx;
        analyzer.analyze(&request, &tx, &cancel).await
    };
    let progress = async {
        let mut sections = 0;
        while let Some(event) = rx.recv().await {
            match event {
                AnalysisEvent::Summary(summary) => {
                    spinner.println(format!(
                        "{} {}",
                        style("✓").green().bold(),
                        style(&summary.title).bold()
                    ));
                }
                AnalysisEvent::Section(section) => {
                    sections += 1;
                    spinner.println(format!("  {} {}", style("•").cyan(), section.title));
                    spinner.set_message(format!("Generating sections... ({sections})"));
                }
                AnalysisEvent::Done(document) => {
                    spinner.finish_with_message(format!(
                        "{} Analysis complete: {} sections {}",
                        style("✓").green().bold(),
                        document.sections.len(),
                        style(format!("[{}]", format_duration(started.elapsed()))).dim()
                    ));
                }
                AnalysisEvent::Cached(_) => {
                    spinner.finish_with_message(format!(
                        "{} Analysis complete {}",
                        style("✓").green().bold(),
                        style("(cached)").dim()
                    ));
                }
                AnalysisEvent::Error { message } => {
                    spinner.abandon_with_message(format!(
                        "{} {}",
                        style("✗").red().bold(),
                        message
                    ));
                }
            }
        }
    };

    let (result, ()) = tokio::join!(analysis, progress);
    Ok(result?)
}

fn print_document(document: &VideoAnalysisDocument, saved_path: &Path) {
    println!(
        "\n{} {}\n",
        style("Saved:").dim(),
        style(saved_path.display()).cyan()
    );
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", format_document_readable(document));
}
