use std::{io::Write, sync::Arc};

use anyhow::Result;
use console::style;
use pageon_core::{
    ChatRequest, ChatService, DocumentStore, FsDocumentStore, OpenAiCompatibleGenerator,
    PageonConfig, SessionMemoryStore,
};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{ChatArgs, create_spinner};

pub async fn run(args: ChatArgs, config: PageonConfig) -> Result<()> {
    let generator = Arc::new(OpenAiCompatibleGenerator::new(
        config.generation.provider,
        config.generation.model.clone(),
    )?);
    let memory = Arc::new(SessionMemoryStore::new(config.memory.clone()));
    let service = ChatService::new(generator, memory, config.generation.chat_temperature);

    // A saved analysis gives the model the video's summary and sections.
    let video_context = match FsDocumentStore::default().load(&args.video_id).await? {
        Some(document) => {
            println!(
                "{} Loaded analysis: {}",
                style("✓").green().bold(),
                style(&document.summary.title).bold()
            );
            let mut context = serde_json::to_value(&document)?;
            context["videoId"] = json!(args.video_id);
            context
        }
        None => {
            println!(
                "{} No saved analysis for {}; answering without context",
                style("!").yellow().bold(),
                style(&args.video_id).yellow()
            );
            json!({ "videoId": args.video_id })
        }
    };

    if args.session.is_none() {
        println!("{}", style("Anonymous session: answers are not remembered").dim());
    }
    println!(
        "{}",
        style("Type a question, /clear to forget the session, or /exit").dim()
    );
    println!("{}", style("─".repeat(60)).dim());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style(">").cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        match message {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                if let Some(session) = &args.session {
                    service.clear_session(session, &args.video_id);
                }
                println!("{} Session cleared", style("✓").green().bold());
                continue;
            }
            _ => {}
        }

        let request = ChatRequest {
            message: message.to_string(),
            video_context: Some(video_context.clone()),
            session_key: args.session.clone(),
        };
        let spinner = create_spinner("Thinking...");
        match service.chat(&request).await {
            Ok(response) => {
                spinner.finish_and_clear();
                println!("{}\n", response.response);
            }
            Err(e) => {
                spinner.abandon_with_message(format!("{} {}", style("✗").red().bold(), e));
            }
        }
    }

    Ok(())
}
