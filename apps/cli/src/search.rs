use anyhow::Result;
use console::style;
use pageon_core::{PageonConfig, SearchParams, YoutubeSearchService};

use crate::{SearchArgs, create_spinner};

pub async fn run(args: SearchArgs, config: PageonConfig) -> Result<()> {
    let service = YoutubeSearchService::from_env(config.cache.clone());
    let params = SearchParams {
        gl: args.gl,
        hl: args.hl,
        duration: args.duration.map(Into::into),
        limit: args.limit,
        ..SearchParams::new(args.query)
    };

    let spinner = create_spinner(&format!("Searching for \"{}\"...", params.search_query));
    let response = match service.search(&params).await {
        Ok(response) => response,
        Err(e) => {
            spinner.abandon_with_message(format!("{} {}", style("✗").red().bold(), e));
            return Err(e.into());
        }
    };
    spinner.finish_with_message(format!(
        "{} {} results",
        style("✓").green().bold(),
        response.video_results.len()
    ));
    println!("{}", style("─".repeat(60)).dim());

    for (i, video) in response.video_results.iter().enumerate() {
        let title = video["title"].as_str().unwrap_or("(untitled)");
        let link = video["link"].as_str().unwrap_or_default();
        let length = video["length"].as_str().unwrap_or("?");
        let channel = video["channel"]["name"].as_str().unwrap_or_default();

        println!(
            "{:>3}. {} {}",
            i + 1,
            style(title).bold(),
            style(format!("[{length}]")).dim()
        );
        if !channel.is_empty() {
            println!("     {}", style(channel).yellow());
        }
        println!("     {}", style(link).cyan());
    }

    Ok(())
}
