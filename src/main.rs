//! svstats - Fetch and cache SUPERVIVE player and match statistics
//!
//! A command-line client for the op.gg SUPERVIVE API. Results are printed as
//! JSON on stdout; logs go to stderr and are controlled with `RUST_LOG`.

use clap::Parser;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use svstats::api::{MatchSummary, StatsClient};
use svstats::cli::{Cli, Command};

/// Installs the stderr log subscriber
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "svstats=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Runs one command and returns what should be printed
async fn run(
    client: &mut StatsClient,
    command: Command,
) -> Result<Value, Box<dyn std::error::Error>> {
    let output = match command {
        Command::Check {
            platform,
            unique_display_name,
        } => {
            let exists = client.player_exists(&platform, &unique_display_name).await?;
            serde_json::json!({ "exists": exists })
        }
        Command::Search { query, fresh } => {
            let players = if fresh {
                client.search_players_uncached(&query).await?
            } else {
                client.search_players(&query).await?
            };
            Value::Array(players)
        }
        Command::Match { platform, match_id } => {
            Value::Array(client.get_match(&platform, &match_id).await?)
        }
        Command::PlayerMatches {
            platform,
            player_id,
            page,
        } => {
            let page = client.player_matches_page(&platform, &player_id, page).await?;
            let summaries: Vec<MatchSummary> =
                page.data.iter().map(MatchSummary::from_item).collect();
            serde_json::to_value(summaries)?
        }
        Command::History {
            platform,
            player_id,
            pages,
        } => Value::Array(client.player_matches_pages(&platform, &player_id, pages).await?),
        Command::FetchNew {
            platform,
            player_id,
        } => client.refresh_player_matches(&platform, &player_id).await?,
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let settings = cli.settings();
    debug!(base_url = %settings.base_url, cache_file = ?settings.cache_file, "Starting");

    let mut client = StatsClient::from_settings(&settings)?;
    let output = run(&mut client, cli.command).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
