//! Command-line interface parsing for svstats
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! [`Settings`] for the stats client. Every command prints JSON to stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::api::client::DEFAULT_PAGE_BUDGET;
use crate::config::Settings;

/// svstats - Fetch and cache SUPERVIVE player and match statistics
#[derive(Parser, Debug)]
#[command(name = "svstats")]
#[command(about = "SUPERVIVE player and match statistics from op.gg")]
#[command(version)]
pub struct Cli {
    /// Override the API base URL
    #[arg(long, global = true, env = "SVSTATS_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Override the cache file location
    #[arg(long, global = true, env = "SVSTATS_CACHE_FILE", value_name = "PATH")]
    pub cache_file: Option<PathBuf>,

    /// Keep the cache in memory for this run only
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Operations exposed on the command line
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Check whether a player exists
    Check {
        platform: String,
        unique_display_name: String,
    },
    /// Search players by name
    Search {
        query: String,
        /// Skip the cached result and query the API
        #[arg(long)]
        fresh: bool,
    },
    /// Show every player's record for one match
    Match { platform: String, match_id: String },
    /// Show placement and hunter for one page of a player's matches
    PlayerMatches {
        platform: String,
        player_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Fetch several pages of a player's match history
    History {
        platform: String,
        player_id: String,
        /// Maximum number of pages to request
        #[arg(long, default_value_t = DEFAULT_PAGE_BUDGET)]
        pages: u32,
    },
    /// Ask the server to pull a player's newest matches
    FetchNew { platform: String, player_id: String },
}

impl Cli {
    /// Builds client settings, starting from the defaults
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        if let Some(base_url) = &self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(cache_file) = &self.cache_file {
            settings.cache_file = Some(cache_file.clone());
        }
        settings.use_cache = !self.no_cache;
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_check() {
        let cli = Cli::parse_from(["svstats", "check", "steam", "Player#123"]);
        assert_eq!(
            cli.command,
            Command::Check {
                platform: "steam".to_string(),
                unique_display_name: "Player#123".to_string(),
            }
        );
    }

    #[test]
    fn test_cli_parse_history_default_pages() {
        let cli = Cli::parse_from(["svstats", "history", "steam", "AB-12"]);
        assert_eq!(
            cli.command,
            Command::History {
                platform: "steam".to_string(),
                player_id: "AB-12".to_string(),
                pages: 20,
            }
        );
    }

    #[test]
    fn test_cli_parse_player_matches_page() {
        let cli = Cli::parse_from(["svstats", "player-matches", "steam", "AB", "--page", "3"]);
        assert!(matches!(cli.command, Command::PlayerMatches { page: 3, .. }));
    }

    #[test]
    fn test_cli_parse_search_fresh() {
        let cli = Cli::parse_from(["svstats", "search", "ace", "--fresh"]);
        assert!(matches!(cli.command, Command::Search { fresh: true, .. }));
    }

    #[test]
    fn test_cli_rejects_missing_subcommand() {
        assert!(Cli::try_parse_from(["svstats"]).is_err());
    }

    #[test]
    fn test_settings_from_flags() {
        let cli = Cli::parse_from([
            "svstats",
            "--base-url",
            "http://localhost:8080/",
            "--cache-file",
            "/tmp/svstats.json",
            "--no-cache",
            "search",
            "ace",
        ]);
        let settings = cli.settings();

        assert_eq!(settings.base_url, "http://localhost:8080/");
        assert_eq!(settings.cache_file, Some(PathBuf::from("/tmp/svstats.json")));
        assert!(!settings.use_cache);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["svstats", "match", "steam", "m-1", "--no-cache"]);
        assert!(cli.no_cache);
    }
}
