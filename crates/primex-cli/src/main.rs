//! PrimeX CLI - terminal front end for PrimeXStream
//!
//! Features:
//! - Home page, category, genre and search browsing
//! - Anime details and episode lists
//! - Server listing and raw source lookup
//! - Source resolution with server/track fallback
//! - Headless playback sessions with recovery

use clap::{Parser, Subcommand};
use primex_core::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use output::OutputFormat;

/// PrimeX CLI - Anime streaming toolkit
#[derive(Parser)]
#[command(name = "primex")]
#[command(author = "PrimeXStream Developers")]
#[command(version)]
#[command(about = "Browse the catalog and resolve anime streams", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show spotlight, trending, latest and top airing titles
    Home,

    /// List a category (top-airing, most-popular, most-favorite, ...)
    Category {
        name: String,

        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Search the catalog
    Search {
        query: String,

        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Search-as-you-type suggestions
    Suggest { query: String },

    /// Browse a genre
    Genre {
        name: String,

        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Show anime details and episodes
    Info { anime_id: String },

    /// List servers offering an episode
    Servers { episode_id: String },

    /// Fetch sources from one server/track without fallback
    Sources {
        episode_id: String,

        #[arg(short, long, default_value = "hd-1")]
        server: String,

        /// Audio track (sub, dub, raw)
        #[arg(short, long, default_value = "sub")]
        track: String,
    },

    /// Resolve playable sources with server and track fallback
    Resolve { episode_id: String },

    /// Run a playback session with the headless HLS engine
    Play {
        episode_id: String,

        /// Use exactly this server instead of the fallback chain
        #[arg(short, long)]
        server: Option<String>,

        /// Use exactly this track instead of the fallback chain
        #[arg(short, long)]
        track: Option<String>,

        /// Switch to this source index once playing
        #[arg(short, long)]
        quality: Option<usize>,

        /// Anime ID, loads the episode list for navigation
        #[arg(short, long)]
        anime: Option<String>,

        /// Flip between sub and dub on the active server once playing
        #[arg(long)]
        switch_track: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    primex_core::init();

    let config = AppConfig::load(cli.config.as_deref())?;
    let format = OutputFormat::from(cli.format.as_str());

    match cli.command {
        Commands::Home => {
            commands::home(&config, format).await?;
        }
        Commands::Category { name, page } => {
            commands::category(&config, &name, page, format).await?;
        }
        Commands::Search { query, page } => {
            commands::search(&config, &query, page, format).await?;
        }
        Commands::Suggest { query } => {
            commands::suggest(&config, &query, format).await?;
        }
        Commands::Genre { name, page } => {
            commands::genre(&config, &name, page, format).await?;
        }
        Commands::Info { anime_id } => {
            commands::info(&config, &anime_id, format).await?;
        }
        Commands::Servers { episode_id } => {
            commands::servers(&config, &episode_id, format).await?;
        }
        Commands::Sources { episode_id, server, track } => {
            commands::sources(&config, &episode_id, &server, &track, format).await?;
        }
        Commands::Resolve { episode_id } => {
            commands::resolve(&config, &episode_id, format).await?;
        }
        Commands::Play { episode_id, server, track, quality, anime, switch_track } => {
            let options = commands::PlayOptions { server, track, quality, anime, switch_track };
            commands::play(&config, &episode_id, options, format).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_play_flags() {
        let cli = Cli::parse_from([
            "primex", "-f", "json", "play", "frieren-18542?ep=107257", "-s", "hd-2", "-t", "dub", "-q", "1",
        ]);
        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Play { episode_id, server, track, quality, anime, switch_track } => {
                assert_eq!(episode_id, "frieren-18542?ep=107257");
                assert_eq!(server.as_deref(), Some("hd-2"));
                assert_eq!(track.as_deref(), Some("dub"));
                assert_eq!(quality, Some(1));
                assert!(anime.is_none());
                assert!(!switch_track);
            }
            _ => panic!("expected play"),
        }
    }

    #[test]
    fn test_parse_switch_track() {
        let cli = Cli::parse_from(["primex", "play", "ep-1", "--switch-track"]);
        assert!(matches!(cli.command, Commands::Play { switch_track: true, .. }));
    }
}
