//! CLI command implementations

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use primex_core::api::SearchFilters;
use primex_core::engine::engine_channel;
use primex_core::{
    driver, AniwatchClient, AppConfig, HlsProbeFactory, PlaybackController, PlaybackPhase,
    Server, SessionHandle, SourceResolver, Track,
};
use std::sync::Arc;
use std::time::Duration;

use crate::output::{self, OutputFormat};

/// Suggestions shown for search-as-you-type
const SUGGESTION_LIMIT: usize = 8;

fn client(config: &AppConfig) -> anyhow::Result<AniwatchClient> {
    AniwatchClient::new(&config.api).context("failed to build API client")
}

fn resolver(config: &AppConfig) -> anyhow::Result<SourceResolver> {
    Ok(SourceResolver::with_priority(
        Arc::new(client(config)?),
        config.player.server_priority.clone(),
    ))
}

/// Spinner on stderr, hidden for machine-readable output
fn spinner(message: &str, format: OutputFormat) -> ProgressBar {
    if format == OutputFormat::Json {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Show home page sections
pub async fn home(config: &AppConfig, format: OutputFormat) -> anyhow::Result<()> {
    let home = client(config)?.home().await?;
    output::print_home(&home, format)
}

/// Show one page of a category listing
pub async fn category(config: &AppConfig, name: &str, page: u32, format: OutputFormat) -> anyhow::Result<()> {
    let listing = client(config)?.category(name, page).await?;
    output::print_anime_list(&format!("{} (page {})", name, listing.current_page), &listing.results, format)?;
    if listing.has_next_page && format != OutputFormat::Json {
        println!("  more: --page {}", listing.current_page + 1);
    }
    Ok(())
}

pub async fn search(config: &AppConfig, query: &str, page: u32, format: OutputFormat) -> anyhow::Result<()> {
    let query = query.trim();
    if query.is_empty() {
        bail!("search query is empty");
    }
    let listing = client(config)?.search(query, page).await?;
    output::print_anime_list(&format!("Results for \"{}\"", query), &listing.results, format)?;
    if listing.has_next_page && format != OutputFormat::Json {
        println!("  more: --page {}", listing.current_page + 1);
    }
    Ok(())
}

pub async fn suggest(config: &AppConfig, query: &str, format: OutputFormat) -> anyhow::Result<()> {
    let mut suggestions = client(config)?.search_suggestions(query.trim()).await?;
    suggestions.truncate(SUGGESTION_LIMIT);
    output::print_suggestions(&suggestions, format)
}

pub async fn genre(config: &AppConfig, name: &str, page: u32, format: OutputFormat) -> anyhow::Result<()> {
    let filters = SearchFilters {
        genres: vec![name.to_string()],
        page: Some(page),
    };
    let listing = client(config)?.advanced_search(&filters).await?;
    output::print_anime_list(&format!("Genre: {}", name), &listing.results, format)
}

/// Anime details plus its episode list
pub async fn info(config: &AppConfig, anime_id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let info = client(config)?.anime_info(anime_id).await?;
    output::print_info(&info, format)
}

pub async fn servers(config: &AppConfig, episode_id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let servers = client(config)?.episode_servers(episode_id).await?;
    output::print_servers(&servers, format)
}

/// One source lookup with errors shown as-is
pub async fn sources(
    config: &AppConfig,
    episode_id: &str,
    server: &str,
    track: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let server = Server::from(server.to_string());
    let track: Track = track.parse()?;

    let set = client(config)?
        .try_fetch_sources(episode_id, &server, track)
        .await
        .with_context(|| format!("{} ({}) returned no sources", server, track))?;
    output::print_sources(&set, format)
}

/// Run the full fallback chain
pub async fn resolve(config: &AppConfig, episode_id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let resolver = resolver(config)?;

    let pb = spinner(&format!("Resolving {}", episode_id), format);
    let resolution = resolver
        .resolve(episode_id, config.player.default_server.clone(), config.player.default_track)
        .await;
    pb.finish_and_clear();

    output::print_resolution(&resolution, format)?;
    resolution.into_result(episode_id)?;
    Ok(())
}

/// Options for the `play` command
pub struct PlayOptions {
    pub server: Option<String>,
    pub track: Option<String>,
    pub quality: Option<usize>,
    pub anime: Option<String>,
    pub switch_track: bool,
}

/// Drive a session with the headless engine until it settles
pub async fn play(
    config: &AppConfig,
    episode_id: &str,
    options: PlayOptions,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (events_tx, events_rx) = engine_channel();
    let factory = HlsProbeFactory::new(events_tx, config.api.request_timeout())?;
    let controller = PlaybackController::new(config.player.clone(), Box::new(factory));
    let handle = driver::spawn(controller, Arc::new(resolver(config)?), events_rx);
    tracing::debug!(session_id = %handle.id(), episode_id, "Session started");

    if let Some(anime_id) = &options.anime {
        let episodes = client(config)?.episodes(anime_id).await?;
        handle.set_episodes(episodes)?;
    }

    match (options.server, options.track) {
        (None, None) => handle.load_episode(episode_id).await?,
        (server, track) => {
            let server = server
                .map(Server::from)
                .unwrap_or_else(|| config.player.default_server.clone());
            let track = match track {
                Some(track) => track.parse()?,
                None => config.player.default_track,
            };
            handle.change_server(episode_id, server, track).await?
        }
    }

    let mut phase = follow(&handle, format).await?;

    if let (Some(index), PlaybackPhase::Playing) = (options.quality, phase) {
        handle.select_quality(index).await?;
        phase = follow(&handle, format).await?;
    }

    if options.switch_track && phase == PlaybackPhase::Playing {
        let current = handle.snapshot();
        if let (Some(server), Some(track)) = (current.active_server, current.active_track) {
            handle.change_server(episode_id, server, track.toggled()).await?;
            phase = follow(&handle, format).await?;
        }
    }

    let snapshot = handle.snapshot();
    handle.shutdown().await?;

    if phase.is_terminal() {
        bail!(snapshot
            .error_message
            .unwrap_or_else(|| "playback failed".to_string()));
    }
    Ok(())
}

/// Print every snapshot until Playing or Failed
async fn follow(handle: &SessionHandle, format: OutputFormat) -> anyhow::Result<PlaybackPhase> {
    let mut state = handle.subscribe();
    loop {
        let snapshot = state.borrow_and_update().clone();
        output::print_snapshot(&snapshot, format)?;
        if snapshot.is_settled() {
            return Ok(snapshot.phase);
        }
        if state.changed().await.is_err() {
            bail!("session driver stopped");
        }
    }
}
