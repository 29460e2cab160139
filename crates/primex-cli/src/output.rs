//! Output formatting for CLI

use console::style;
use primex_core::api::{AnimeInfo, AnimeSummary, EpisodeServers, HomePage, SearchSuggestion};
use primex_core::{PlaybackPhase, Resolution, SessionSnapshot, SourceSet, Track};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

pub fn print_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

fn print_table<R: Tabled>(rows: Vec<R>) {
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

#[derive(Tabled)]
struct AnimeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Audio")]
    audio: String,
    #[tabled(rename = "Released")]
    released: String,
}

fn audio_badge(anime: &AnimeSummary) -> String {
    anime
        .sub_or_dub
        .map(|t| t.label().to_uppercase())
        .unwrap_or_else(|| "-".to_string())
}

pub fn print_anime_list(heading: &str, items: &[AnimeSummary], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&items)?,
        OutputFormat::Table => {
            println!("{}", style(heading).bold());
            print_table(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, a)| AnimeRow {
                        index: i + 1,
                        id: a.id.clone(),
                        title: a.title.clone(),
                        kind: or_dash(a.kind.as_deref()),
                        audio: audio_badge(a),
                        released: or_dash(a.release_date.as_deref()),
                    })
                    .collect(),
            );
        }
        OutputFormat::Text => {
            println!("{}", style(heading).bold());
            if items.is_empty() {
                println!("  No results");
            }
            for (i, anime) in items.iter().enumerate() {
                println!(
                    "  {:>2}. {} [{}] ({}) - {}",
                    i + 1,
                    anime.title,
                    anime.kind.as_deref().unwrap_or("?"),
                    audio_badge(anime),
                    style(&anime.id).dim()
                );
            }
        }
    }
    Ok(())
}

pub fn print_home(home: &HomePage, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(home);
    }

    if let Some(hero) = home.hero() {
        println!("{} {}", style("Featured:").cyan().bold(), hero.title);
        if let Some(description) = home.spotlight.first().and_then(|s| s.description.as_deref()) {
            println!("  {}\n", description);
        }
    }
    print_anime_list("Trending", &home.trending, format)?;
    print_anime_list("Latest Episodes", &home.latest_episodes, format)?;
    print_anime_list("Top Airing", &home.top_airing, format)
}

pub fn print_suggestions(items: &[SearchSuggestion], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(&items);
    }
    for s in items {
        println!("  {} {} {}", s.title, style(&s.release_date).dim(), style(&s.id).dim());
    }
    Ok(())
}

#[derive(Tabled)]
struct EpisodeRow {
    #[tabled(rename = "#")]
    number: String,
    #[tabled(rename = "Episode ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Filler")]
    filler: String,
}

pub fn print_info(info: &AnimeInfo, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(info);
    }

    println!("{}", style(&info.title).bold());
    if let Some(other) = &info.other_name {
        println!("  Also known as: {}", other);
    }
    println!("  Type: {}", info.kind.as_deref().unwrap_or("TV"));
    println!("  Status: {}", info.status.as_deref().unwrap_or("Unknown"));
    if let Some(aired) = &info.release_date {
        println!("  Aired: {}", aired);
    }
    println!("  Episodes: {}", info.total_episodes);
    if !info.genres.is_empty() {
        println!("  Genres: {}", info.genres.join(", "));
    }
    if let Some(description) = &info.description {
        println!("\n{}", description);
    }

    println!();
    match format {
        OutputFormat::Table => print_table(
            info.episodes
                .iter()
                .enumerate()
                .map(|(i, e)| EpisodeRow {
                    number: e.number.unwrap_or(i as u32 + 1).to_string(),
                    id: e.id.clone(),
                    title: e.title.clone().unwrap_or_default(),
                    filler: if e.is_filler { "yes".into() } else { String::new() },
                })
                .collect(),
        ),
        _ => {
            for (i, episode) in info.episodes.iter().enumerate() {
                let filler = if episode.is_filler { " (filler)" } else { "" };
                println!(
                    "  {}{} - {}",
                    episode.display_title(i),
                    filler,
                    style(&episode.id).dim()
                );
            }
        }
    }
    Ok(())
}

pub fn print_servers(servers: &EpisodeServers, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(servers);
    }
    for track in [Track::Sub, Track::Dub, Track::Raw] {
        let list = servers.servers_for(track);
        if list.is_empty() {
            continue;
        }
        let names: Vec<&str> = list.iter().map(|s| s.label()).collect();
        println!("  {}: {}", track.label().to_uppercase(), names.join(", "));
    }
    Ok(())
}

#[derive(Tabled)]
struct SourceRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Quality")]
    quality: String,
    #[tabled(rename = "URL")]
    url: String,
}

pub fn print_sources(set: &SourceSet, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(set)?,
        OutputFormat::Table => print_table(
            set.sources
                .iter()
                .enumerate()
                .map(|(i, s)| SourceRow {
                    index: i,
                    quality: s.quality_label().to_string(),
                    url: s.url.clone(),
                })
                .collect(),
        ),
        OutputFormat::Text => {
            for (i, source) in set.sources.iter().enumerate() {
                println!("  [{}] {} {}", i, source.quality_label(), source.url);
            }
            for track in set.subtitles.iter().filter(|t| t.is_caption()) {
                println!(
                    "  subtitle: {} {}",
                    track.lang.as_deref().unwrap_or("unknown"),
                    track.url
                );
            }
            if let Some(intro) = set.intro {
                println!("  intro: {:.0}s - {:.0}s", intro.start, intro.end);
            }
            if let Some(outro) = set.outro {
                println!("  outro: {:.0}s - {:.0}s", outro.start, outro.end);
            }
        }
    }
    Ok(())
}

pub fn print_resolution(resolution: &Resolution, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(resolution);
    }
    match resolution {
        Resolution::Resolved(resolved) => {
            println!(
                "{} {} / {} after {} attempt(s)",
                style("Resolved:").green().bold(),
                resolved.server,
                resolved.track,
                resolved.attempts
            );
            print_sources(&resolved.sources, format)
        }
        Resolution::Unavailable { attempts } => {
            println!(
                "{} no sources after {} attempt(s)",
                style("Unavailable:").red().bold(),
                attempts
            );
            Ok(())
        }
    }
}

pub fn print_snapshot(snapshot: &SessionSnapshot, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }

    let phase = match snapshot.phase {
        PlaybackPhase::Playing => style(snapshot.phase.to_string()).green(),
        PlaybackPhase::Failed => style(snapshot.phase.to_string()).red(),
        PlaybackPhase::Recovering => style(snapshot.phase.to_string()).yellow(),
        _ => style(snapshot.phase.to_string()).cyan(),
    };
    let via = match (&snapshot.active_server, snapshot.active_track) {
        (Some(server), Some(track)) => format!(" via {}/{}", server, track),
        _ => String::new(),
    };

    println!(
        "[{}] {} {}{}",
        snapshot.updated_at.format("%H:%M:%S"),
        phase,
        snapshot.episode_id.as_deref().unwrap_or("-"),
        via
    );
    if let Some(url) = snapshot.current_url() {
        println!("    source: {}", url);
    }
    if let Some(notice) = &snapshot.notice {
        println!("    {}", style(notice).yellow());
    }
    if let Some(message) = &snapshot.error_message {
        println!("    {}", style(message).red());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::from("anything"), OutputFormat::Text);
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(None), "-");
        assert_eq!(or_dash(Some("TV")), "TV");
    }
}
