//! Wire types for the Aniwatch (hianime v2) API
//!
//! Every response is wrapped in `{ "success": bool, "data": {...} }`. Fields
//! are optional wherever the upstream omits them for some titles.

use serde::Deserialize;
use std::collections::HashMap;

use crate::types::{StreamSource, SubtitleTrack, TimeRange};

/// Response envelope shared by all endpoints
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// A missing flag counts as failure
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourcesData {
    pub headers: HashMap<String, String>,
    pub sources: Vec<StreamSource>,
    #[serde(alias = "tracks")]
    pub subtitles: Vec<SubtitleTrack>,
    pub intro: Option<TimeRange>,
    pub outro: Option<TimeRange>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct EpisodeCounts {
    pub sub: Option<u32>,
    pub dub: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimeWire {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub poster: Option<String>,
    pub image: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub release_date: Option<String>,
    pub episodes: Option<EpisodeCounts>,
    pub duration: Option<String>,
    pub rating: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpotlightWire {
    #[serde(flatten)]
    pub anime: AnimeWire,
    pub description: Option<String>,
    pub other_info: Vec<String>,
    pub rank: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HomeData {
    pub spotlight_animes: Vec<SpotlightWire>,
    pub trending_animes: Vec<AnimeWire>,
    pub latest_episode_animes: Vec<AnimeWire>,
    pub top_airing_animes: Vec<AnimeWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageData {
    pub animes: Vec<AnimeWire>,
    pub current_page: Option<u32>,
    pub has_next_page: bool,
    pub total_pages: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InfoData {
    pub anime: Option<AnimeDetailWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimeDetailWire {
    pub info: Option<InfoWire>,
    pub more_info: Option<MoreInfoWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InfoWire {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub poster: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub stats: Option<StatsWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsWire {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub episodes: Option<EpisodeCounts>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MoreInfoWire {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub aired: Option<String>,
    pub episodes: Option<EpisodeCounts>,
    pub genres: Vec<String>,
    pub japanese: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EpisodesData {
    pub total_episodes: Option<u32>,
    pub episodes: Vec<EpisodeWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EpisodeWire {
    pub episode_id: String,
    pub number: Option<u32>,
    pub title: Option<String>,
    pub is_filler: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServersData {
    pub episode_id: Option<String>,
    pub episode_no: Option<u32>,
    pub sub: Vec<ServerWire>,
    pub dub: Vec<ServerWire>,
    pub raw: Vec<ServerWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerWire {
    pub server_id: Option<u64>,
    pub server_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestionsData {
    pub suggestions: Vec<SuggestionWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestionWire {
    pub id: String,
    pub name: Option<String>,
    pub poster: Option<String>,
    pub more_info: Vec<String>,
}
