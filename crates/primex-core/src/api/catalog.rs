//! Catalog types handed to the view layer
//!
//! These are normalised from the wire types: titles fall back from `name`
//! to `title`, images from `poster` to `image`.

use serde::{Deserialize, Serialize};

use super::models::{
    AnimeWire, EpisodeWire, HomeData, InfoData, PageData, ServersData, SpotlightWire,
    SuggestionWire,
};
use crate::types::{Server, Track};

/// Anime card as shown in grids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimeSummary {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub kind: Option<String>,
    pub release_date: Option<String>,
    /// Badge: `sub` when sub episodes exist, else `dub` when dub episodes exist
    pub sub_or_dub: Option<Track>,
    pub duration: Option<String>,
    pub rating: Option<String>,
}

impl From<AnimeWire> for AnimeSummary {
    fn from(wire: AnimeWire) -> Self {
        let counts = wire.episodes.unwrap_or_default();
        let sub_or_dub = if counts.sub.is_some_and(|n| n > 0) {
            Some(Track::Sub)
        } else if counts.dub.is_some_and(|n| n > 0) {
            Some(Track::Dub)
        } else {
            None
        };

        Self {
            title: wire.name.or(wire.title).unwrap_or_else(|| wire.id.clone()),
            id: wire.id,
            image: wire.poster.or(wire.image),
            kind: wire.kind,
            release_date: wire.release_date,
            sub_or_dub,
            duration: wire.duration,
            rating: wire.rating,
        }
    }
}

/// Featured entry on the home page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spotlight {
    pub anime: AnimeSummary,
    pub description: Option<String>,
    pub other_info: Vec<String>,
}

impl From<SpotlightWire> for Spotlight {
    fn from(wire: SpotlightWire) -> Self {
        Self {
            anime: wire.anime.into(),
            description: wire.description,
            other_info: wire.other_info,
        }
    }
}

/// Home page sections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomePage {
    pub spotlight: Vec<Spotlight>,
    pub trending: Vec<AnimeSummary>,
    pub latest_episodes: Vec<AnimeSummary>,
    pub top_airing: Vec<AnimeSummary>,
}

impl HomePage {
    /// Hero entry: first spotlight, else first top-airing title
    pub fn hero(&self) -> Option<&AnimeSummary> {
        self.spotlight
            .first()
            .map(|s| &s.anime)
            .or_else(|| self.top_airing.first())
    }
}

impl From<HomeData> for HomePage {
    fn from(data: HomeData) -> Self {
        Self {
            spotlight: data.spotlight_animes.into_iter().map(Into::into).collect(),
            trending: data.trending_animes.into_iter().map(Into::into).collect(),
            latest_episodes: data.latest_episode_animes.into_iter().map(Into::into).collect(),
            top_airing: data.top_airing_animes.into_iter().map(Into::into).collect(),
        }
    }
}

/// One page of a category, search or genre listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimePage {
    pub results: Vec<AnimeSummary>,
    pub current_page: u32,
    pub has_next_page: bool,
}

impl AnimePage {
    pub(crate) fn from_wire(data: PageData, requested_page: u32) -> Self {
        Self {
            results: data.animes.into_iter().map(Into::into).collect(),
            current_page: data.current_page.unwrap_or(requested_page),
            has_next_page: data.has_next_page,
        }
    }
}

/// Filters for the browse page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Sent as one comma separated genre path, e.g. `genre/action,comedy`
    pub genres: Vec<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub number: Option<u32>,
    pub title: Option<String>,
    pub is_filler: bool,
}

impl Episode {
    /// `Episode 3: Title`, numbered by position when the API omits it
    pub fn display_title(&self, index: usize) -> String {
        let number = self.number.unwrap_or(index as u32 + 1);
        match &self.title {
            Some(title) => format!("Episode {}: {}", number, title),
            None => format!("Episode {}", number),
        }
    }
}

impl From<EpisodeWire> for Episode {
    fn from(wire: EpisodeWire) -> Self {
        Self {
            id: wire.episode_id,
            number: wire.number,
            title: wire.title,
            is_filler: wire.is_filler,
        }
    }
}

/// Anime detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimeInfo {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub release_date: Option<String>,
    pub total_episodes: usize,
    pub genres: Vec<String>,
    pub other_name: Option<String>,
    pub episodes: Vec<Episode>,
}

impl AnimeInfo {
    pub(crate) fn from_wire(requested_id: &str, data: InfoData, episodes: Vec<Episode>) -> Self {
        let detail = data.anime.unwrap_or_default();
        let info = detail.info.unwrap_or_default();
        let more = detail.more_info.unwrap_or_default();
        let stats = info.stats.unwrap_or_default();

        // Zero counts fall back to the episode list
        let sub_count = more
            .episodes
            .and_then(|c| c.sub)
            .filter(|n| *n > 0)
            .or_else(|| stats.episodes.and_then(|c| c.sub).filter(|n| *n > 0))
            .map(|n| n as usize);

        Self {
            id: if info.id.is_empty() {
                requested_id.to_string()
            } else {
                info.id.clone()
            },
            title: info
                .name
                .or(info.title)
                .unwrap_or_else(|| requested_id.to_string()),
            image: info.poster.or(info.image),
            description: info.description,
            kind: more.kind.or(stats.kind).or(info.kind),
            status: more.status.or(info.status),
            release_date: more.aired,
            total_episodes: sub_count.unwrap_or(episodes.len()),
            genres: more.genres,
            other_name: more.japanese,
            episodes,
        }
    }
}

/// Servers offering an episode, per track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeServers {
    pub episode_id: Option<String>,
    pub episode_no: Option<u32>,
    pub sub: Vec<Server>,
    pub dub: Vec<Server>,
    pub raw: Vec<Server>,
}

impl EpisodeServers {
    pub fn servers_for(&self, track: Track) -> &[Server] {
        match track {
            Track::Sub => &self.sub,
            Track::Dub => &self.dub,
            Track::Raw => &self.raw,
        }
    }
}

impl From<ServersData> for EpisodeServers {
    fn from(data: ServersData) -> Self {
        let names = |list: Vec<super::models::ServerWire>| -> Vec<Server> {
            list.into_iter().map(|s| Server::from(s.server_name)).collect()
        };
        Self {
            episode_id: data.episode_id,
            episode_no: data.episode_no,
            sub: names(data.sub),
            dub: names(data.dub),
            raw: names(data.raw),
        }
    }
}

/// Search-as-you-type entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSuggestion {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    /// Extra info joined with ` • `
    pub release_date: String,
}

impl From<SuggestionWire> for SearchSuggestion {
    fn from(wire: SuggestionWire) -> Self {
        Self {
            title: wire.name.unwrap_or_else(|| wire.id.clone()),
            id: wire.id,
            image: wire.poster,
            release_date: wire.more_info.join(" • "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::EpisodeCounts;

    fn wire(id: &str) -> AnimeWire {
        AnimeWire {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_summary_normalization() {
        let summary: AnimeSummary = AnimeWire {
            name: Some("Frieren".into()),
            title: Some("ignored".into()),
            image: Some("fallback.jpg".into()),
            episodes: Some(EpisodeCounts { sub: Some(28), dub: Some(28) }),
            ..wire("frieren-18542")
        }
        .into();

        assert_eq!(summary.title, "Frieren");
        assert_eq!(summary.image.as_deref(), Some("fallback.jpg"));
        assert_eq!(summary.sub_or_dub, Some(Track::Sub));
    }

    #[test]
    fn test_summary_dub_only_badge() {
        let summary: AnimeSummary = AnimeWire {
            episodes: Some(EpisodeCounts { sub: None, dub: Some(12) }),
            ..wire("dub-only")
        }
        .into();
        assert_eq!(summary.sub_or_dub, Some(Track::Dub));
        assert_eq!(summary.title, "dub-only");

        let bare: AnimeSummary = wire("bare").into();
        assert_eq!(bare.sub_or_dub, None);
    }

    #[test]
    fn test_episode_display_title() {
        let ep = Episode {
            id: "x?ep=1".into(),
            number: None,
            title: None,
            is_filler: false,
        };
        assert_eq!(ep.display_title(4), "Episode 5");

        let named = Episode {
            number: Some(2),
            title: Some("The Journey".into()),
            ..ep
        };
        assert_eq!(named.display_title(0), "Episode 2: The Journey");
    }

    #[test]
    fn test_info_total_episodes_falls_back_to_list() {
        let episodes = vec![
            Episode { id: "a".into(), number: Some(1), title: None, is_filler: false },
            Episode { id: "b".into(), number: Some(2), title: None, is_filler: true },
        ];
        let info = AnimeInfo::from_wire("show-1", InfoData::default(), episodes);
        assert_eq!(info.id, "show-1");
        assert_eq!(info.title, "show-1");
        assert_eq!(info.total_episodes, 2);
    }

    #[test]
    fn test_info_zero_sub_count_uses_list() {
        let data: InfoData = serde_json::from_value(serde_json::json!({
            "anime": {
                "info": { "id": "show-1", "name": "Show" },
                "moreInfo": { "episodes": { "sub": 0, "dub": 0 } }
            }
        }))
        .unwrap();
        let episodes = vec![
            Episode { id: "a".into(), number: Some(1), title: None, is_filler: false },
            Episode { id: "b".into(), number: Some(2), title: None, is_filler: false },
            Episode { id: "c".into(), number: Some(3), title: None, is_filler: false },
        ];
        let info = AnimeInfo::from_wire("show-1", data, episodes);
        assert_eq!(info.total_episodes, 3);
    }

    #[test]
    fn test_home_hero_prefers_spotlight() {
        let mut home = HomePage {
            top_airing: vec![wire("top").into()],
            ..Default::default()
        };
        assert_eq!(home.hero().map(|a| a.id.as_str()), Some("top"));

        home.spotlight.push(Spotlight {
            anime: wire("spot").into(),
            description: None,
            other_info: vec![],
        });
        assert_eq!(home.hero().map(|a| a.id.as_str()), Some("spot"));
    }
}
