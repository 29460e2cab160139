//! Aniwatch API client
//!
//! Catalog operations return `Result`. Source lookups go through
//! [`SourceProvider`], which folds every failure into `None` so the
//! resolution engine can treat it like an empty source set.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::catalog::{
    AnimeInfo, AnimePage, Episode, EpisodeServers, HomePage, SearchFilters, SearchSuggestion,
};
use super::models::{
    EpisodesData, Envelope, HomeData, InfoData, PageData, ServersData, SourcesData,
    SuggestionsData,
};
use super::SourceProvider;
use crate::config::{encode_component, ApiConfig, UrlBuilder};
use crate::{Error, Result, Server, SourceSet, Track};

/// HTTP client for the catalog API
#[derive(Clone)]
pub struct AniwatchClient {
    client: Client,
    urls: UrlBuilder,
}

impl AniwatchClient {
    /// Create a client with the configured timeout and endpoint mode
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            urls: config.url_builder(),
        })
    }

    /// Create a client around an existing HTTP client and URL builder
    pub fn with_url_builder(client: Client, urls: UrlBuilder) -> Self {
        Self { client, urls }
    }

    /// Request URL for an API path
    pub fn url_for(&self, path: &str) -> String {
        (self.urls)(path)
    }

    /// GET a path and unwrap the `{success, data}` envelope
    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url_for(path);
        debug!(url = %url, "Fetching");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::from_transport(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus { status, url });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::from_transport(&url, e))?;

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedResponse(format!("{}: {}", path, e)))?;

        if !envelope.success {
            return Err(Error::Api {
                endpoint: path.to_string(),
            });
        }

        envelope
            .data
            .ok_or_else(|| Error::MalformedResponse(format!("{}: missing data", path)))
    }

    /// Home page sections
    pub async fn home(&self) -> Result<HomePage> {
        let data: HomeData = self.get_data("home").await?;
        Ok(data.into())
    }

    /// Category listing (`top-airing`, `most-popular`, `most-favorite`, ...)
    pub async fn category(&self, name: &str, page: u32) -> Result<AnimePage> {
        let path = format!("{}?page={}", name, page);
        let data: PageData = self.get_data(&path).await?;
        Ok(AnimePage::from_wire(data, page))
    }

    pub async fn top_airing(&self, page: u32) -> Result<AnimePage> {
        self.category("top-airing", page).await
    }

    pub async fn most_popular(&self, page: u32) -> Result<AnimePage> {
        self.category("most-popular", page).await
    }

    pub async fn most_favorite(&self, page: u32) -> Result<AnimePage> {
        self.category("most-favorite", page).await
    }

    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, page: u32) -> Result<AnimePage> {
        let path = format!("search?q={}&page={}", encode_component(query), page);
        let data: PageData = self.get_data(&path).await?;
        Ok(AnimePage::from_wire(data, page))
    }

    pub async fn search_suggestions(&self, query: &str) -> Result<Vec<SearchSuggestion>> {
        let path = format!("search/suggestion?q={}", encode_component(query));
        let data: SuggestionsData = self.get_data(&path).await?;
        Ok(data.suggestions.into_iter().map(Into::into).collect())
    }

    /// One genre, or several joined with `,` which stays unescaped in the path
    pub async fn genre(&self, name: &str, page: u32) -> Result<AnimePage> {
        let segment = name
            .to_lowercase()
            .split(',')
            .map(|g| encode_component(g.trim()))
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("genre/{}?page={}", segment, page);
        let data: PageData = self.get_data(&path).await?;
        Ok(AnimePage::from_wire(data, page))
    }

    /// Browse by genres, or fall back to top-airing without a filter
    pub async fn advanced_search(&self, filters: &SearchFilters) -> Result<AnimePage> {
        let page = filters.page.unwrap_or(1);
        if filters.genres.is_empty() {
            return self.top_airing(page).await;
        }
        self.genre(&filters.genres.join(","), page).await
    }

    /// Anime detail plus its episode list
    #[instrument(skip(self))]
    pub async fn anime_info(&self, anime_id: &str) -> Result<AnimeInfo> {
        let path = format!("anime/{}", encode_component(anime_id));
        let data: InfoData = self.get_data(&path).await?;

        let episodes = match self.episodes(anime_id).await {
            Ok(episodes) => episodes,
            Err(e) => {
                warn!(anime_id, error = %e, "Episode list unavailable");
                Vec::new()
            }
        };

        Ok(AnimeInfo::from_wire(anime_id, data, episodes))
    }

    pub async fn episodes(&self, anime_id: &str) -> Result<Vec<Episode>> {
        let path = format!("anime/{}/episodes", encode_component(anime_id));
        let data: EpisodesData = self.get_data(&path).await?;
        Ok(data.episodes.into_iter().map(Into::into).collect())
    }

    pub async fn episode_servers(&self, episode_id: &str) -> Result<EpisodeServers> {
        let path = format!(
            "episode/servers?animeEpisodeId={}",
            encode_component(episode_id)
        );
        let data: ServersData = self.get_data(&path).await?;
        Ok(data.into())
    }

    /// Streaming sources for one episode/server/track, errors preserved
    pub async fn try_fetch_sources(
        &self,
        episode_id: &str,
        server: &Server,
        track: Track,
    ) -> Result<SourceSet> {
        let path = format!(
            "episode/sources?animeEpisodeId={}&server={}&category={}",
            encode_component(episode_id),
            encode_component(server.label()),
            track.label()
        );
        let data: SourcesData = self.get_data(&path).await?;

        Ok(SourceSet {
            sources: data.sources,
            subtitles: data
                .subtitles
                .into_iter()
                .filter(|t| !t.url.is_empty())
                .collect(),
            intro: data.intro.filter(|r| !r.is_empty()),
            outro: data.outro.filter(|r| !r.is_empty()),
            headers: data.headers,
        })
    }
}

#[async_trait]
impl SourceProvider for AniwatchClient {
    #[instrument(skip(self, server, track), fields(server = %server, track = %track))]
    async fn fetch_sources(
        &self,
        episode_id: &str,
        server: &Server,
        track: Track,
    ) -> Option<SourceSet> {
        match self.try_fetch_sources(episode_id, server, track).await {
            Ok(set) => Some(set),
            Err(Error::Timeout { url }) => {
                warn!(url = %url, "Streaming source request timed out");
                None
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Streaming source fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::direct_url_builder;

    #[test]
    fn test_url_for_uses_builder() {
        let client = AniwatchClient::with_url_builder(
            Client::new(),
            direct_url_builder("https://api.example.com/hianime"),
        );
        assert_eq!(
            client.url_for("anime/frieren-18542"),
            "https://api.example.com/hianime/anime/frieren-18542"
        );
    }

    #[test]
    fn test_new_from_default_config() {
        let client = AniwatchClient::new(&ApiConfig::default()).unwrap();
        assert!(client.url_for("home").ends_with("/hianime/home"));
    }
}
