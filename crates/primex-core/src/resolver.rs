//! Source Resolution Engine
//!
//! Walks a fixed, finite fallback order to find a playable source set:
//!
//! 1. the requested server/track (default `hd-1`/`sub`)
//! 2. the remaining servers in priority order, same track
//! 3. the last attempted server with `dub`, if the track was `sub`
//!
//! Attempts are strictly sequential so the order is deterministic. There is
//! no backoff; each attempt is already bounded by the client timeout.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::api::SourceProvider;
use crate::{Error, Result, Server, SourceSet, Track};

/// A non-empty source set plus the combination that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSources {
    pub server: Server,
    pub track: Track,
    pub sources: SourceSet,
    /// API calls made to reach this result
    pub attempts: usize,
}

/// Outcome of a resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved(ResolvedSources),
    /// Terminal: every candidate was tried. Callers must not retry on their own.
    Unavailable { attempts: usize },
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn attempts(&self) -> usize {
        match self {
            Resolution::Resolved(r) => r.attempts,
            Resolution::Unavailable { attempts } => *attempts,
        }
    }

    /// Turn a terminal `Unavailable` into `Error::SourcesUnavailable`
    pub fn into_result(self, episode_id: &str) -> Result<ResolvedSources> {
        match self {
            Resolution::Resolved(resolved) => Ok(resolved),
            Resolution::Unavailable { .. } => Err(Error::SourcesUnavailable {
                episode_id: episode_id.to_string(),
            }),
        }
    }
}

/// Fallback search across servers and tracks
pub struct SourceResolver {
    provider: Arc<dyn SourceProvider>,
    priority: Vec<Server>,
}

impl SourceResolver {
    /// Create a resolver with the default `hd-1, hd-2, megacloud` order
    pub fn new(provider: Arc<dyn SourceProvider>) -> Self {
        Self::with_priority(provider, Server::default_priority())
    }

    pub fn with_priority(provider: Arc<dyn SourceProvider>, priority: Vec<Server>) -> Self {
        Self { provider, priority }
    }

    pub fn priority(&self) -> &[Server] {
        &self.priority
    }

    /// One call; an empty source set counts as a miss
    async fn attempt(
        &self,
        episode_id: &str,
        server: &Server,
        track: Track,
    ) -> Option<SourceSet> {
        debug!(episode_id, server = %server, track = %track, "Trying source");
        match self.provider.fetch_sources(episode_id, server, track).await {
            Some(set) if !set.is_empty() => Some(set),
            Some(_) => {
                debug!(server = %server, track = %track, "Server returned no sources");
                None
            }
            None => None,
        }
    }

    /// Run the full fallback chain starting from `server`/`track`
    #[instrument(skip(self, server, track), fields(server = %server, track = %track))]
    pub async fn resolve(&self, episode_id: &str, server: Server, track: Track) -> Resolution {
        let mut attempts = 0;
        let mut last_server = server.clone();

        attempts += 1;
        if let Some(sources) = self.attempt(episode_id, &server, track).await {
            return self.resolved(episode_id, server, track, sources, attempts);
        }

        for candidate in self.priority.iter().filter(|s| **s != server) {
            attempts += 1;
            last_server = candidate.clone();
            if let Some(sources) = self.attempt(episode_id, candidate, track).await {
                return self.resolved(episode_id, candidate.clone(), track, sources, attempts);
            }
        }

        if track == Track::Sub {
            attempts += 1;
            if let Some(sources) = self.attempt(episode_id, &last_server, Track::Dub).await {
                return self.resolved(episode_id, last_server, Track::Dub, sources, attempts);
            }
        }

        warn!(episode_id, attempts, "No streaming sources found");
        Resolution::Unavailable { attempts }
    }

    /// Resolve from the default `hd-1`/`sub` starting point
    pub async fn resolve_default(&self, episode_id: &str) -> Resolution {
        let start = self.priority.first().cloned().unwrap_or(Server::Hd1);
        self.resolve(episode_id, start, Track::Sub).await
    }

    /// A single attempt for an explicit server/track choice
    #[instrument(skip(self, server, track), fields(server = %server, track = %track))]
    pub async fn resolve_exact(&self, episode_id: &str, server: Server, track: Track) -> Resolution {
        match self.attempt(episode_id, &server, track).await {
            Some(sources) => self.resolved(episode_id, server, track, sources, 1),
            None => {
                warn!(episode_id, "Requested server/track has no sources");
                Resolution::Unavailable { attempts: 1 }
            }
        }
    }

    fn resolved(
        &self,
        episode_id: &str,
        server: Server,
        track: Track,
        sources: SourceSet,
        attempts: usize,
    ) -> Resolution {
        info!(
            episode_id,
            server = %server,
            track = %track,
            sources = sources.len(),
            attempts,
            "Sources resolved"
        );
        Resolution::Resolved(ResolvedSources {
            server,
            track,
            sources,
            attempts,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::StreamSource;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Provider returning canned results per server/track and recording calls
    #[derive(Default)]
    pub(crate) struct MockProvider {
        responses: HashMap<(String, String, Track), Option<SourceSet>>,
        pub calls: Mutex<Vec<(String, Server, Track)>>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(
            mut self,
            episode_id: &str,
            server: Server,
            track: Track,
            urls: &[(&str, &str)],
        ) -> Self {
            let sources = urls
                .iter()
                .map(|(url, quality)| StreamSource::new(*url).with_quality(*quality))
                .collect();
            self.responses.insert(
                (episode_id.to_string(), server.label().to_string(), track),
                Some(SourceSet::new(sources)),
            );
            self
        }

        pub fn respond_empty(mut self, episode_id: &str, server: Server, track: Track) -> Self {
            self.responses.insert(
                (episode_id.to_string(), server.label().to_string(), track),
                Some(SourceSet::default()),
            );
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<(String, Server, Track)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SourceProvider for MockProvider {
        async fn fetch_sources(
            &self,
            episode_id: &str,
            server: &Server,
            track: Track,
        ) -> Option<SourceSet> {
            self.calls
                .lock()
                .unwrap()
                .push((episode_id.to_string(), server.clone(), track));
            self.responses
                .get(&(episode_id.to_string(), server.label().to_string(), track))
                .cloned()
                .flatten()
        }
    }

    fn resolver(provider: &Arc<MockProvider>) -> SourceResolver {
        SourceResolver::new(provider.clone())
    }

    #[tokio::test]
    async fn test_primary_hit_makes_one_call() {
        let provider = Arc::new(MockProvider::new().respond(
            "ep-1",
            Server::Hd1,
            Track::Sub,
            &[("a.m3u8", "auto")],
        ));

        let outcome = resolver(&provider).resolve_default("ep-1").await;

        assert_eq!(provider.call_count(), 1);
        match outcome {
            Resolution::Resolved(r) => {
                assert_eq!(r.server, Server::Hd1);
                assert_eq!(r.track, Track::Sub);
                assert_eq!(r.attempts, 1);
            }
            other => panic!("expected resolved, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_falls_through_to_megacloud() {
        let provider = Arc::new(
            MockProvider::new()
                .respond_empty("ep-1", Server::Hd1, Track::Sub)
                .respond("ep-1", Server::Megacloud, Track::Sub, &[("mc.m3u8", "auto")]),
        );

        let outcome = resolver(&provider).resolve_default("ep-1").await;

        assert_eq!(provider.call_count(), 3);
        let servers: Vec<Server> = provider.calls().into_iter().map(|(_, s, _)| s).collect();
        assert_eq!(servers, vec![Server::Hd1, Server::Hd2, Server::Megacloud]);
        match outcome {
            Resolution::Resolved(r) => {
                assert_eq!(r.server, Server::Megacloud);
                assert_eq!(r.track, Track::Sub);
            }
            other => panic!("expected resolved, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dub_retry_on_last_server() {
        let provider = Arc::new(MockProvider::new().respond(
            "ep-1",
            Server::Megacloud,
            Track::Dub,
            &[("dub.m3u8", "auto")],
        ));

        let outcome = resolver(&provider).resolve_default("ep-1").await;

        assert_eq!(provider.call_count(), 4);
        assert_eq!(
            provider.calls().last().cloned(),
            Some(("ep-1".to_string(), Server::Megacloud, Track::Dub))
        );
        match outcome {
            Resolution::Resolved(r) => {
                assert_eq!(r.server, Server::Megacloud);
                assert_eq!(r.track, Track::Dub);
                assert_eq!(r.attempts, 4);
            }
            other => panic!("expected resolved, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_unavailable() {
        let provider = Arc::new(MockProvider::new());

        let outcome = resolver(&provider).resolve_default("ep-404").await;

        assert_eq!(outcome, Resolution::Unavailable { attempts: 4 });
        assert_eq!(provider.call_count(), 4);
        assert!(matches!(
            outcome.into_result("ep-404"),
            Err(Error::SourcesUnavailable { episode_id }) if episode_id == "ep-404"
        ));
    }

    #[tokio::test]
    async fn test_dub_start_has_no_extra_attempt() {
        let provider = Arc::new(MockProvider::new());

        let outcome = resolver(&provider)
            .resolve("ep-1", Server::Hd1, Track::Dub)
            .await;

        assert_eq!(outcome, Resolution::Unavailable { attempts: 3 });
        assert!(provider.calls().iter().all(|(_, _, t)| *t == Track::Dub));
    }

    #[tokio::test]
    async fn test_non_default_start_skips_itself() {
        let provider = Arc::new(MockProvider::new().respond(
            "ep-1",
            Server::Hd1,
            Track::Sub,
            &[("one.m3u8", "auto")],
        ));

        let outcome = resolver(&provider)
            .resolve("ep-1", Server::Hd2, Track::Sub)
            .await;

        let servers: Vec<Server> = provider.calls().into_iter().map(|(_, s, _)| s).collect();
        assert_eq!(servers, vec![Server::Hd2, Server::Hd1]);
        assert!(outcome.is_resolved());
        assert_eq!(outcome.attempts(), 2);
    }

    #[tokio::test]
    async fn test_resolve_exact_single_call() {
        let provider = Arc::new(MockProvider::new());

        let outcome = resolver(&provider)
            .resolve_exact("ep-1", Server::Hd2, Track::Dub)
            .await;

        assert_eq!(outcome, Resolution::Unavailable { attempts: 1 });
        assert_eq!(
            provider.calls(),
            vec![("ep-1".to_string(), Server::Hd2, Track::Dub)]
        );
    }
}
