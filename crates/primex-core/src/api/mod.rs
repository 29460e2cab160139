//! Catalog API access
//!
//! - [`AniwatchClient`]: typed client for the Aniwatch (hianime v2) API
//! - [`SourceProvider`]: the single-call source lookup the resolver depends on

mod catalog;
mod client;
pub mod models;

pub use catalog::{
    AnimeInfo, AnimePage, AnimeSummary, Episode, EpisodeServers, HomePage, SearchFilters,
    SearchSuggestion, Spotlight,
};
pub use client::AniwatchClient;

use crate::{Server, SourceSet, Track};
use async_trait::async_trait;
use std::sync::Arc;

/// One attempt at fetching streaming sources
///
/// Implementations never fail loudly: transport errors, timeouts, non-2xx
/// statuses and `success: false` envelopes all come back as `None`. No
/// retries happen at this layer.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_sources(
        &self,
        episode_id: &str,
        server: &Server,
        track: Track,
    ) -> Option<SourceSet>;
}

#[async_trait]
impl<P: SourceProvider + ?Sized> SourceProvider for Arc<P> {
    async fn fetch_sources(
        &self,
        episode_id: &str,
        server: &Server,
        track: Track,
    ) -> Option<SourceSet> {
        (**self).fetch_sources(episode_id, server, track).await
    }
}
