//! Core types for PrimeX streaming

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upstream mirror serving episode streams
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Server {
    Hd1,
    Hd2,
    Megacloud,
    /// Any label the catalog reports that we do not know by name
    Other(String),
}

impl Server {
    /// Wire label used by the sources endpoint
    pub fn label(&self) -> &str {
        match self {
            Server::Hd1 => "hd-1",
            Server::Hd2 => "hd-2",
            Server::Megacloud => "megacloud",
            Server::Other(label) => label,
        }
    }

    /// Fixed fallback order, cheapest first
    pub fn default_priority() -> Vec<Server> {
        vec![Server::Hd1, Server::Hd2, Server::Megacloud]
    }
}

impl From<String> for Server {
    fn from(label: String) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "hd-1" => Server::Hd1,
            "hd-2" => Server::Hd2,
            "megacloud" => Server::Megacloud,
            _ => Server::Other(label),
        }
    }
}

impl From<Server> for String {
    fn from(server: Server) -> Self {
        server.label().to_string()
    }
}

impl FromStr for Server {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Server::from(s.to_string()))
    }
}

impl std::fmt::Display for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Audio-language variant of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Sub,
    Dub,
    Raw,
}

impl Track {
    /// Wire label used as the `category` query parameter
    pub fn label(&self) -> &'static str {
        match self {
            Track::Sub => "sub",
            Track::Dub => "dub",
            Track::Raw => "raw",
        }
    }

    /// The sub/dub toggle target
    pub fn toggled(&self) -> Track {
        match self {
            Track::Sub => Track::Dub,
            Track::Dub | Track::Raw => Track::Sub,
        }
    }
}

impl FromStr for Track {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sub" => Ok(Track::Sub),
            "dub" => Ok(Track::Dub),
            "raw" => Ok(Track::Raw),
            other => Err(Error::InvalidConfig(format!("unknown track: {}", other))),
        }
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Episode identifier plus requested audio track, owned by the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub episode_id: String,
    pub track: Track,
}

impl EpisodeRef {
    pub fn new(episode_id: impl Into<String>, track: Track) -> Self {
        Self {
            episode_id: episode_id.into(),
            track,
        }
    }
}

/// One playable stream entry of a source set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSource {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
    #[serde(default, rename = "isM3U8")]
    pub is_m3u8: Option<bool>,
}

impl StreamSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: None,
            media_type: None,
            is_m3u8: None,
        }
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    /// Label shown on quality buttons
    pub fn quality_label(&self) -> &str {
        self.quality.as_deref().unwrap_or("Auto")
    }
}

/// Subtitle track attached to a source set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    #[serde(default, alias = "file")]
    pub url: String,
    #[serde(default, alias = "label")]
    pub lang: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub default: bool,
}

impl SubtitleTrack {
    /// Thumbnail sprite tracks share the list with real subtitles
    pub fn is_caption(&self) -> bool {
        !matches!(self.kind.as_deref(), Some("thumbnails"))
    }
}

/// Intro/outro marker in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// The API reports `{0, 0}` when no marker exists
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Result of one resolution attempt for an episode/server/track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSet {
    pub sources: Vec<StreamSource>,
    pub subtitles: Vec<SubtitleTrack>,
    pub intro: Option<TimeRange>,
    pub outro: Option<TimeRange>,
    /// Headers the HLS engine must send (typically `Referer`)
    pub headers: HashMap<String, String>,
}

impl SourceSet {
    pub fn new(sources: Vec<StreamSource>) -> Self {
        Self {
            sources,
            ..Default::default()
        }
    }

    /// An empty set is a valid "no playable source" result
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn get(&self, index: usize) -> Option<&StreamSource> {
        self.sources.get(index)
    }

    pub fn quality_labels(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.quality_label()).collect()
    }
}

/// Playback session phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    /// No episode selected
    Idle,
    /// Resolving sources or waiting for the manifest
    Loading,
    /// Manifest parsed, playback started
    Playing,
    /// Engine recovery in progress
    Recovering,
    /// Waiting for an explicit user action
    Failed,
}

impl PlaybackPhase {
    /// Check if transition to target phase is valid
    pub fn can_transition_to(&self, target: PlaybackPhase) -> bool {
        use PlaybackPhase::*;
        matches!(
            (self, target),
            // Navigation away always returns to Idle
            (_, Idle) |
            // From Idle
            (Idle, Loading) |
            // From Loading
            (Loading, Loading) | (Loading, Playing) | (Loading, Failed) |
            // From Playing
            (Playing, Loading) | (Playing, Recovering) | (Playing, Failed) |
            // From Recovering
            (Recovering, Playing) | (Recovering, Loading) | (Recovering, Failed) |
            // From Failed
            (Failed, Loading)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackPhase::Failed)
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "idle"),
            PlaybackPhase::Loading => write!(f, "loading"),
            PlaybackPhase::Playing => write!(f, "playing"),
            PlaybackPhase::Recovering => write!(f, "recovering"),
            PlaybackPhase::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_labels_round_trip() {
        assert_eq!(Server::from("hd-2".to_string()), Server::Hd2);
        assert_eq!(Server::from("MegaCloud".to_string()), Server::Megacloud);
        assert_eq!(
            Server::from("streamsb".to_string()),
            Server::Other("streamsb".to_string())
        );
        assert_eq!(Server::Hd1.to_string(), "hd-1");
    }

    #[test]
    fn test_track_toggle() {
        assert_eq!(Track::Sub.toggled(), Track::Dub);
        assert_eq!(Track::Dub.toggled(), Track::Sub);
        assert!("french".parse::<Track>().is_err());
        assert_eq!("DUB".parse::<Track>().unwrap(), Track::Dub);
    }

    #[test]
    fn test_stream_source_deserialize() {
        let json = r#"{"url":"https://cdn/x.m3u8","isM3U8":true,"type":"hls"}"#;
        let source: StreamSource = serde_json::from_str(json).unwrap();
        assert_eq!(source.quality_label(), "Auto");
        assert_eq!(source.media_type.as_deref(), Some("hls"));
        assert_eq!(source.is_m3u8, Some(true));
    }

    #[test]
    fn test_subtitle_aliases() {
        let json = r#"{"file":"https://cdn/en.vtt","label":"English","kind":"captions","default":true}"#;
        let track: SubtitleTrack = serde_json::from_str(json).unwrap();
        assert_eq!(track.url, "https://cdn/en.vtt");
        assert_eq!(track.lang.as_deref(), Some("English"));
        assert!(track.is_caption());
    }

    #[test]
    fn test_time_range_empty() {
        assert!(TimeRange { start: 0.0, end: 0.0 }.is_empty());
        let intro = TimeRange { start: 31.0, end: 120.0 };
        assert!(!intro.is_empty());
        assert!(TimeRange { start: 120.0, end: 31.0 }.is_empty());
    }

    #[test]
    fn test_phase_transitions() {
        use PlaybackPhase::*;
        assert!(Idle.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Playing));
        assert!(Playing.can_transition_to(Recovering));
        assert!(Recovering.can_transition_to(Playing));
        assert!(Failed.can_transition_to(Loading));
        assert!(Failed.can_transition_to(Idle));

        assert!(!Idle.can_transition_to(Playing));
        assert!(!Failed.can_transition_to(Playing));
        assert!(!Loading.can_transition_to(Recovering));
    }
}
