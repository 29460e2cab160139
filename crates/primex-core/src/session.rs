//! Playback Controller - owns one playback session
//!
//! Coordinates:
//! - Episode loading through the source resolver
//! - Engine lifecycle (one live instance at a time)
//! - Quality and server/track switching
//! - In-place recovery from engine errors
//! - Snapshot publishing for the rendering layer
//!
//! Loads are split in two halves so the resolution can run off the session
//! owner: [`PlaybackController::begin_load`] hands out a [`LoadTicket`], and
//! [`PlaybackController::apply_resolution`] only accepts the result if the
//! ticket is still current.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::api::Episode;
use crate::config::PlayerConfig;
use crate::engine::{
    EngineConfig, EngineErrorKind, EngineEvent, EngineEventKind, EngineFactory, EngineId,
    PlaybackEngine, SourceRequest,
};
use crate::resolver::{Resolution, SourceResolver};
use crate::{
    EpisodeRef, Error, PlaybackPhase, Result, Server, SessionId, SourceSet, StreamSource,
    SubtitleTrack, TimeRange, Track,
};

pub const NO_SOURCES_MESSAGE: &str =
    "No streaming sources found. This episode may not be available yet.";
pub const PLAYBACK_ERROR_MESSAGE: &str = "Video playback error. Try another server.";
pub const INVALID_SOURCE_MESSAGE: &str = "Invalid video source URL";
pub const UNSUPPORTED_MESSAGE: &str = "HLS playback is not supported on this device";
pub const AUTOPLAY_NOTICE: &str = "Click the video to start playing";

/// How a ticket is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Full server/track fallback chain
    Fallback,
    /// One attempt for an explicit server/track choice
    Exact,
}

/// Identifies one load request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub episode_id: String,
    pub server: Server,
    pub track: Track,
    pub mode: ResolveMode,
}

impl LoadTicket {
    /// Run the resolution this ticket asks for
    pub async fn resolve(&self, resolver: &SourceResolver) -> Resolution {
        match self.mode {
            ResolveMode::Fallback => {
                resolver
                    .resolve(&self.episode_id, self.server.clone(), self.track)
                    .await
            }
            ResolveMode::Exact => {
                resolver
                    .resolve_exact(&self.episode_id, self.server.clone(), self.track)
                    .await
            }
        }
    }
}

/// Read-only view of the session for the rendering layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub phase: PlaybackPhase,
    pub episode_id: Option<String>,
    pub active_server: Option<Server>,
    pub active_track: Option<Track>,
    pub sources: Vec<StreamSource>,
    /// Index into `sources` of the stream handed to the engine
    pub current_source: Option<usize>,
    pub subtitles: Vec<SubtitleTrack>,
    pub intro: Option<TimeRange>,
    pub outro: Option<TimeRange>,
    pub error_message: Option<String>,
    /// Non-fatal hint, e.g. autoplay was blocked
    pub notice: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    fn idle(session_id: SessionId) -> Self {
        Self {
            session_id,
            phase: PlaybackPhase::Idle,
            episode_id: None,
            active_server: None,
            active_track: None,
            sources: Vec::new(),
            current_source: None,
            subtitles: Vec::new(),
            intro: None,
            outro: None,
            error_message: None,
            notice: None,
            updated_at: Utc::now(),
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_source
            .and_then(|i| self.sources.get(i))
            .map(|s| s.url.as_str())
    }

    pub fn current_episode(&self) -> Option<EpisodeRef> {
        let episode_id = self.episode_id.clone()?;
        let track = self.active_track?;
        Some(EpisodeRef::new(episode_id, track))
    }

    /// Playing or Failed; nothing further happens without input
    pub fn is_settled(&self) -> bool {
        matches!(self.phase, PlaybackPhase::Playing | PlaybackPhase::Failed)
    }
}

/// Session state machine over a single playback
pub struct PlaybackController {
    /// Unique session ID
    id: SessionId,
    config: PlayerConfig,
    engine_config: EngineConfig,
    factory: Box<dyn EngineFactory>,
    /// The live engine instance, if any
    engine: Option<Box<dyn PlaybackEngine>>,
    next_engine_id: u64,
    phase: PlaybackPhase,
    /// Bumped by every load and by `stop`
    generation: u64,
    episode_id: Option<String>,
    active_server: Option<Server>,
    active_track: Option<Track>,
    sources: Option<SourceSet>,
    current_source: Option<usize>,
    error_message: Option<String>,
    notice: Option<String>,
    episodes: Vec<Episode>,
    /// Recoveries since the last manifest parse or resume
    consecutive_recoveries: u32,
    state_tx: watch::Sender<SessionSnapshot>,
}

impl PlaybackController {
    pub fn new(config: PlayerConfig, factory: Box<dyn EngineFactory>) -> Self {
        let id = SessionId::new();
        let (state_tx, _) = watch::channel(SessionSnapshot::idle(id));

        Self {
            id,
            engine_config: EngineConfig::from(&config),
            config,
            factory,
            engine: None,
            next_engine_id: 1,
            phase: PlaybackPhase::Idle,
            generation: 0,
            episode_id: None,
            active_server: None,
            active_track: None,
            sources: None,
            current_source: None,
            error_message: None,
            notice: None,
            episodes: Vec::new(),
            consecutive_recoveries: 0,
            state_tx,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Subscribe to session snapshots
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let sources = self.sources.as_ref();
        SessionSnapshot {
            session_id: self.id,
            phase: self.phase,
            episode_id: self.episode_id.clone(),
            active_server: self.active_server.clone(),
            active_track: self.active_track,
            sources: sources.map(|s| s.sources.clone()).unwrap_or_default(),
            current_source: self.current_source,
            subtitles: sources.map(|s| s.subtitles.clone()).unwrap_or_default(),
            intro: sources.and_then(|s| s.intro),
            outro: sources.and_then(|s| s.outro),
            error_message: self.error_message.clone(),
            notice: self.notice.clone(),
            updated_at: Utc::now(),
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.snapshot());
    }

    /// Transition to a new phase
    fn set_phase(&mut self, new_phase: PlaybackPhase) -> Result<()> {
        let current = self.phase;

        if !current.can_transition_to(new_phase) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: new_phase.to_string(),
            });
        }

        self.phase = new_phase;
        info!(session_id = %self.id, from = %current, to = %new_phase, "State transition");
        Ok(())
    }

    fn active_engine_id(&self) -> Option<EngineId> {
        self.engine.as_ref().map(|e| e.id())
    }

    fn teardown_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            debug!(engine = %engine.id(), "Destroying engine");
            engine.destroy();
        }
    }

    /// Reset per-episode state and enter Loading
    fn reset_for_load(&mut self, episode_id: &str) -> Result<()> {
        self.teardown_engine();
        self.generation += 1;
        self.episode_id = Some(episode_id.to_string());
        self.active_server = None;
        self.active_track = None;
        self.sources = None;
        self.current_source = None;
        self.error_message = None;
        self.notice = None;
        self.consecutive_recoveries = 0;
        self.set_phase(PlaybackPhase::Loading)
    }

    /// Start loading an episode with the configured default server/track
    #[instrument(skip(self))]
    pub fn begin_load(&mut self, episode_id: &str) -> Result<LoadTicket> {
        self.reset_for_load(episode_id)?;
        self.publish();

        Ok(LoadTicket {
            generation: self.generation,
            episode_id: episode_id.to_string(),
            server: self.config.default_server.clone(),
            track: self.config.default_track,
            mode: ResolveMode::Fallback,
        })
    }

    /// Start loading an explicit server/track combination
    #[instrument(skip(self, server, track), fields(server = %server, track = %track))]
    pub fn begin_change_server(
        &mut self,
        episode_id: &str,
        server: Server,
        track: Track,
    ) -> Result<LoadTicket> {
        self.reset_for_load(episode_id)?;
        self.publish();

        Ok(LoadTicket {
            generation: self.generation,
            episode_id: episode_id.to_string(),
            server,
            track,
            mode: ResolveMode::Exact,
        })
    }

    fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.generation == self.generation
            && self.episode_id.as_deref() == Some(ticket.episode_id.as_str())
    }

    /// Apply a resolution result; returns false if the ticket is stale
    pub fn apply_resolution(&mut self, ticket: &LoadTicket, resolution: Resolution) -> Result<bool> {
        if !self.is_current(ticket) {
            debug!(
                episode_id = %ticket.episode_id,
                generation = ticket.generation,
                current = self.generation,
                "Discarding stale resolution"
            );
            return Ok(false);
        }

        match resolution {
            Resolution::Resolved(resolved) => {
                info!(
                    episode_id = %ticket.episode_id,
                    server = %resolved.server,
                    track = %resolved.track,
                    qualities = ?resolved.sources.quality_labels(),
                    "Using sources"
                );
                self.active_server = Some(resolved.server);
                self.active_track = Some(resolved.track);
                self.sources = Some(resolved.sources);
                self.current_source = Some(0);
                self.load_current_source()?;
            }
            Resolution::Unavailable { attempts } => {
                debug!(attempts, "Resolution exhausted");
                let message = match ticket.mode {
                    ResolveMode::Fallback => NO_SOURCES_MESSAGE.to_string(),
                    ResolveMode::Exact => format!(
                        "No sources available on {} ({}). Try another server.",
                        ticket.server, ticket.track
                    ),
                };
                self.fail(message)?;
            }
        }

        Ok(true)
    }

    /// Switch to another entry of the current source set without resolving again
    #[instrument(skip(self))]
    pub fn select_quality(&mut self, index: usize) -> Result<()> {
        let available = self.sources.as_ref().map_or(0, |s| s.len());
        if index >= available {
            return Err(Error::QualityOutOfRange { index, available });
        }

        self.teardown_engine();
        self.current_source = Some(index);
        self.error_message = None;
        self.notice = None;
        self.consecutive_recoveries = 0;
        self.set_phase(PlaybackPhase::Loading)?;
        self.load_current_source()
    }

    /// Hand the current source to a fresh engine instance
    fn load_current_source(&mut self) -> Result<()> {
        self.teardown_engine();

        let Some(sources) = self.sources.as_ref() else {
            return self.fail(NO_SOURCES_MESSAGE.to_string());
        };
        let Some(source) = self.current_source.and_then(|i| sources.get(i)) else {
            return self.fail(NO_SOURCES_MESSAGE.to_string());
        };

        if let Err(e) = validate_source_url(&source.url) {
            warn!(error = %e, "Rejecting source");
            return self.fail(INVALID_SOURCE_MESSAGE.to_string());
        }

        let request = SourceRequest {
            url: source.url.clone(),
            headers: sources.headers.clone(),
        };

        let id = EngineId(self.next_engine_id);
        self.next_engine_id += 1;

        let mut engine = match self.factory.create(id, &self.engine_config) {
            Ok(engine) => engine,
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Cannot create engine");
                return self.fail(UNSUPPORTED_MESSAGE.to_string());
            }
        };

        info!(engine = %id, url = %request.url, "Loading source");
        engine.load_source(request);
        self.engine = Some(engine);
        self.publish();
        Ok(())
    }

    /// Dispatch an engine event through the transition table
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> Result<()> {
        if self.active_engine_id() != Some(event.engine) {
            debug!(engine = %event.engine, "Ignoring event from inactive engine");
            return Ok(());
        }

        match event.kind {
            EngineEventKind::ManifestParsed { variants, duration } => {
                if !matches!(self.phase, PlaybackPhase::Loading | PlaybackPhase::Recovering) {
                    return Ok(());
                }
                debug!(variants, ?duration, "Manifest parsed");
                self.start_playback()?;
            }
            EngineEventKind::Resumed => {
                if self.phase == PlaybackPhase::Recovering {
                    self.consecutive_recoveries = 0;
                    self.set_phase(PlaybackPhase::Playing)?;
                    self.publish();
                }
            }
            EngineEventKind::Error { kind, fatal: false, details } => {
                warn!(kind = %kind, details = %details, "Non-fatal engine error");
            }
            EngineEventKind::Error { kind, fatal: true, details } => {
                warn!(kind = %kind, details = %details, "Fatal engine error");
                self.recover(kind)?;
            }
        }

        Ok(())
    }

    fn start_playback(&mut self) -> Result<()> {
        self.consecutive_recoveries = 0;
        self.set_phase(PlaybackPhase::Playing)?;

        if let Some(engine) = self.engine.as_mut() {
            if let Err(blocked) = engine.play() {
                info!(reason = %blocked, "Autoplay blocked");
                self.notice = Some(AUTOPLAY_NOTICE.to_string());
            }
        }

        self.publish();
        Ok(())
    }

    /// One recovery action per fatal error event
    fn recover(&mut self, kind: EngineErrorKind) -> Result<()> {
        if !matches!(
            self.phase,
            PlaybackPhase::Loading | PlaybackPhase::Playing | PlaybackPhase::Recovering
        ) {
            return Ok(());
        }

        if kind == EngineErrorKind::Other {
            return self.fail(PLAYBACK_ERROR_MESSAGE.to_string());
        }

        self.consecutive_recoveries += 1;
        if self.consecutive_recoveries > self.config.max_consecutive_recoveries {
            warn!(
                recoveries = self.consecutive_recoveries - 1,
                "Recovery limit reached"
            );
            return self.fail(PLAYBACK_ERROR_MESSAGE.to_string());
        }

        if let Some(engine) = self.engine.as_mut() {
            match kind {
                EngineErrorKind::Network => {
                    info!(engine = %engine.id(), "Network error, reloading source");
                    engine.start_load();
                }
                EngineErrorKind::Media => {
                    info!(engine = %engine.id(), "Media error, recovering");
                    engine.recover_media_error();
                }
                EngineErrorKind::Other => {}
            }
        }

        if self.phase == PlaybackPhase::Playing {
            self.set_phase(PlaybackPhase::Recovering)?;
        }
        self.publish();
        Ok(())
    }

    /// Move to Failed with a user-visible message
    fn fail(&mut self, message: String) -> Result<()> {
        self.teardown_engine();
        warn!(session_id = %self.id, message = %message, "Playback failed");
        self.set_phase(PlaybackPhase::Failed)?;
        self.error_message = Some(message);
        self.publish();
        Ok(())
    }

    /// Navigate away; pending resolutions become stale
    pub fn stop(&mut self) -> Result<()> {
        self.teardown_engine();
        self.generation += 1;
        self.episode_id = None;
        self.active_server = None;
        self.active_track = None;
        self.sources = None;
        self.current_source = None;
        self.error_message = None;
        self.notice = None;
        self.consecutive_recoveries = 0;
        self.set_phase(PlaybackPhase::Idle)?;
        self.publish();
        Ok(())
    }

    /// Replace the episode list used for navigation
    pub fn set_episodes(&mut self, episodes: Vec<Episode>) {
        debug!(count = episodes.len(), "Episode list updated");
        self.episodes = episodes;
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    fn current_episode_index(&self) -> Option<usize> {
        let current = self.episode_id.as_deref()?;
        self.episodes.iter().position(|e| e.id == current)
    }

    /// Begin loading the following episode; `None` at the end of the list
    pub fn begin_next_episode(&mut self) -> Result<Option<LoadTicket>> {
        let next = self
            .current_episode_index()
            .and_then(|i| self.episodes.get(i + 1))
            .map(|e| e.id.clone());
        next.map(|id| self.begin_load(&id)).transpose()
    }

    /// Begin loading the preceding episode; `None` at the start of the list
    pub fn begin_prev_episode(&mut self) -> Result<Option<LoadTicket>> {
        let prev = self
            .current_episode_index()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.episodes.get(i))
            .map(|e| e.id.clone());
        prev.map(|id| self.begin_load(&id)).transpose()
    }

    /// Load an episode, resolving inline
    pub async fn load_episode(&mut self, resolver: &SourceResolver, episode_id: &str) -> Result<()> {
        let ticket = self.begin_load(episode_id)?;
        self.finish(resolver, ticket).await
    }

    /// Switch to an explicit server/track, resolving inline
    pub async fn change_server(
        &mut self,
        resolver: &SourceResolver,
        episode_id: &str,
        server: Server,
        track: Track,
    ) -> Result<()> {
        let ticket = self.begin_change_server(episode_id, server, track)?;
        self.finish(resolver, ticket).await
    }

    pub async fn next_episode(&mut self, resolver: &SourceResolver) -> Result<bool> {
        match self.begin_next_episode()? {
            Some(ticket) => self.finish(resolver, ticket).await.map(|_| true),
            None => Ok(false),
        }
    }

    pub async fn prev_episode(&mut self, resolver: &SourceResolver) -> Result<bool> {
        match self.begin_prev_episode()? {
            Some(ticket) => self.finish(resolver, ticket).await.map(|_| true),
            None => Ok(false),
        }
    }

    async fn finish(&mut self, resolver: &SourceResolver, ticket: LoadTicket) -> Result<()> {
        let resolution = ticket.resolve(resolver).await;
        self.apply_resolution(&ticket, resolution)?;
        Ok(())
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.teardown_engine();
    }
}

/// Empty or malformed URLs are rejected; relative manifest paths pass
fn validate_source_url(raw: &str) -> Result<()> {
    if raw.trim().is_empty() {
        return Err(Error::InvalidSourceUrl(raw.to_string()));
    }
    match Url::parse(raw) {
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => Ok(()),
        Err(e) => Err(Error::InvalidSourceUrl(format!("{}: {}", raw, e))),
    }
}
