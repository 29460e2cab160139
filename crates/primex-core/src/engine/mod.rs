//! Playback engine abstraction
//!
//! The controller never decodes video. It hands a manifest URL to an HLS
//! engine and reacts to the events that engine emits. Engines report back
//! through an unbounded channel; every event carries the id of the engine
//! instance that raised it so events from a destroyed instance can be
//! dropped.

#[cfg(feature = "hls")]
mod hls;

#[cfg(feature = "hls")]
pub use hls::{HlsProbeEngine, HlsProbeFactory};

use crate::config::PlayerConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;

/// Identifier of one engine instance within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EngineId(pub u64);

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "engine-{}", self.0)
    }
}

/// Error classes reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    /// Manifest or segment transport failure
    Network,
    /// Decode or media pipeline failure
    Media,
    /// Anything else; no recovery action exists
    Other,
}

impl std::fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineErrorKind::Network => write!(f, "network"),
            EngineErrorKind::Media => write!(f, "media"),
            EngineErrorKind::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEventKind {
    /// Manifest (or loaded metadata) parsed; playback may start
    ManifestParsed { variants: usize, duration: Option<f64> },
    /// Media is flowing again after a recovery action
    Resumed,
    Error {
        kind: EngineErrorKind,
        fatal: bool,
        details: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub engine: EngineId,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    pub fn new(engine: EngineId, kind: EngineEventKind) -> Self {
        Self { engine, kind }
    }

    pub fn fatal(engine: EngineId, kind: EngineErrorKind, details: impl Into<String>) -> Self {
        Self::new(
            engine,
            EngineEventKind::Error {
                kind,
                fatal: true,
                details: details.into(),
            },
        )
    }
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Channel engines use to report events to the session
pub fn engine_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

/// The stream handed to an engine
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRequest {
    /// Manifest URL as delivered by the API; may be relative
    pub url: String,
    /// Extra request headers, e.g. `Referer`
    pub headers: HashMap<String, String>,
}

/// Tuning passed to each new engine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_buffer_length: f64,
    pub max_max_buffer_length: f64,
    pub low_latency_mode: bool,
    pub enable_worker: bool,
}

impl From<&PlayerConfig> for EngineConfig {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            max_buffer_length: config.max_buffer_length,
            max_max_buffer_length: config.max_max_buffer_length,
            low_latency_mode: config.low_latency_mode,
            enable_worker: config.enable_worker,
        }
    }
}

/// The runtime refused to start playback without a user gesture
#[derive(Debug, Clone, Error)]
#[error("autoplay blocked: {0}")]
pub struct AutoplayBlocked(pub String);

/// An HLS playback engine instance
pub trait PlaybackEngine: Send {
    fn id(&self) -> EngineId;

    /// Load a manifest and attach media
    fn load_source(&mut self, request: SourceRequest);

    /// Restart loading the current source (network recovery)
    fn start_load(&mut self);

    /// Reset the media pipeline for the current source (decode recovery)
    fn recover_media_error(&mut self);

    /// Begin playback once the manifest is parsed
    fn play(&mut self) -> std::result::Result<(), AutoplayBlocked>;

    /// Release all resources; no events may follow
    fn destroy(&mut self);
}

/// Creates engine instances for a session
pub trait EngineFactory: Send {
    /// Fails when the environment cannot play HLS at all
    fn create(&mut self, id: EngineId, config: &EngineConfig) -> Result<Box<dyn PlaybackEngine>>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Actions a mock engine was asked to perform
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum EngineCall {
        Create(EngineId),
        Load(EngineId, String),
        StartLoad(EngineId),
        RecoverMediaError(EngineId),
        Play(EngineId),
        Destroy(EngineId),
    }

    pub(crate) type CallLog = Arc<Mutex<Vec<EngineCall>>>;

    pub(crate) struct MockEngine {
        id: EngineId,
        log: CallLog,
        block_autoplay: bool,
    }

    impl PlaybackEngine for MockEngine {
        fn id(&self) -> EngineId {
            self.id
        }

        fn load_source(&mut self, request: SourceRequest) {
            self.log
                .lock()
                .unwrap()
                .push(EngineCall::Load(self.id, request.url));
        }

        fn start_load(&mut self) {
            self.log.lock().unwrap().push(EngineCall::StartLoad(self.id));
        }

        fn recover_media_error(&mut self) {
            self.log
                .lock()
                .unwrap()
                .push(EngineCall::RecoverMediaError(self.id));
        }

        fn play(&mut self) -> std::result::Result<(), AutoplayBlocked> {
            self.log.lock().unwrap().push(EngineCall::Play(self.id));
            if self.block_autoplay {
                Err(AutoplayBlocked("NotAllowedError".to_string()))
            } else {
                Ok(())
            }
        }

        fn destroy(&mut self) {
            self.log.lock().unwrap().push(EngineCall::Destroy(self.id));
        }
    }

    /// Factory recording every engine call into a shared log
    #[derive(Default)]
    pub(crate) struct MockFactory {
        pub log: CallLog,
        pub block_autoplay: bool,
        pub unsupported: bool,
    }

    impl MockFactory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(log: &CallLog) -> Vec<EngineCall> {
            log.lock().unwrap().clone()
        }
    }

    impl EngineFactory for MockFactory {
        fn create(
            &mut self,
            id: EngineId,
            _config: &EngineConfig,
        ) -> Result<Box<dyn PlaybackEngine>> {
            if self.unsupported {
                return Err(crate::Error::EngineUnsupported("no MSE".to_string()));
            }
            self.log.lock().unwrap().push(EngineCall::Create(id));
            Ok(Box::new(MockEngine {
                id,
                log: self.log.clone(),
                block_autoplay: self.block_autoplay,
            }))
        }
    }

    #[test]
    fn test_engine_config_from_player_config() {
        let config = EngineConfig::from(&PlayerConfig::default());
        assert_eq!(config.max_buffer_length, 30.0);
        assert_eq!(config.max_max_buffer_length, 60.0);
        assert!(config.low_latency_mode);
        assert!(config.enable_worker);
    }

    #[test]
    fn test_fatal_event_builder() {
        let event = EngineEvent::fatal(EngineId(7), EngineErrorKind::Media, "bufferAppendError");
        assert_eq!(event.engine, EngineId(7));
        assert!(matches!(
            event.kind,
            EngineEventKind::Error { kind: EngineErrorKind::Media, fatal: true, .. }
        ));
    }
}
