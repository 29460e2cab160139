//! PrimeX Core - streaming library for PrimeXStream
//!
//! This crate provides everything below the view layer:
//! - Catalog API client (home, search, anime info, episodes, servers)
//! - Source resolution across servers and audio tracks
//! - Playback session state machine with in-place engine recovery
//! - A session driver task that serialises commands and engine events
//! - A headless HLS engine that probes manifests (feature `hls`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         PrimeX Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  AppConfig   │─▶│  Aniwatch    │◀─│   Source     │           │
//! │  │ (URL builder)│  │   Client     │  │  Resolver    │           │
//! │  └──────────────┘  └──────────────┘  └──────┬───────┘           │
//! │                                             │ Resolution        │
//! │                    ┌──────────────┐  ┌──────┴───────┐           │
//! │   commands ───────▶│   Session    │─▶│  Playback    │──▶ watch  │
//! │                    │   Driver     │  │  Controller  │  snapshots│
//! │                    └──────▲───────┘  └──────┬───────┘           │
//! │                           │ EngineEvent     │ load/recover      │
//! │                    ┌──────┴─────────────────▼───────┐           │
//! │                    │        Playback Engine         │           │
//! │                    └────────────────────────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod session;
pub mod types;

pub use api::{AniwatchClient, SourceProvider};
pub use config::{ApiConfig, AppConfig, EndpointMode, PlayerConfig, UrlBuilder};
pub use driver::SessionHandle;
pub use engine::{EngineErrorKind, EngineEvent, EngineEventKind, EngineFactory, PlaybackEngine};
#[cfg(feature = "hls")]
pub use engine::{HlsProbeEngine, HlsProbeFactory};
pub use error::{Error, Result};
pub use resolver::{Resolution, ResolvedSources, SourceResolver};
pub use session::{LoadTicket, PlaybackController, SessionSnapshot};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library (call once at startup)
pub fn init() {
    tracing::info!(version = VERSION, "PrimeX Core initialized");
}
