//! Headless HLS engine
//!
//! Probes a stream instead of rendering it: loading a source fetches the
//! manifest with the source headers and parses it with `m3u8-rs`.
//!
//! - parsed master/media playlist -> `ManifestParsed`
//! - transport failure or HTTP error -> fatal `Network` error
//! - unparsable playlist -> fatal `Media` error
//! - non-HTTP scheme -> fatal `Other` error

use m3u8_rs::Playlist;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{
    AutoplayBlocked, EngineConfig, EngineErrorKind, EngineEvent, EngineEventKind,
    EngineEventSender, EngineFactory, EngineId, PlaybackEngine, SourceRequest,
};
use crate::Result;

/// Engine that validates manifests without decoding media
pub struct HlsProbeEngine {
    id: EngineId,
    client: Client,
    events: EngineEventSender,
    config: EngineConfig,
    current: Option<SourceRequest>,
    task: Option<JoinHandle<()>>,
    destroyed: bool,
}

impl HlsProbeEngine {
    pub fn new(id: EngineId, client: Client, events: EngineEventSender, config: EngineConfig) -> Self {
        Self {
            id,
            client,
            events,
            config,
            current: None,
            task: None,
            destroyed: false,
        }
    }

    fn abort_probe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn report_fatal(&self, details: String) {
        let _ = self
            .events
            .send(EngineEvent::fatal(self.id, EngineErrorKind::Other, details));
    }

    /// Fetch and parse the current source in the background
    fn spawn_probe(&mut self) {
        self.abort_probe();
        if self.destroyed {
            return;
        }
        let Some(request) = self.current.clone() else {
            warn!(engine = %self.id, "No source loaded");
            return;
        };

        let url = match Url::parse(&request.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                self.report_fatal(format!("unsupported scheme: {}", url.scheme()));
                return;
            }
            Err(e) => {
                self.report_fatal(format!("cannot fetch {}: {}", request.url, e));
                return;
            }
        };

        let id = self.id;
        let client = self.client.clone();
        let events = self.events.clone();
        self.task = Some(tokio::spawn(async move {
            let kind = probe(&client, url, &request.headers).await;
            let _ = events.send(EngineEvent::new(id, kind));
        }));
    }
}

#[instrument(skip(client, headers), fields(url = %url))]
async fn probe(client: &Client, url: Url, headers: &HashMap<String, String>) -> EngineEventKind {
    let mut builder = client.get(url);
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => return network_error(e.to_string()),
    };

    let status = response.status();
    if !status.is_success() {
        return network_error(format!("manifest returned HTTP {}", status));
    }

    match response.bytes().await {
        Ok(body) => parse_manifest(&body),
        Err(e) => network_error(e.to_string()),
    }
}

fn network_error(details: String) -> EngineEventKind {
    EngineEventKind::Error {
        kind: EngineErrorKind::Network,
        fatal: true,
        details,
    }
}

/// Classify a manifest body into an engine event
pub(crate) fn parse_manifest(body: &[u8]) -> EngineEventKind {
    match m3u8_rs::parse_playlist_res(body) {
        Ok(Playlist::MasterPlaylist(master)) => {
            debug!(variants = master.variants.len(), "Master playlist parsed");
            EngineEventKind::ManifestParsed {
                variants: master.variants.len(),
                duration: None,
            }
        }
        Ok(Playlist::MediaPlaylist(media)) => {
            let duration = media
                .end_list
                .then(|| media.segments.iter().map(|s| s.duration as f64).sum());
            debug!(segments = media.segments.len(), "Media playlist parsed");
            EngineEventKind::ManifestParsed {
                variants: 1,
                duration,
            }
        }
        Err(e) => EngineEventKind::Error {
            kind: EngineErrorKind::Media,
            fatal: true,
            details: format!("Failed to parse HLS playlist: {:?}", e),
        },
    }
}

impl PlaybackEngine for HlsProbeEngine {
    fn id(&self) -> EngineId {
        self.id
    }

    fn load_source(&mut self, request: SourceRequest) {
        debug!(
            engine = %self.id,
            url = %request.url,
            max_buffer = self.config.max_buffer_length,
            "Loading source"
        );
        self.current = Some(request);
        self.spawn_probe();
    }

    fn start_load(&mut self) {
        debug!(engine = %self.id, "Reloading source");
        self.spawn_probe();
    }

    fn recover_media_error(&mut self) {
        debug!(engine = %self.id, "Recovering media pipeline");
        self.spawn_probe();
    }

    fn play(&mut self) -> std::result::Result<(), AutoplayBlocked> {
        Ok(())
    }

    fn destroy(&mut self) {
        self.abort_probe();
        self.current = None;
        self.destroyed = true;
    }
}

impl Drop for HlsProbeEngine {
    fn drop(&mut self) {
        self.abort_probe();
    }
}

/// Factory producing [`HlsProbeEngine`] instances that share one HTTP client
pub struct HlsProbeFactory {
    client: Client,
    events: EngineEventSender,
}

impl HlsProbeFactory {
    pub fn new(events: EngineEventSender, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, events })
    }

    pub fn with_client(client: Client, events: EngineEventSender) -> Self {
        Self { client, events }
    }
}

impl EngineFactory for HlsProbeFactory {
    fn create(&mut self, id: EngineId, config: &EngineConfig) -> Result<Box<dyn PlaybackEngine>> {
        Ok(Box::new(HlsProbeEngine::new(
            id,
            self.client.clone(),
            self.events.clone(),
            config.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_master_playlist() {
        let master = b"#EXTM3U\n\
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
360p.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080\n\
1080p.m3u8\n";
        assert_eq!(
            parse_manifest(master),
            EngineEventKind::ManifestParsed { variants: 2, duration: None }
        );
    }

    #[test]
    fn test_parse_vod_media_playlist() {
        let media = b"#EXTM3U\n\
#EXT-X-TARGETDURATION:10\n\
#EXT-X-MEDIA-SEQUENCE:0\n\
#EXTINF:10.0,\n\
seg0.ts\n\
#EXTINF:5.0,\n\
seg1.ts\n\
#EXT-X-ENDLIST\n";
        match parse_manifest(media) {
            EngineEventKind::ManifestParsed { variants, duration } => {
                assert_eq!(variants, 1);
                assert_eq!(duration, Some(15.0));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_garbage_is_media_error() {
        assert!(matches!(
            parse_manifest(b"<html>blocked</html>"),
            EngineEventKind::Error { kind: EngineErrorKind::Media, fatal: true, .. }
        ));
    }
}
