//! Headless HLS engine against a mock CDN

#![cfg(feature = "hls")]

use primex_core::config::PlayerConfig;
use primex_core::engine::{
    engine_channel, EngineConfig, EngineErrorKind, EngineEvent, EngineEventKind,
    EngineEventReceiver, EngineFactory, EngineId, PlaybackEngine, SourceRequest,
};
use primex_core::HlsProbeFactory;
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360p.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720
720p.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
1080p.m3u8
";

async fn next_event(events: &mut EngineEventReceiver) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("engine event timed out")
        .expect("engine channel closed")
}

fn request(url: String) -> SourceRequest {
    SourceRequest {
        url,
        headers: HashMap::from([("Referer".to_string(), "https://megacloud.blog/".to_string())]),
    }
}

fn config() -> EngineConfig {
    EngineConfig::from(&PlayerConfig::default())
}

#[tokio::test]
async fn test_master_playlist_parsed_with_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hls/master.m3u8"))
        .and(header("Referer", "https://megacloud.blog/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (tx, mut rx) = engine_channel();
    let mut factory = HlsProbeFactory::new(tx, Duration::from_secs(5)).unwrap();
    let mut engine = factory.create(EngineId(1), &config()).unwrap();

    engine.load_source(request(format!("{}/hls/master.m3u8", mock_server.uri())));
    let event = next_event(&mut rx).await;

    assert_eq!(event.engine, EngineId(1));
    assert_eq!(
        event.kind,
        EngineEventKind::ManifestParsed { variants: 3, duration: None }
    );
    assert!(engine.play().is_ok());
    engine.destroy();
}

#[tokio::test]
async fn test_http_error_is_fatal_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hls/gone.m3u8"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let (tx, mut rx) = engine_channel();
    let mut factory = HlsProbeFactory::new(tx, Duration::from_secs(5)).unwrap();
    let mut engine = factory.create(EngineId(2), &config()).unwrap();

    engine.load_source(request(format!("{}/hls/gone.m3u8", mock_server.uri())));
    let event = next_event(&mut rx).await;

    assert!(matches!(
        event.kind,
        EngineEventKind::Error { kind: EngineErrorKind::Network, fatal: true, .. }
    ));
}

#[tokio::test]
async fn test_garbage_manifest_is_fatal_media_and_reload_refetches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hls/broken.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not a playlist"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let (tx, mut rx) = engine_channel();
    let mut factory = HlsProbeFactory::new(tx, Duration::from_secs(5)).unwrap();
    let mut engine = factory.create(EngineId(3), &config()).unwrap();

    engine.load_source(request(format!("{}/hls/broken.m3u8", mock_server.uri())));
    let first = next_event(&mut rx).await;
    assert!(matches!(
        first.kind,
        EngineEventKind::Error { kind: EngineErrorKind::Media, fatal: true, .. }
    ));

    engine.recover_media_error();
    let second = next_event(&mut rx).await;
    assert!(matches!(
        second.kind,
        EngineEventKind::Error { kind: EngineErrorKind::Media, .. }
    ));
}

#[tokio::test]
async fn test_relative_url_is_unclassified_error() {
    let (tx, mut rx) = engine_channel();
    let mut factory = HlsProbeFactory::new(tx, Duration::from_secs(5)).unwrap();
    let mut engine = factory.create(EngineId(4), &config()).unwrap();

    engine.load_source(request("a.m3u8".to_string()));
    let event = next_event(&mut rx).await;

    assert!(matches!(
        event.kind,
        EngineEventKind::Error { kind: EngineErrorKind::Other, fatal: true, .. }
    ));
}
