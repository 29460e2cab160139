//! Layered configuration
//!
//! Defaults are overridden by an optional config file, then by environment
//! variables prefixed with `PRIMEX` (e.g. `PRIMEX_API__REQUEST_TIMEOUT_SECS=10`).
//! The server priority takes a comma separated list
//! (`PRIMEX_PLAYER__SERVER_PRIORITY=hd-2,megacloud`).

use config::{Config as ConfigBuilder, Environment, File};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::{Error, Result, Server, Track};

/// Characters left alone by JavaScript's `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Maps an API path (e.g. `episode/sources?...`) to a request URL
pub type UrlBuilder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub player: PlayerConfig,
}

impl AppConfig {
    /// Load configuration from an optional file plus the environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(Error::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("PRIMEX")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("player.server_priority")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.request_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "api.request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.player.server_priority.is_empty() {
            return Err(Error::InvalidConfig(
                "player.server_priority must list at least one server".to_string(),
            ));
        }
        if self.api.endpoint == EndpointMode::SameOrigin && self.api.origin.is_none() {
            return Err(Error::InvalidConfig(
                "api.origin is required for the same-origin endpoint".to_string(),
            ));
        }
        Ok(())
    }
}

/// How request URLs reach the catalog API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointMode {
    /// Call the API base directly
    Direct,
    /// Wrap the full API URL in a public CORS proxy
    CorsProxy,
    /// Route through a same-origin serverless proxy taking `?path=`
    SameOrigin,
}

/// Catalog API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Aniwatch API base, without trailing slash
    pub base_url: String,
    pub endpoint: EndpointMode,
    /// Prefix prepended to the encoded API URL in cors-proxy mode
    pub cors_proxy: String,
    /// Proxy route in same-origin mode
    pub proxy_endpoint: String,
    /// Page origin the same-origin proxy is served from
    pub origin: Option<String>,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://aniwatch-api-chi.vercel.app/api/v2/hianime".to_string(),
            endpoint: EndpointMode::Direct,
            cors_proxy: "https://corsproxy.io/?".to_string(),
            proxy_endpoint: "/api/proxy".to_string(),
            origin: None,
            request_timeout_secs: 30,
            user_agent: format!("primex/{}", crate::VERSION),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build the URL builder for the configured endpoint mode
    pub fn url_builder(&self) -> UrlBuilder {
        let base = self.base_url.trim_end_matches('/').to_string();
        match self.endpoint {
            EndpointMode::Direct => direct_url_builder(base),
            EndpointMode::CorsProxy => cors_proxy_url_builder(self.cors_proxy.clone(), base),
            EndpointMode::SameOrigin => {
                let origin = self.origin.clone().unwrap_or_default();
                let endpoint = format!(
                    "{}/{}",
                    origin.trim_end_matches('/'),
                    self.proxy_endpoint.trim_start_matches('/')
                );
                same_origin_url_builder(endpoint)
            }
        }
    }
}

/// Percent-encode a URI component the way browsers do
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// `{base}/{path}`
pub fn direct_url_builder(base: impl Into<String>) -> UrlBuilder {
    let base = base.into();
    Arc::new(move |path: &str| format!("{}/{}", base, path))
}

/// `{proxy}{encode("{base}/{path}")}`
pub fn cors_proxy_url_builder(proxy: impl Into<String>, base: impl Into<String>) -> UrlBuilder {
    let proxy = proxy.into();
    let base = base.into();
    Arc::new(move |path: &str| {
        format!("{}{}", proxy, encode_component(&format!("{}/{}", base, path)))
    })
}

/// `{endpoint}?path={encode(path)}`
pub fn same_origin_url_builder(endpoint: impl Into<String>) -> UrlBuilder {
    let endpoint = endpoint.into();
    Arc::new(move |path: &str| format!("{}?path={}", endpoint, encode_component(path)))
}

/// Playback and resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// First server tried for a fresh episode
    pub default_server: Server,
    /// First track tried for a fresh episode
    pub default_track: Track,
    /// Fallback order across servers
    pub server_priority: Vec<Server>,
    /// Consecutive recoveries without resumed playback before failing
    pub max_consecutive_recoveries: u32,
    /// Forward buffer target in seconds
    pub max_buffer_length: f64,
    /// Hard cap on the forward buffer in seconds
    pub max_max_buffer_length: f64,
    pub low_latency_mode: bool,
    pub enable_worker: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_server: Server::Hd1,
            default_track: Track::Sub,
            server_priority: Server::default_priority(),
            max_consecutive_recoveries: 3,
            max_buffer_length: 30.0,
            max_max_buffer_length: 60.0,
            low_latency_mode: true,
            enable_worker: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.api.endpoint, EndpointMode::Direct);
        assert_eq!(config.player.default_server, Server::Hd1);
        assert_eq!(config.player.default_track, Track::Sub);
        assert_eq!(
            config.player.server_priority,
            vec![Server::Hd1, Server::Hd2, Server::Megacloud]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_direct_builder() {
        let build = direct_url_builder("https://api.example.com/hianime");
        assert_eq!(build("home"), "https://api.example.com/hianime/home");
    }

    #[test]
    fn test_cors_proxy_builder() {
        let build = cors_proxy_url_builder("https://corsproxy.io/?", "https://api.example.com");
        assert_eq!(
            build("search?q=one piece&page=1"),
            "https://corsproxy.io/?https%3A%2F%2Fapi.example.com%2Fsearch%3Fq%3Done%20piece%26page%3D1"
        );
    }

    #[test]
    fn test_same_origin_builder() {
        let api = ApiConfig {
            endpoint: EndpointMode::SameOrigin,
            origin: Some("https://primex.example/".to_string()),
            ..Default::default()
        };
        let build = api.url_builder();
        assert_eq!(
            build("anime/frieren-18542/episodes"),
            "https://primex.example/api/proxy?path=anime%2Ffrieren-18542%2Fepisodes"
        );
    }

    #[test]
    fn test_same_origin_requires_origin() {
        let mut config = AppConfig::default();
        config.api.endpoint = EndpointMode::SameOrigin;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("primex-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("primex.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"api": {{"request_timeout_secs": 12, "endpoint": "cors-proxy"}},
                "player": {{"default_server": "hd-2", "max_consecutive_recoveries": 5}}}}"#
        )
        .unwrap();

        let config = tokio_test::assert_ok!(AppConfig::load(Some(&path)));
        assert_eq!(config.api.request_timeout_secs, 12);
        assert_eq!(config.api.endpoint, EndpointMode::CorsProxy);
        assert_eq!(config.player.default_server, Server::Hd2);
        assert_eq!(config.player.max_consecutive_recoveries, 5);
        assert_eq!(config.player.default_track, Track::Sub);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_env_server_priority_list() {
        std::env::set_var("PRIMEX_PLAYER__SERVER_PRIORITY", "hd-2,megacloud");
        let result = AppConfig::load(None);
        std::env::remove_var("PRIMEX_PLAYER__SERVER_PRIORITY");

        let config = tokio_test::assert_ok!(result);
        assert_eq!(
            config.player.server_priority,
            vec![Server::Hd2, Server::Megacloud]
        );
    }

    #[test]
    fn test_missing_file_rejected() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/primex.toml")));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
