//! Session configuration pointed at a mock server

use reddit_media_dl::config::{EndpointConfig, HttpConfig, RetryConfig};
use reddit_media_dl::{Config, Session};
use std::time::Duration;
use wiremock::MockServer;

/// Config whose every upstream lives on `server`, with no request spacing
/// and no retries
pub fn mock_config(server: &MockServer) -> Config {
    mock_config_with_interval(server, Duration::ZERO)
}

/// Like [`mock_config`] with a custom minimum request interval
pub fn mock_config_with_interval(server: &MockServer, interval: Duration) -> Config {
    Config {
        http: HttpConfig {
            min_request_interval: interval,
            ..Default::default()
        },
        retry: RetryConfig::disabled(),
        endpoints: EndpointConfig {
            reddit_base: server.uri(),
            imgur_api_base: server.uri(),
            imgur_web_base: server.uri(),
            imgur_cdn_base: format!("{}/cdn", server.uri()),
            redgifs_api_base: server.uri(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Session against `server`
pub fn mock_session(server: &MockServer) -> Session {
    Session::new(mock_config(server)).expect("session should build")
}
