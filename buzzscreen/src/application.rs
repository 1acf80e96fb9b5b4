use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::Extension;
use once_cell::sync::Lazy;
use primitives::config::Environment;
use redis::ConnectionInfo;
use serde::{Deserialize, Deserializer};
use slog::{error, info};
use tower_http::cors::CorsLayer;

/// an error used when deserializing a [`EnvConfig`] instance from environment variables
/// see [`EnvConfig::from_env()`]
pub use envy::Error as EnvError;

use crate::{db::PostgresSettings, routes::router, Application};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_IP_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0));
pub static DEFAULT_REDIS_URL: Lazy<ConnectionInfo> = Lazy::new(|| {
    "redis://127.0.0.1:6379"
        .parse::<ConnectionInfo>()
        .expect("Valid URL")
});

/// The deployment specific settings and secrets of the service.
#[derive(Debug, Deserialize, Clone)]
pub struct EnvConfig {
    /// Defaults to `Development`: [`Environment::default()`]
    #[serde(default)]
    pub env: Environment,
    /// The port on which the API will be accessible.
    #[serde(default = "default_port")]
    /// Defaults to `8080`: [`DEFAULT_PORT`]
    pub port: u16,
    /// The address on which the API will be accessible.
    /// `0.0.0.0` can be used for Docker.
    /// `127.0.0.1` can be used for locally running servers.
    #[serde(default = "default_ip_addr")]
    /// Defaults to `0.0.0.0`: [`DEFAULT_IP_ADDR`]
    pub ip_addr: IpAddr,
    #[serde(deserialize_with = "redis_url", default = "default_redis_url")]
    /// Defaults to locally running Redis server: [`DEFAULT_REDIS_URL`]
    pub redis_url: ConnectionInfo,
    #[serde(default = "default_postgres_user")]
    pub postgres_user: String,
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,
    #[serde(default)]
    pub postgres_db: Option<String>,
    #[serde(default = "default_postgres_pool_size")]
    pub postgres_pool_size: usize,
    pub amqp_url: String,
    pub amqp_exchange: String,
    /// The reward ledger
    pub buzzcon_internal_url: String,
    /// The internal ad backend, public ad URLs are rewritten to it
    pub buzzad_url: String,
    pub buzzad_access_token: String,
    /// The callback URLs handed to the SDKs are built against it
    pub public_base_url: String,
    pub auth_service_url: String,
    pub profile_service_url: String,
    /// Signs the service tokens the ledger accepts
    pub service_token_secret: String,
    pub event_token_secret: String,
}

impl EnvConfig {
    /// Deserialize the application [`EnvConfig`] from Environment variables.
    pub fn from_env() -> Result<Self, EnvError> {
        envy::from_env()
    }

    pub fn postgres(&self) -> PostgresSettings {
        PostgresSettings {
            user: self.postgres_user.clone(),
            password: self.postgres_password.clone(),
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_db.clone(),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip_addr, self.port)
    }
}

fn redis_url<'de, D>(deserializer: D) -> Result<ConnectionInfo, D::Error>
where
    D: Deserializer<'de>,
{
    // environment values are never borrowed
    let url_string = String::deserialize(deserializer)?;

    url_string.parse().map_err(serde::de::Error::custom)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_ip_addr() -> IpAddr {
    DEFAULT_IP_ADDR
}
fn default_redis_url() -> ConnectionInfo {
    DEFAULT_REDIS_URL.clone()
}
fn default_postgres_user() -> String {
    "postgres".into()
}
fn default_postgres_password() -> String {
    "postgres".into()
}
fn default_postgres_host() -> String {
    "localhost".into()
}
fn default_postgres_port() -> u16 {
    5432
}
fn default_postgres_pool_size() -> usize {
    16
}

impl Application {
    /// Starts the `axum` server with the [`router()`] of the API.
    pub async fn run(self, socket_addr: SocketAddr) {
        let logger = self.logger.clone();
        info!(&logger, "Listening on socket address: {}!", socket_addr);

        let app = router()
            .layer(CorsLayer::permissive())
            .layer(Extension(Arc::new(self)));

        let server = axum_server::bind(socket_addr)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>());

        if let Err(e) = server.await {
            error!(&logger, "server error: {}", e; "main" => "run");
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn required_vars() -> Vec<(String, String)> {
        [
            ("AMQP_URL", "amqp://127.0.0.1:5672/%2f"),
            ("AMQP_EXCHANGE", "buzzscreen"),
            ("BUZZCON_INTERNAL_URL", "http://buzzcon.internal"),
            ("BUZZAD_URL", "http://buzzad.internal/"),
            ("BUZZAD_ACCESS_TOKEN", "access-token"),
            ("PUBLIC_BASE_URL", "https://screen.buzzvil.com"),
            ("AUTH_SERVICE_URL", "http://auth.internal"),
            ("PROFILE_SERVICE_URL", "http://profile.internal"),
            ("SERVICE_TOKEN_SECRET", "service-secret"),
            ("EVENT_TOKEN_SECRET", "event-secret"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
    }

    #[test]
    fn defaults() {
        let config = envy::from_iter::<_, EnvConfig>(required_vars()).expect("Should deserialize");

        assert_eq!(Environment::Development, config.env);
        assert_eq!(SocketAddr::from(([0, 0, 0, 0], 8080)), config.socket_addr());
        assert_eq!(DEFAULT_REDIS_URL.addr, config.redis_url.addr);
        assert_eq!("localhost", config.postgres().host);
        assert_eq!(None, config.postgres().database);
        assert_eq!(16, config.postgres_pool_size);
    }

    #[test]
    fn overrides() {
        let mut vars = required_vars();
        vars.extend(
            [
                ("ENV", "production"),
                ("PORT", "9000"),
                ("IP_ADDR", "127.0.0.1"),
                ("REDIS_URL", "redis://10.0.0.2:6380"),
                ("POSTGRES_DB", "buzzscreen"),
            ]
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string())),
        );

        let config = envy::from_iter::<_, EnvConfig>(vars).expect("Should deserialize");

        assert_eq!(Environment::Production, config.env);
        assert_eq!(SocketAddr::from(([127, 0, 0, 1], 9000)), config.socket_addr());
        assert_eq!(Some("buzzscreen".to_string()), config.postgres().database);
        assert_ne!(DEFAULT_REDIS_URL.addr, config.redis_url.addr);
    }

    #[test]
    fn missing_upstream_urls_fail() {
        let vars = required_vars()
            .into_iter()
            .filter(|(key, _)| key != "BUZZCON_INTERNAL_URL");

        assert!(envy::from_iter::<_, EnvConfig>(vars).is_err());
    }
}
