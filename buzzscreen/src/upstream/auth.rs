use std::time::Duration;

use async_trait::async_trait;
use primitives::Auth;
use redis::{aio::MultiplexedConnection, RedisError};
use reqwest::{Client, StatusCode};
use thiserror::Error;

use super::endpoint;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth service responded with {0}")]
    Status(StatusCode),
    #[error("auth service request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("auth cache: {0}")]
    Cache(#[from] RedisError),
    #[error("cached auth: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Resolves bearer tokens to the identity behind them.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// `None` when the auth service rejects the token.
    async fn authenticate(&self, token: &str) -> Result<Option<Auth>, AuthError>;
}

#[derive(Debug, Clone)]
pub struct HttpAuthService {
    base_url: String,
    client: Client,
}

impl HttpAuthService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl AuthService for HttpAuthService {
    async fn authenticate(&self, token: &str) -> Result<Option<Auth>, AuthError> {
        let response = self
            .client
            .get(endpoint(&self.base_url, "auth"))
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json().await?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(AuthError::Status(status)),
        }
    }
}

/// Keeps the resolved identities in Redis under their token.
#[derive(Clone)]
pub struct CachedAuthService<S> {
    inner: S,
    redis: MultiplexedConnection,
    /// In seconds
    ttl: u32,
}

impl<S: AuthService> CachedAuthService<S> {
    pub fn new(inner: S, redis: MultiplexedConnection, ttl: u32) -> Self {
        Self { inner, redis, ttl }
    }
}

#[async_trait]
impl<S: AuthService> AuthService for CachedAuthService<S> {
    async fn authenticate(&self, token: &str) -> Result<Option<Auth>, AuthError> {
        let cached = redis::cmd("GET")
            .arg(token)
            .query_async::<_, Option<String>>(&mut self.redis.clone())
            .await?
            .and_then(|auth| serde_json::from_str::<Auth>(&auth).ok());

        if let Some(auth) = cached {
            return Ok(Some(auth));
        }

        let auth = match self.inner.authenticate(token).await? {
            Some(auth) => auth,
            None => return Ok(None),
        };

        // a value which failed to deserialize is overridden
        redis::cmd("SET")
            .arg(token)
            .arg(serde_json::to_string(&auth)?)
            .arg("EX")
            .arg(self.ttl)
            .query_async::<_, ()>(&mut self.redis.clone())
            .await?;

        Ok(Some(auth))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use primitives::test_util::DUMMY_AUTH;
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    #[tokio::test]
    async fn resolves_and_rejects_tokens() {
        let server = MockServer::start().await;
        let auth_service =
            HttpAuthService::new(server.uri(), Duration::from_secs(1)).expect("Should build");

        Mock::given(method("GET"))
            .and(path("/auth"))
            .and(header("authorization", "Bearer valid-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&*DUMMY_AUTH))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/auth"))
            .and(header("authorization", "Bearer revoked-token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert_eq!(
            Some(DUMMY_AUTH.clone()),
            auth_service
                .authenticate("valid-token")
                .await
                .expect("Should authenticate")
        );
        assert_eq!(
            None,
            auth_service
                .authenticate("revoked-token")
                .await
                .expect("Should authenticate")
        );
    }
}
