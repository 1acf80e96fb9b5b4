use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// The name this service identifies itself with towards other services.
pub const SERVICE_NAME: &str = "bs_go";

pub static HS256_HEADER: Lazy<Header> = Lazy::new(|| Header {
    header_type: "JWT".to_string(),
    alg: "HS256".to_string(),
});

pub static HS256_HEADER_BASE64: Lazy<String> =
    Lazy::new(|| base64_encode(&*HS256_HEADER).expect("Header should be serializable"));

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Serializing the claims: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid secret length")]
    InvalidSecret,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Token expired")]
    Expired,
}

/// Serializes the value into a JSON and then it encodes the result using `base64`
/// with the [`base64::URL_SAFE_NO_PAD`] configuration
fn base64_encode<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;

    Ok(base64::encode_config(&json, base64::URL_SAFE_NO_PAD))
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    #[serde(rename = "typ")]
    header_type: String,
    alg: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Claims {
    pub service: String,
    /// Unix seconds
    pub exp: i64,
}

/// Short-lived HS256 token which authenticates this service
/// to the ledger as a Bearer token.
#[derive(Debug, Clone)]
pub struct ServiceToken {
    secret: String,
    ttl: Duration,
}

impl ServiceToken {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// `{header_base64}.{claims_base64}.{signature_base64}`
    pub fn sign(&self, now: DateTime<Utc>) -> Result<String, JwtError> {
        let claims = Claims {
            service: SERVICE_NAME.to_string(),
            exp: (now + self.ttl).timestamp(),
        };
        let message = format!("{}.{}", &*HS256_HEADER_BASE64, base64_encode(&claims)?);

        let mut mac = self.mac()?;
        mac.update(message.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            message,
            base64::encode_config(signature, base64::URL_SAFE_NO_PAD)
        ))
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, JwtError> {
        let (message, signature_encoded) = token.rsplit_once('.').ok_or(JwtError::InvalidToken)?;
        let (header_encoded, claims_encoded) =
            message.split_once('.').ok_or(JwtError::InvalidToken)?;

        if header_encoded != HS256_HEADER_BASE64.as_str() {
            return Err(JwtError::InvalidToken);
        }

        let signature = base64::decode_config(signature_encoded, base64::URL_SAFE_NO_PAD)
            .map_err(|_| JwtError::InvalidSignature)?;

        let mut mac = self.mac()?;
        mac.update(message.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| JwtError::InvalidSignature)?;

        let claims_json = base64::decode_config(claims_encoded, base64::URL_SAFE_NO_PAD)
            .map_err(|_| JwtError::InvalidToken)?;
        let claims: Claims = serde_json::from_slice(&claims_json)?;

        if claims.exp < now.timestamp() {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, JwtError> {
        HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| JwtError::InvalidSecret)
    }
}
