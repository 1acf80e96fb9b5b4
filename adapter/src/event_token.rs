//! Opaque event tokens for the track-event and reward-status callbacks.
//!
//! The [`EventToken`] is CBOR serialized together with its expiry and
//! sealed with ChaCha20-Poly1305. The key is the SHA-256 of the shared
//! secret, so every instance configured with the same secret can open
//! the tokens of the others.
//!
//! Wire format: `base64url(nonce || ciphertext)`.
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use chrono::{DateTime, Duration, Utc};
use primitives::EventToken;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LENGTH: usize = 12;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token is not signed with our secret")]
    Unsigned,
    #[error("token expired")]
    Expired,
    #[error("serializing token: {0}")]
    Serialization(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Sealed {
    token: EventToken,
    /// Unix seconds
    exp: i64,
}

#[derive(Clone)]
pub struct EventTokenCodec {
    cipher: ChaCha20Poly1305,
    ttl: Duration,
}

impl std::fmt::Debug for EventTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl EventTokenCodec {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let key = Sha256::digest(secret.as_bytes());

        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
            ttl,
        }
    }

    pub fn build(&self, token: &EventToken, now: DateTime<Utc>) -> Result<String, TokenError> {
        let sealed = Sealed {
            token: token.clone(),
            exp: (now + self.ttl).timestamp(),
        };

        let mut plaintext = Vec::new();
        ciborium::ser::into_writer(&sealed, &mut plaintext)
            .map_err(|err| TokenError::Serialization(err.to_string()))?;

        let mut nonce = [0_u8; NONCE_LENGTH];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|err| TokenError::Serialization(err.to_string()))?;

        let mut bytes = nonce.to_vec();
        bytes.extend(ciphertext);

        Ok(base64::encode_config(&bytes, base64::URL_SAFE_NO_PAD))
    }

    pub fn parse(&self, encoded: &str, now: DateTime<Utc>) -> Result<EventToken, TokenError> {
        let bytes = base64::decode_config(encoded.trim_end_matches('='), base64::URL_SAFE_NO_PAD)
            .map_err(|_| TokenError::Malformed)?;

        if bytes.len() <= NONCE_LENGTH {
            return Err(TokenError::Malformed);
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LENGTH);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TokenError::Unsigned)?;

        let sealed: Sealed =
            ciborium::de::from_reader(plaintext.as_slice()).map_err(|_| TokenError::Malformed)?;

        if sealed.exp < now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(sealed.token)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use primitives::{event::event_type, test_util::NOW, Resource};

    use super::*;

    fn token() -> EventToken {
        EventToken {
            resource: Resource {
                name: Some("Summer sale".into()),
                ..Resource::ad(1_000_000_042)
            },
            event_type: event_type::CLICKED.to_string(),
            unit_id: 200,
            transaction_id: "tx-1".into(),
        }
    }

    #[test]
    fn round_trips_within_the_ttl() {
        let codec = EventTokenCodec::new("secret", Duration::days(3));

        let encoded = codec.build(&token(), *NOW).expect("Should build");

        assert_eq!(token(), codec.parse(&encoded, *NOW).expect("Should parse"));
        assert_eq!(
            token(),
            codec
                .parse(&encoded, *NOW + Duration::days(3))
                .expect("Should still be valid")
        );
    }

    #[test]
    fn expires_after_the_ttl() {
        let codec = EventTokenCodec::new("secret", Duration::days(3));
        let encoded = codec.build(&token(), *NOW).expect("Should build");

        let result = codec.parse(&encoded, *NOW + Duration::days(3) + Duration::seconds(1));

        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn other_secrets_and_tampering_are_rejected() {
        let codec = EventTokenCodec::new("secret", Duration::days(3));
        let encoded = codec.build(&token(), *NOW).expect("Should build");

        let other = EventTokenCodec::new("another secret", Duration::days(3));
        assert!(matches!(
            other.parse(&encoded, *NOW),
            Err(TokenError::Unsigned)
        ));

        let mut bytes =
            base64::decode_config(&encoded, base64::URL_SAFE_NO_PAD).expect("Valid base64");
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        let tampered = base64::encode_config(&bytes, base64::URL_SAFE_NO_PAD);
        assert!(matches!(
            codec.parse(&tampered, *NOW),
            Err(TokenError::Unsigned)
        ));

        assert!(matches!(
            codec.parse("!!", *NOW),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(codec.parse("", *NOW), Err(TokenError::Malformed)));
    }
}
