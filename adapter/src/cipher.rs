//! AES-128-CBC codecs for the objects the allocation API hands out.
//!
//! Format: `JSON -> AES-128-CBC (IV = key, PKCS#7) -> URL-safe base64`.
//! The encoded form is padded with `=` to a multiple of 4, decoding
//! accepts it with or without the padding.
use aes::{
    cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit},
    Aes128,
};
use primitives::{
    config::CodecConfig, payload::PAYLOAD_PLACEHOLDER, ImpressionData, Payload, TrackingData,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

type Encryptor = cbc::Encryptor<Aes128>;
type Decryptor = cbc::Decryptor<Aes128>;

const KEY_LENGTH: usize = 16;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid payload")]
    Empty,
    #[error("the key must be {KEY_LENGTH} bytes long")]
    InvalidKey,
    #[error("base64 decoding: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decrypting failed")]
    Decrypt,
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A symmetric AES-128-CBC cipher keyed by a 16 bytes string.
#[derive(Clone)]
pub struct Cipher {
    key: [u8; KEY_LENGTH],
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

impl Cipher {
    pub fn new(key: &str) -> Result<Self, CipherError> {
        let key = key.as_bytes().try_into().map_err(|_| CipherError::InvalidKey)?;

        Ok(Self { key })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> String {
        let ciphertext = Encryptor::new(&self.key.into(), &self.key.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        pad_base64(base64::encode_config(&ciphertext, base64::URL_SAFE_NO_PAD))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, CipherError> {
        let unpadded = encoded.replace('=', "");
        let ciphertext = base64::decode_config(&unpadded, base64::URL_SAFE_NO_PAD)?;

        Decryptor::new(&self.key.into(), &self.key.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CipherError::Decrypt)
    }

    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String, CipherError> {
        let json = serde_json::to_vec(value)?;

        Ok(self.encrypt(&json))
    }

    pub fn decode<T: DeserializeOwned>(&self, encoded: &str) -> Result<T, CipherError> {
        if encoded.is_empty() {
            return Err(CipherError::Empty);
        }

        let json = self.decrypt(encoded)?;

        Ok(serde_json::from_slice(&json)?)
    }
}

fn pad_base64(mut encoded: String) -> String {
    while encoded.len() % 4 != 0 {
        encoded.push('=');
    }

    encoded
}

/// The three codecs, each with its own key.
#[derive(Debug, Clone)]
pub struct Codecs {
    payload: Cipher,
    impression: Cipher,
    tracking: Cipher,
}

impl Codecs {
    pub fn new(config: &CodecConfig) -> Result<Self, CipherError> {
        Ok(Self {
            payload: Cipher::new(&config.payload_key)?,
            impression: Cipher::new(&config.impression_key)?,
            tracking: Cipher::new(&config.tracking_key)?,
        })
    }

    /// Fails for an empty payload and for the SDK placeholder.
    pub fn parse_payload(&self, encoded: &str) -> Result<Payload, CipherError> {
        if encoded == PAYLOAD_PLACEHOLDER {
            return Err(CipherError::Empty);
        }

        self.payload.decode(encoded)
    }

    pub fn build_payload(&self, payload: &Payload) -> Result<String, CipherError> {
        self.payload.encode(payload)
    }

    pub fn parse_impression_data(&self, encoded: &str) -> Result<ImpressionData, CipherError> {
        self.impression.decode(encoded)
    }

    pub fn build_impression_data(&self, data: &ImpressionData) -> Result<String, CipherError> {
        self.impression.encode(data)
    }

    pub fn parse_tracking_data(&self, encoded: &str) -> Result<TrackingData, CipherError> {
        self.tracking.decode(encoded)
    }

    pub fn build_tracking_data(&self, data: &TrackingData) -> Result<String, CipherError> {
        self.tracking.encode(data)
    }
}
