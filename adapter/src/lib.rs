#![deny(rust_2018_idioms)]
#![deny(clippy::all)]
//! Pure cryptographic adapters of the lockscreen API.
//!
//! Nothing in this crate performs I/O, every adapter is a plain value
//! which can be shared between requests.

pub use self::{
    checksum::{ChecksumError, ChecksumValidator},
    cipher::{Cipher, CipherError, Codecs},
    cookie::CookieIdentity,
    event_token::{EventTokenCodec, TokenError},
    jwt::{JwtError, ServiceToken},
};

pub mod checksum;
pub mod cipher;
pub mod cookie;
pub mod event_token;
pub mod jwt;

/// Lowercase hex MD5 of the input.
pub fn md5_hex(input: impl AsRef<[u8]>) -> String {
    use md5::{Digest, Md5};

    hex::encode(Md5::digest(input.as_ref()))
}
