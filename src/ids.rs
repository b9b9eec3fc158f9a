//! Public identifier codec
//!
//! Row ids never leave the server in clear. Every id exposed through the API
//! is passed through [`IdCodec::encode`], and every id received from a client
//! goes back through [`IdCodec::decode`].
//!
//! # Token layout
//!
//! ```text
//! base64url( feistel_k(id as u64) [8 bytes] || hmac_k(block)[..4] )  -> 16 chars
//! ```
//!
//! The block cipher is a four-round Feistel network whose round function is
//! HMAC-SHA256 keyed by the server secret, so the mapping is a permutation of
//! `u64` (no two ids share a token) that cannot be inverted without the key.
//! The trailing tag authenticates the block, so a tampered token is rejected
//! instead of silently decoding to some other id.

use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Number of Feistel rounds
const ROUNDS: u8 = 4;

/// Length of the authentication tag appended to the block
const TAG_LEN: usize = 4;

/// Length of the raw token (block + tag)
const RAW_LEN: usize = 8 + TAG_LEN;

/// Length of an encoded token
pub const TOKEN_LEN: usize = 16;

/// Minimum accepted secret length in bytes
pub const MIN_SECRET_LEN: usize = 16;

/// Domain separation prefixes for the two HMAC uses
const ROUND_DOMAIN: u8 = b'F';
const TAG_DOMAIN: u8 = b'T';

/// Error returned when a token is malformed or was not produced by this codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier")]
pub struct InvalidIdError;

/// Error returned when building a codec from an unusable secret
#[derive(Debug, thiserror::Error)]
pub enum IdCodecError {
    #[error("id secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    SecretTooShort(usize),
}

/// Reversible, keyed mapping between row ids and opaque tokens.
///
/// Cheap to clone; holds only the keyed HMAC state.
#[derive(Clone)]
pub struct IdCodec {
    mac: HmacSha256,
}

impl fmt::Debug for IdCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdCodec").finish_non_exhaustive()
    }
}

impl IdCodec {
    /// Create a codec keyed by `secret`.
    pub fn new(secret: &[u8]) -> Result<Self, IdCodecError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(IdCodecError::SecretTooShort(secret.len()));
        }
        // HMAC accepts keys of any length
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|_| IdCodecError::SecretTooShort(secret.len()))?;
        Ok(Self { mac })
    }

    /// Encode a positive row id into a public token.
    pub fn encode(&self, id: i64) -> String {
        debug_assert!(id > 0, "only positive ids are encoded");
        let block = self.permute(id as u64).to_be_bytes();

        let mut raw = [0u8; RAW_LEN];
        raw[..8].copy_from_slice(&block);
        raw[8..].copy_from_slice(&self.tag(&block));
        BASE64URL_NOPAD.encode(&raw)
    }

    /// Decode a token produced by [`encode`](Self::encode).
    pub fn decode(&self, token: &str) -> Result<i64, InvalidIdError> {
        if token.len() != TOKEN_LEN {
            return Err(InvalidIdError);
        }
        let raw = BASE64URL_NOPAD
            .decode(token.as_bytes())
            .map_err(|_| InvalidIdError)?;
        if raw.len() != RAW_LEN {
            return Err(InvalidIdError);
        }

        let (block, tag) = raw.split_at(8);
        let mut mac = self.mac.clone();
        mac.update(&[TAG_DOMAIN]);
        mac.update(block);
        mac.verify_truncated_left(tag).map_err(|_| InvalidIdError)?;

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(block);
        let id = self.unpermute(u64::from_be_bytes(bytes));

        match i64::try_from(id) {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(InvalidIdError),
        }
    }

    /// Decode without failing: `None` when `token` is not one of ours.
    ///
    /// Used where a path segment may be either an encoded id or a slug.
    pub fn decode_lenient(&self, token: &str) -> Option<i64> {
        self.decode(token).ok()
    }

    fn tag(&self, block: &[u8]) -> [u8; TAG_LEN] {
        let mut mac = self.mac.clone();
        mac.update(&[TAG_DOMAIN]);
        mac.update(block);
        let out = mac.finalize().into_bytes();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&out[..TAG_LEN]);
        tag
    }

    fn round(&self, round: u8, half: u32) -> u32 {
        let mut mac = self.mac.clone();
        mac.update(&[ROUND_DOMAIN, round]);
        mac.update(&half.to_be_bytes());
        let out = mac.finalize().into_bytes();
        u32::from_be_bytes([out[0], out[1], out[2], out[3]])
    }

    fn permute(&self, block: u64) -> u64 {
        let (mut left, mut right) = ((block >> 32) as u32, block as u32);
        for round in 0..ROUNDS {
            let next = left ^ self.round(round, right);
            left = right;
            right = next;
        }
        ((left as u64) << 32) | right as u64
    }

    fn unpermute(&self, block: u64) -> u64 {
        let (mut left, mut right) = ((block >> 32) as u32, block as u32);
        for round in (0..ROUNDS).rev() {
            let prev = right ^ self.round(round, left);
            right = left;
            left = prev;
        }
        ((left as u64) << 32) | right as u64
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn codec() -> IdCodec {
        IdCodec::new(b"property-test-secret-xyz").expect("valid secret")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn decode_inverts_encode(id in 1i64..=i64::MAX) {
            let codec = codec();
            prop_assert_eq!(codec.decode(&codec.encode(id)), Ok(id));
        }

        #[test]
        fn distinct_ids_have_distinct_tokens(a in 1i64..=i64::MAX, b in 1i64..=i64::MAX) {
            prop_assume!(a != b);
            let codec = codec();
            prop_assert_ne!(codec.encode(a), codec.encode(b));
        }

        #[test]
        fn arbitrary_strings_never_panic(s in ".{0,40}") {
            let codec = codec();
            let strict = codec.decode(&s);
            let lenient = codec.decode_lenient(&s);
            prop_assert_eq!(strict.ok(), lenient);
        }

        #[test]
        fn random_tokens_are_rejected(s in "[A-Za-z0-9_-]{16}") {
            let codec = codec();
            // A 32-bit tag makes an accidental match vanishingly unlikely
            if let Ok(id) = codec.decode(&s) {
                prop_assert_eq!(codec.encode(id), s);
            } else {
                prop_assert_eq!(codec.decode_lenient(&s), None);
            }
        }
    }
}
