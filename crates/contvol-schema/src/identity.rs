use crate::types::{EncodedSeed, VolumeId};
use thiserror::Error;

/// Token length used when no explicit length is configured.
pub const DEFAULT_TOKEN_LEN: usize = 12;
const MIN_TOKEN_LEN: usize = 4;
const MAX_TOKEN_LEN: usize = 64;
const MAX_SEED_LEN: usize = 256;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("malformed inventory seed: {0}")]
    MalformedSeed(String),
    #[error("token length {0} out of range ({MIN_TOKEN_LEN}..={MAX_TOKEN_LEN})")]
    InvalidTokenLength(usize),
}

/// Turns an inventory seed into a short token embedded in runtime names.
///
/// Implementations must be pure: the same seed always yields the same token,
/// in every process and on every host.
pub trait IdentityEncoder: Send + Sync {
    fn encode(&self, seed: &str) -> Result<EncodedSeed, IdentityError>;
}

/// Default encoder: lowercase hex prefix of the blake3 digest of the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blake3Encoder {
    token_len: usize,
}

impl Default for Blake3Encoder {
    fn default() -> Self {
        Self {
            token_len: DEFAULT_TOKEN_LEN,
        }
    }
}

impl Blake3Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_len(token_len: usize) -> Result<Self, IdentityError> {
        if !(MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&token_len) {
            return Err(IdentityError::InvalidTokenLength(token_len));
        }
        Ok(Self { token_len })
    }

    pub fn token_len(&self) -> usize {
        self.token_len
    }
}

fn validate_seed(seed: &str) -> Result<(), IdentityError> {
    if seed.trim().is_empty() {
        return Err(IdentityError::MalformedSeed("seed must not be empty".to_owned()));
    }
    if seed.len() > MAX_SEED_LEN {
        return Err(IdentityError::MalformedSeed(format!(
            "seed exceeds {MAX_SEED_LEN} bytes"
        )));
    }
    if seed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(IdentityError::MalformedSeed(
            "seed must not contain whitespace or control characters".to_owned(),
        ));
    }
    Ok(())
}

impl IdentityEncoder for Blake3Encoder {
    fn encode(&self, seed: &str) -> Result<EncodedSeed, IdentityError> {
        validate_seed(seed)?;
        let hex = blake3::hash(seed.as_bytes()).to_hex().to_string();
        Ok(EncodedSeed::new(&hex[..self.token_len]))
    }
}

/// Derive the runtime-visible id for a volume: `<name>-<encode(seed)>`.
///
/// The id is a pure function of `(name, seed)`. Two inventories that declare
/// a volume with the same name still get distinct ids because their seeds
/// encode to different tokens. Fails only when the encoder rejects the seed.
pub fn compute_volume_id(
    name: &str,
    seed: &str,
    encoder: &dyn IdentityEncoder,
) -> Result<VolumeId, IdentityError> {
    let token = encoder.encode(seed)?;
    Ok(VolumeId::new(format!("{name}-{token}")))
}
