//! Bootstrap token generation and parsing
//!
//! A bootstrap token is `<id>.<secret>`: a 6 character public id used to name
//! the backing Secret, and a 16 character secret used to authenticate. Both
//! are drawn uniformly from `[a-z0-9]`, the alphabet the API server's
//! bootstrap token authenticator accepts.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use thiserror::Error;

/// Length of the public token id
pub const TOKEN_ID_LEN: usize = 6;

/// Length of the token secret
pub const TOKEN_SECRET_LEN: usize = 16;

/// Prefix of the Secret name that stores a token (`bootstrap-token-<id>`)
pub const TOKEN_SECRET_NAME_PREFIX: &str = "bootstrap-token-";

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

// Largest multiple of the alphabet size that fits in a byte. Bytes at or
// above it are rejected so every character is equally likely.
const ACCEPT_BELOW: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

const RANDOM_CHUNK: usize = 32;
const MAX_FILL_ROUNDS: usize = 64;

/// Error type for token generation failures
#[derive(Debug, Error)]
#[error("failed to generate cryptographically secure random bytes: random source exhausted")]
pub struct TokenGenerationError;

/// Error type for token parsing failures
#[derive(Debug, Error)]
#[error("invalid bootstrap token: {0}")]
pub struct TokenParseError(&'static str);

/// A bootstrap token for joining a node to the cluster
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapToken {
    id: String,
    secret: String,
}

impl BootstrapToken {
    /// Generate a new random bootstrap token from the system CSPRNG
    pub fn generate() -> Result<Self, TokenGenerationError> {
        Self::generate_from(|buf| aws_lc_rs::rand::fill(buf).map_err(|_| TokenGenerationError))
    }

    /// Generate a token drawing bytes from `fill`
    ///
    /// `fill` must overwrite the whole buffer on each call. A source that
    /// keeps producing only rejected bytes is treated as exhausted.
    pub fn generate_from<F>(mut fill: F) -> Result<Self, TokenGenerationError>
    where
        F: FnMut(&mut [u8]) -> Result<(), TokenGenerationError>,
    {
        let mut chars = String::with_capacity(TOKEN_ID_LEN + TOKEN_SECRET_LEN);
        let mut buf = [0u8; RANDOM_CHUNK];

        for _ in 0..MAX_FILL_ROUNDS {
            fill(&mut buf)?;
            for &b in buf.iter().filter(|&&b| b < ACCEPT_BELOW) {
                chars.push(ALPHABET[b as usize % ALPHABET.len()] as char);
                if chars.len() == TOKEN_ID_LEN + TOKEN_SECRET_LEN {
                    let secret = chars.split_off(TOKEN_ID_LEN);
                    return Ok(Self { id: chars, secret });
                }
            }
        }

        Err(TokenGenerationError)
    }

    /// Parse a token from its `id.secret` form
    pub fn parse(s: &str) -> Result<Self, TokenParseError> {
        let (id, secret) = s
            .split_once('.')
            .ok_or(TokenParseError("missing '.' separator"))?;

        if id.len() != TOKEN_ID_LEN {
            return Err(TokenParseError("token id must be 6 characters"));
        }
        if secret.len() != TOKEN_SECRET_LEN {
            return Err(TokenParseError("token secret must be 16 characters"));
        }
        if !id.bytes().chain(secret.bytes()).all(|b| ALPHABET.contains(&b)) {
            return Err(TokenParseError(
                "token may only contain lowercase letters and digits",
            ));
        }

        Ok(Self {
            id: id.to_string(),
            secret: secret.to_string(),
        })
    }

    /// The public token id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The token secret
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Name of the Secret that stores this token
    pub fn secret_name(&self) -> String {
        format!("{}{}", TOKEN_SECRET_NAME_PREFIX, self.id)
    }

    /// SHA-256 of the secret part, for log correlation without exposing it
    pub fn secret_hash(&self) -> String {
        use aws_lc_rs::digest::{digest, SHA256};
        let hash = digest(&SHA256, self.secret.as_bytes());
        URL_SAFE_NO_PAD.encode(hash.as_ref())
    }
}

impl FromStr for BootstrapToken {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for BootstrapToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't expose the secret in debug output
        f.debug_struct("BootstrapToken")
            .field("id", &self.id)
            .field("secret_hash", &self.secret_hash())
            .finish()
    }
}

impl fmt::Display for BootstrapToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.secret)
    }
}
