use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::{Error, Result};
use crate::types::Token;

const ARGON2_MEMORY: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

pub const TOKEN_PREFIX: &str = "dockyard";
const LOOKUP_LENGTH: usize = 8;
const SECRET_LENGTH: usize = 24;
const SECRET_BYTES: usize = SECRET_LENGTH / 2;

/// A freshly minted token. `raw` is shown to the caller once and never stored.
pub struct IssuedToken {
    pub raw: String,
    pub token: Token,
}

pub struct TokenGenerator {
    argon2: Argon2<'static>,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .unwrap_or_default();

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Generates a token of the form `dockyard_<lookup>_<secret>` bound to `user_id`.
    pub fn issue(&self, user_id: i64, expires_at: Option<DateTime<Utc>>) -> Result<IssuedToken> {
        let lookup = generate_lookup();
        let raw = format!("{TOKEN_PREFIX}_{lookup}_{}", generate_secret());
        let token_hash = self.hash(&raw)?;

        Ok(IssuedToken {
            token: Token {
                id: uuid::Uuid::new_v4().to_string(),
                token_hash,
                token_lookup: lookup,
                user_id,
                created_at: Utc::now(),
                expires_at,
                last_used_at: None,
            },
            raw,
        })
    }

    pub fn hash(&self, token: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(token.as_bytes(), &salt)
            .map_err(|e| Error::TokenHash(format!("failed to hash token: {e}")))?;
        Ok(hash.to_string())
    }

    pub fn verify(&self, token: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::TokenHash(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(token.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::TokenHash(format!("failed to verify token: {e}"))),
        }
    }
}

fn generate_lookup() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..LOOKUP_LENGTH].to_string()
}

fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Splits a raw token into its lookup and secret parts.
pub fn parse_token(token: &str) -> Result<(String, String)> {
    let rest = token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or(Error::InvalidTokenFormat)?;

    let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidTokenFormat)?;

    if lookup.len() != LOOKUP_LENGTH || secret.len() != SECRET_LENGTH || secret.contains('_') {
        return Err(Error::InvalidTokenFormat);
    }

    Ok((lookup.to_string(), secret.to_string()))
}
