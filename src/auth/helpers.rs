use chrono::Utc;

use super::{TokenGenerator, parse_token};
use crate::store::Store;
use crate::types::{Token, User};

#[derive(Debug, PartialEq, Eq)]
pub enum TokenValidationError {
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    InternalError,
}

pub struct ValidatedToken {
    pub token: Token,
    pub user: User,
}

/// Extracts a token from a Basic auth header of the form
/// `Basic base64(x-token:<token>)`.
pub fn extract_basic_auth_token(header: &str) -> Option<String> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (username, password) = credentials.split_once(':')?;
    if username != "x-token" {
        return None;
    }

    Some(password.to_string())
}

/// Returns `Ok(None)` when no header is present and an error for unsupported schemes.
pub fn extract_token_from_header(
    auth_header: Option<&str>,
) -> Result<Option<String>, TokenValidationError> {
    let Some(header) = auth_header else {
        return Ok(None);
    };

    if let Some(token) = header.strip_prefix("Bearer ") {
        return Ok(Some(token.trim().to_string()));
    }
    if header.starts_with("Basic ") {
        return extract_basic_auth_token(header)
            .ok_or(TokenValidationError::InvalidToken)
            .map(Some);
    }
    Err(TokenValidationError::InvalidScheme)
}

/// Validates a raw token and resolves the user it belongs to.
pub fn validate_token(
    store: &dyn Store,
    raw_token: &str,
) -> Result<ValidatedToken, TokenValidationError> {
    let (lookup, _secret) =
        parse_token(raw_token).map_err(|_| TokenValidationError::InvalidToken)?;

    let token = store
        .get_token_by_lookup(&lookup)
        .map_err(|e| {
            tracing::error!("Failed to look up token: {e}");
            TokenValidationError::InternalError
        })?
        .ok_or(TokenValidationError::InvalidToken)?;

    if !TokenGenerator::new()
        .verify(raw_token, &token.token_hash)
        .map_err(|_| TokenValidationError::InternalError)?
    {
        return Err(TokenValidationError::InvalidToken);
    }

    if token.expires_at.is_some_and(|at| at < Utc::now()) {
        return Err(TokenValidationError::TokenExpired);
    }

    let user = store
        .get_user(token.user_id)
        .map_err(|e| {
            tracing::error!(user_id = token.user_id, "Failed to load token owner: {e}");
            TokenValidationError::InternalError
        })?
        .ok_or(TokenValidationError::InvalidToken)?;

    if let Err(e) = store.update_token_last_used(&token.id) {
        tracing::warn!("Failed to update token last_used_at: {e}");
    }

    Ok(ValidatedToken { token, user })
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header(None), Ok(None));
        assert_eq!(
            extract_token_from_header(Some("Bearer abc")),
            Ok(Some("abc".to_string()))
        );

        let basic = format!("Basic {}", STANDARD.encode("x-token:secret"));
        assert_eq!(
            extract_token_from_header(Some(&basic)),
            Ok(Some("secret".to_string()))
        );

        let wrong_user = format!("Basic {}", STANDARD.encode("alice:secret"));
        assert_eq!(
            extract_token_from_header(Some(&wrong_user)),
            Err(TokenValidationError::InvalidToken)
        );
        assert_eq!(
            extract_token_from_header(Some("Digest xyz")),
            Err(TokenValidationError::InvalidScheme)
        );
    }

    #[test]
    fn test_validate_token() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        let user = store.create_user("alice", false).unwrap();

        let generator = TokenGenerator::new();
        let live = generator.issue(user.id, None).unwrap();
        store.create_token(&live.token).unwrap();

        let validated = validate_token(&store, &live.raw).unwrap();
        assert_eq!(validated.user.id, user.id);
        assert!(
            store
                .get_token_by_id(&live.token.id)
                .unwrap()
                .unwrap()
                .last_used_at
                .is_some()
        );

        let expired = generator
            .issue(user.id, Some(Utc::now() - Duration::hours(1)))
            .unwrap();
        store.create_token(&expired.token).unwrap();
        assert!(matches!(
            validate_token(&store, &expired.raw),
            Err(TokenValidationError::TokenExpired)
        ));

        assert!(matches!(
            validate_token(&store, "dockyard_00000000_000000000000000000000000"),
            Err(TokenValidationError::InvalidToken)
        ));
        assert!(matches!(
            validate_token(&store, "garbage"),
            Err(TokenValidationError::InvalidToken)
        ));
    }
}
