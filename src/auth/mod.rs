mod helpers;
mod middleware;
mod token;

pub use helpers::{TokenValidationError, extract_token_from_header, validate_token};
pub use middleware::{AuthError, RequireAdmin, RequireUser};
pub use token::{TokenGenerator, parse_token};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::service::validation::validate_email;
use crate::store::Store;
use crate::types::{Token, User};

const MAX_TOKEN_ATTEMPTS: u32 = 3;

/// Creates and stores a new token, retrying on the rare lookup collision.
/// Returns the stored record and the raw token, which is never persisted.
pub fn issue_token(
    store: &dyn Store,
    generator: &TokenGenerator,
    user_id: Option<&str>,
    is_admin: bool,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(Token, String)> {
    for _ in 0..MAX_TOKEN_ATTEMPTS {
        let (raw_token, lookup, hash) = generator.generate()?;
        let token = Token {
            id: Uuid::new_v4().to_string(),
            token_hash: hash,
            token_lookup: lookup,
            is_admin,
            user_id: user_id.map(str::to_string),
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
        };

        match store.create_token(&token) {
            Ok(()) => return Ok((token, raw_token)),
            Err(Error::TokenLookupCollision) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(Error::TokenLookupCollision)
}

/// Registers a user by email and issues their first token.
pub fn register_user(
    store: &dyn Store,
    generator: &TokenGenerator,
    email: &str,
) -> Result<(User, String)> {
    validate_email(email)?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.trim().to_string(),
        created_at: Utc::now(),
    };
    store.create_user(&user)?;

    let (_, raw_token) = issue_token(store, generator, Some(&user.id), false, None)?;
    tracing::info!("Registered user {} ({})", user.email, user.id);
    Ok((user, raw_token))
}
