//! Identity resolution collaborator
//!
//! The core only ever sees a resolved user id. Lookup-by-credential is a
//! closed enum dispatched through one match, one query per variant.

use sqlx::PgPool;
use uuid::Uuid;

use crate::Result;

/// The credential shapes a request can carry.
#[derive(Clone, Debug)]
pub enum Credential {
    /// Bearer token, `uid:<uuid>` format. Real token verification lives in
    /// the auth service; this resolver only checks the referenced user
    /// exists.
    Token(String),
    Email(String),
    Phone(String),
    UserId(Uuid),
}

#[derive(Clone)]
pub struct IdentityResolver {
    pool: PgPool,
}

impl IdentityResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a credential to a user id, or `None` when it matches nobody.
    pub async fn resolve(&self, credential: &Credential) -> Result<Option<Uuid>> {
        let row: Option<(Uuid,)> = match credential {
            Credential::Token(token) => {
                let Some(id) = token.strip_prefix("uid:").and_then(|s| Uuid::parse_str(s).ok())
                else {
                    return Ok(None);
                };
                sqlx::query_as("SELECT id FROM users WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            Credential::Email(email) => {
                sqlx::query_as("SELECT id FROM users WHERE email = $1")
                    .bind(email)
                    .fetch_optional(&self.pool)
                    .await?
            }
            Credential::Phone(phone) => {
                sqlx::query_as("SELECT id FROM users WHERE phone = $1")
                    .bind(phone)
                    .fetch_optional(&self.pool)
                    .await?
            }
            Credential::UserId(id) => {
                sqlx::query_as("SELECT id FROM users WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        Ok(row.map(|(id,)| id))
    }
}

/// Extract the credential carried by an `Authorization: Bearer ...` header
/// value, if any.
pub fn credential_from_bearer(header: &str) -> Option<Credential> {
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        return None;
    }
    Some(Credential::Token(token.to_string()))
}
