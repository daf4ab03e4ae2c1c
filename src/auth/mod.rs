mod claims;
pub(crate) mod extractors;
pub mod jwks;
mod jwt;
#[cfg(test)]
pub(crate) mod testing;

pub use claims::Claims;
pub use extractors::{require_auth, AuthUser};
pub use jwks::{HttpKeySetSource, JwksCache, KeySetSource};
pub use jwt::TokenVerifier;

/// Why a token was refused. Callers only ever see a uniform 401; the
/// variant is for logs.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid Authorization header format")]
    InvalidFormat,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("JWKS fetch error: {0}")]
    KeyFetch(String),
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),
}
