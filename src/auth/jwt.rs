use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::debug;

use super::{AuthError, Claims, JwksCache};

/// Verifies provider-issued RS256 tokens: signature against the cached key
/// set, then issuer, audience and expiry.
pub struct TokenVerifier {
    keys: JwksCache,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(keys: JwksCache, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        Self { keys, validation }
    }

    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("missing kid in token header".into()))?;

        let key = self.keys.key_for(&kid).await?;
        let data = decode::<Claims>(token, &key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        debug!(sub = %data.claims.sub, %kid, "jwt verified");
        Ok(data.claims)
    }
}
