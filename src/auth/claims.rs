use serde::{Deserialize, Serialize};

/// Verified identity-provider claims attached to an authenticated request.
///
/// Issuer, audience and expiry are checked during decoding and are not kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // provider subject, stored as users.external_id
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    pub exp: u64,
}

impl Claims {
    /// Claims carrying only a subject, for building fixtures.
    pub fn for_subject(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            email: None,
            given_name: None,
            family_name: None,
            name: None,
            picture: None,
            exp: 0,
        }
    }
}
