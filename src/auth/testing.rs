//! RSA fixtures for signing tokens the way the identity provider would.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{encode, jwk::JwkSet, Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::json;

use super::{JwksCache, KeySetSource, TokenVerifier};

pub const TEST_KID: &str = "test-key";
pub const TEST_ISSUER: &str = "https://tenant.test.local/";
pub const TEST_AUDIENCE: &str = "https://api.test.local";

const TEST_KEY_PEM: &[u8] = include_bytes!("testdata/rsa_private.pem");
const OTHER_KEY_PEM: &[u8] = include_bytes!("testdata/rsa_other_private.pem");

// Public modulus of testdata/rsa_private.pem, base64url.
const TEST_KEY_N: &str = "rHAz1lUslHKSdpqc_zpGmz6R2_ySdB0f-K6HhElAsqCKC5gZcEa-_hq1Tt1NLoJ4cMobjBTPIqAp18UeDu_UjMi7_j0MxNGUHy1Gw2YI_tSboJoTtUfubz88fC1Fw_WlGia8_HLD3CUoRveibkUJj5ztre2M1B0fUIhGr55bMSTC8zcJ1TvBZOzN5EIYmdkYHEDsTgIbRWZh1FtFz2Q9Cjja80nW88AYIVMQQ4F_Wg-3N_WdAycdkTRP6Ea8Ur3NovnwRdKakOp29K2JdWr-yR4ul4qw5Jl464qrUBYYImEjpBtgNyjTxtDTEvvWrHGix80ALFs0yDBYj99p4OyQ4w";

pub fn test_key_set() -> JwkSet {
    serde_json::from_value(json!({
        "keys": [{
            "kty": "RSA",
            "kid": TEST_KID,
            "use": "sig",
            "alg": "RS256",
            "n": TEST_KEY_N,
            "e": "AQAB"
        }]
    }))
    .expect("valid test JWKS")
}

pub struct StaticKeySet(pub JwkSet);

#[async_trait]
impl KeySetSource for StaticKeySet {
    async fn fetch(&self) -> anyhow::Result<JwkSet> {
        Ok(self.0.clone())
    }
}

pub fn test_verifier() -> TokenVerifier {
    let cache = JwksCache::new(
        Arc::new(StaticKeySet(test_key_set())),
        std::time::Duration::from_secs(600),
    );
    TokenVerifier::new(cache, TEST_ISSUER, TEST_AUDIENCE)
}

/// Raw token payload, including the registered claims the verifier checks.
#[derive(Debug, Clone, Serialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: u64,
    pub iat: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl TokenClaims {
    pub fn valid(sub: &str) -> Self {
        let now = time::OffsetDateTime::now_utc().unix_timestamp() as u64;
        Self {
            sub: sub.to_string(),
            iss: TEST_ISSUER.to_string(),
            aud: TEST_AUDIENCE.to_string(),
            exp: now + 3600,
            iat: now,
            email: Some(format!("{}@example.com", sub.replace('|', "."))),
            given_name: None,
            family_name: None,
            name: None,
            picture: None,
        }
    }
}

fn sign(claims: &TokenClaims, kid: Option<&str>, pem: &[u8]) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem).expect("test key");
    encode(&header, claims, &key).expect("sign test token")
}

pub fn sign_token(claims: &TokenClaims) -> String {
    sign(claims, Some(TEST_KID), TEST_KEY_PEM)
}

pub fn sign_token_with_kid(claims: &TokenClaims, kid: Option<&str>) -> String {
    sign(claims, kid, TEST_KEY_PEM)
}

/// Signed with a key the provider never published, under the trusted kid.
pub fn sign_token_with_foreign_key(claims: &TokenClaims) -> String {
    sign(claims, Some(TEST_KID), OTHER_KEY_PEM)
}

pub fn bearer(claims: &TokenClaims) -> String {
    format!("Bearer {}", sign_token(claims))
}
