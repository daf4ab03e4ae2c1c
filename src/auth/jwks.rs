//! Identity-provider signing keys, fetched from the JWKS endpoint and cached
//! for a bounded time.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{jwk::JwkSet, DecodingKey};
use tokio::{sync::RwLock, time::Instant};
use tracing::{debug, info, warn};

use super::AuthError;

/// Unknown key ids do not trigger a refetch more often than this.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<JwkSet>;
}

/// Fetches the key set over HTTP.
pub struct HttpKeySetSource {
    http: reqwest::Client,
    jwks_uri: String,
}

impl HttpKeySetSource {
    pub fn new(jwks_uri: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("build JWKS http client")?;
        Ok(Self {
            http,
            jwks_uri: jwks_uri.into(),
        })
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> anyhow::Result<JwkSet> {
        info!(uri = %self.jwks_uri, "fetching JWKS");
        let set = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .context("request JWKS")?
            .error_for_status()
            .context("JWKS endpoint returned an error status")?
            .json::<JwkSet>()
            .await
            .context("decode JWKS")?;
        Ok(set)
    }
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

/// Time-bounded cache of decoding keys by `kid`.
pub struct JwksCache {
    source: Arc<dyn KeySetSource>,
    ttl: Duration,
    min_refresh: Duration,
    cached: RwLock<Option<CachedKeys>>,
}

impl JwksCache {
    pub fn new(source: Arc<dyn KeySetSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            min_refresh: MIN_REFRESH_INTERVAL.min(ttl),
            cached: RwLock::new(None),
        }
    }

    pub async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cached = self.cached.read().await;
            if let Some(c) = cached.as_ref() {
                let age = c.fetched_at.elapsed();
                if age < self.ttl {
                    if let Some(key) = c.keys.get(kid) {
                        return Ok(key.clone());
                    }
                    if age < self.min_refresh {
                        return Err(AuthError::KeyNotFound(kid.to_string()));
                    }
                }
            }
        }

        let mut cached = self.cached.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(c) = cached.as_ref() {
            if c.fetched_at.elapsed() < self.min_refresh {
                return c
                    .keys
                    .get(kid)
                    .cloned()
                    .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()));
            }
        }

        let fresh = self.load().await?;
        let key = fresh.keys.get(kid).cloned();
        *cached = Some(fresh);
        key.ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    async fn load(&self) -> Result<CachedKeys, AuthError> {
        let set = self
            .source
            .fetch()
            .await
            .map_err(|e| AuthError::KeyFetch(format!("{e:#}")))?;

        let mut keys = HashMap::new();
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                debug!("skipping JWK without kid");
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(e) => warn!(%kid, error = %e, "failed to parse JWK"),
            }
        }
        info!(keys = keys.len(), "loaded JWKS keys");

        Ok(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{test_key_set, TEST_KID};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KeySetSource for CountingSource {
        async fn fetch(&self) -> anyhow::Result<JwkSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(test_key_set())
        }
    }

    fn counting_cache(ttl: Duration) -> (Arc<CountingSource>, JwksCache) {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = JwksCache::new(source.clone(), ttl);
        (source, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_served_from_cache_until_ttl_expires() {
        let (source, cache) = counting_cache(Duration::from_secs(600));

        cache.key_for(TEST_KID).await.expect("first lookup");
        cache.key_for(TEST_KID).await.expect("cached lookup");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(601)).await;
        cache.key_for(TEST_KID).await.expect("lookup after expiry");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_kid_refetches_at_most_once_per_interval() {
        let (source, cache) = counting_cache(Duration::from_secs(600));
        cache.key_for(TEST_KID).await.expect("warm cache");

        let err = cache.key_for("rotated-away").await.err().expect("unknown kid");
        assert!(matches!(err, AuthError::KeyNotFound(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(MIN_REFRESH_INTERVAL).await;
        let err = cache.key_for("rotated-away").await.err().expect("unknown kid");
        assert!(matches!(err, AuthError::KeyNotFound(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn http_source_reads_jwks_endpoint_once_while_fresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(test_key_set()))
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpKeySetSource::new(format!("{}/.well-known/jwks.json", server.uri()))
            .expect("client");
        let cache = JwksCache::new(Arc::new(source), Duration::from_secs(600));

        cache.key_for(TEST_KID).await.expect("fetched key");
        cache.key_for(TEST_KID).await.expect("cached key");
    }

    #[tokio::test]
    async fn http_source_failure_is_a_key_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpKeySetSource::new(format!("{}/.well-known/jwks.json", server.uri()))
            .expect("client");
        let cache = JwksCache::new(Arc::new(source), Duration::from_secs(600));

        let err = cache.key_for(TEST_KID).await.err().expect("fetch failure");
        assert!(matches!(err, AuthError::KeyFetch(_)));
    }
}
