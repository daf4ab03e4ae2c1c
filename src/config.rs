use std::{str::FromStr, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    /// Error responses carry the full error chain only here.
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => anyhow::bail!("unknown APP_ENV {other:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl DatabaseConfig {
    /// Database settings alone, for tools that never verify tokens.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                var("DB_USER", "postgres"),
                var("DB_PASSWORD", "password"),
                var("DB_HOST", "localhost"),
                var("DB_PORT", "5432"),
                var("DB_NAME", "userbase"),
            ),
        };
        Ok(Self {
            url,
            max_connections: number(&lookup, "DB_MAX_CONNECTIONS", 20)?
                .try_into()
                .context("DB_MAX_CONNECTIONS is too large")?,
            acquire_timeout: Duration::from_millis(number(&lookup, "DB_ACQUIRE_TIMEOUT_MS", 2_000)?),
            idle_timeout: Duration::from_millis(number(&lookup, "DB_IDLE_TIMEOUT_MS", 30_000)?),
        })
    }
}

fn number<F>(lookup: &F, key: &str, default: u64) -> anyhow::Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v
            .parse::<u64>()
            .with_context(|| format!("{key} must be a non-negative integer")),
        None => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub domain: String,
    pub audience: String,
    pub issuer: String,
    pub jwks_uri: String,
    pub jwks_cache_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| lookup(key).with_context(|| format!("{key} must be set"));
        let int = |key: &str, default: u64| number(&lookup, key, default);

        let environment = var("APP_ENV", "development").parse::<Environment>()?;
        let database = DatabaseConfig::from_lookup(&lookup)?;

        let domain = required("AUTH_DOMAIN")?;
        let auth = AuthConfig {
            audience: required("AUTH_AUDIENCE")?,
            issuer: lookup("AUTH_ISSUER").unwrap_or_else(|| format!("https://{domain}/")),
            jwks_uri: lookup("AUTH_JWKS_URI")
                .unwrap_or_else(|| format!("https://{domain}/.well-known/jwks.json")),
            jwks_cache_ttl: Duration::from_secs(int("JWKS_CACHE_TTL_SECS", 600)?),
            domain,
        };

        Ok(Self {
            environment,
            host: var("APP_HOST", "0.0.0.0"),
            port: int("APP_PORT", 3000)?
                .try_into()
                .context("APP_PORT must fit in a u16")?,
            frontend_url: var("FRONTEND_URL", "http://localhost:3000"),
            database,
            auth,
        })
    }
}
