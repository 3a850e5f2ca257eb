use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

use letterbox_api::directory::HashCost;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Ten years. Longer lifetimes overflow the token's expiry arithmetic.
const MAX_TOKEN_TTL_HOURS: i64 = 87_600;

#[derive(Debug)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl: chrono::Duration,
    pub hash_cost: HashCost,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup so tests need not touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("LETTERBOX_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("LETTERBOX_JWT_SECRET is unset or still a placeholder");
        }

        let db_path = lookup("LETTERBOX_DB_PATH").unwrap_or_else(|| "letterbox.db".into());
        let host = lookup("LETTERBOX_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&lookup, "LETTERBOX_PORT", 3000)?;
        let ttl_hours: i64 = parse_or(&lookup, "LETTERBOX_TOKEN_TTL_HOURS", 720)?; // 30 days
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&ttl_hours) {
            bail!(
                "LETTERBOX_TOKEN_TTL_HOURS must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_HOURS,
                ttl_hours
            );
        }

        let defaults = HashCost::default();
        let hash_cost = HashCost {
            memory_kib: parse_or(&lookup, "LETTERBOX_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&lookup, "LETTERBOX_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&lookup, "LETTERBOX_HASH_PARALLELISM", defaults.parallelism)?,
        };

        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path: db_path.into(),
            addr,
            token_ttl: chrono::Duration::hours(ttl_hours),
            hash_cost,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.parse().with_context(|| format!("{} has invalid value {:?}", key, raw)),
        None => Ok(default),
    }
}
