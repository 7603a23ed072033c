use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Secrets that ship in docs and sample env files.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub redis_url: Option<String>,
    pub token_ttl: Duration,
    pub cache_ttl: Duration,
    pub allow_admin_signup: bool,
    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("TASKLIST_JWT_SECRET").unwrap_or_default();
        if jwt_secret.len() < MIN_SECRET_LEN || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!(
                "TASKLIST_JWT_SECRET is unset, a placeholder, or shorter than {} bytes",
                MIN_SECRET_LEN
            );
        }

        let port = match var("TASKLIST_PORT") {
            Some(v) => v.parse().with_context(|| format!("invalid TASKLIST_PORT '{v}'"))?,
            None => 3000,
        };

        let admin_user = var("TASKLIST_ADMIN_USERNAME");
        let admin_pass = var("TASKLIST_ADMIN_PASSWORD");
        let bootstrap_admin = match (admin_user, admin_pass) {
            (Some(user), Some(pass)) => Some((user, pass)),
            (None, None) => None,
            _ => bail!("TASKLIST_ADMIN_USERNAME and TASKLIST_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            jwt_secret,
            db_path: var("TASKLIST_DB_PATH").unwrap_or_else(|| "tasklist.db".into()).into(),
            host: var("TASKLIST_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            redis_url: var("TASKLIST_REDIS_URL"),
            token_ttl: secs(var("TASKLIST_TOKEN_TTL_SECS"), "TASKLIST_TOKEN_TTL_SECS", 300)?,
            cache_ttl: secs(var("TASKLIST_CACHE_TTL_SECS"), "TASKLIST_CACHE_TTL_SECS", 300)?,
            allow_admin_signup: flag(
                var("TASKLIST_ALLOW_ADMIN_SIGNUP"),
                "TASKLIST_ALLOW_ADMIN_SIGNUP",
            )?,
            bootstrap_admin,
        })
    }
}

fn secs(value: Option<String>, key: &str, default: u64) -> Result<Duration> {
    let secs = match value {
        Some(v) => v.parse::<u64>().with_context(|| format!("invalid {key} '{v}'"))?,
        None => default,
    };
    if secs == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

fn flag(value: Option<String>, key: &str) -> Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("false" | "0" | "no") => Ok(false),
        Some("true" | "1" | "yes") => Ok(true),
        Some(other) => bail!("invalid {key} '{other}'"),
    }
}
