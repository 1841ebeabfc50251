use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use kindle_scoring::ScoringPolicy;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub policy: ScoringPolicy,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("KINDLE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("KINDLE_JWT_SECRET is unset or still a placeholder; it must match the identity service's signing secret");
        }

        let db_path: PathBuf = lookup("KINDLE_DB_PATH")
            .unwrap_or_else(|| "kindle.db".into())
            .into();
        let host = lookup("KINDLE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("KINDLE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("KINDLE_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let policy = match lookup("KINDLE_SCORING_POLICY") {
            Some(path) => {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading scoring policy {}", path))?;
                ScoringPolicy::from_json(&json)
                    .with_context(|| format!("loading scoring policy {}", path))?
            }
            None => ScoringPolicy::default(),
        };

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            policy,
        })
    }
}
