use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// First administrator, created when the users table is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub uploads_dir: PathBuf,
    pub admin: Option<AdminBootstrap>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("DEPOT_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("DEPOT_JWT_SECRET is unset or still a placeholder");
        }

        let port = match var("DEPOT_PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("DEPOT_PORT is not a valid port: {port}"))?,
            None => 3000,
        };

        let admin = match (var("DEPOT_ADMIN_USERNAME"), var("DEPOT_ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminBootstrap { username, password }),
            _ => None,
        };

        Ok(Self {
            jwt_secret,
            db_path: var("DEPOT_DB_PATH").unwrap_or_else(|| "depot.db".into()).into(),
            host: var("DEPOT_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            uploads_dir: var("DEPOT_UPLOADS_DIR")
                .unwrap_or_else(|| "./uploads".into())
                .into(),
            admin,
        })
    }
}
