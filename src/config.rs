//! Process configuration, built once in `main` and passed explicitly into
//! the constructors that need it.

use anyhow::{anyhow, Context, Result};
use std::env;

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub database_url: String,
    /// Opaque competition identifier; parameterizes DB defaults and logging.
    pub competition: String,
    pub poll_interval_seconds: u64,
    pub health_port: u16,
    /// If true, run a single tick and exit (no polling loop)
    pub run_once: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Secrets:
        // - Docker Compose: read from /run/secrets/*
        // - Container Apps: read from env vars (no /run/secrets mount)

        let api_key = match env::var("API_FOOTBALL_KEY") {
            Ok(v) if !v.trim().is_empty() => v,
            Ok(_) => return Err(anyhow!("API_FOOTBALL_KEY is set but empty")),
            Err(_) => read_secret_file("/run/secrets/api_football_key", "api_football_key")?,
        };

        // Catch sample/placeholder keys before burning the daily quota on 403s
        let key_lower = api_key.trim().to_lowercase();
        if key_lower.contains("change_me")
            || key_lower.contains("your_")
            || key_lower.starts_with("sample")
        {
            return Err(anyhow!(
                "API_FOOTBALL_KEY appears to be a placeholder value; replace with your real key"
            ));
        }

        // Database URL - competition-parameterized for multi-league deployment
        let competition = env::var("COMPETITION").unwrap_or_else(|_| "epl".to_string());
        let db_user = env::var("DB_USER").unwrap_or_else(|_| competition.clone());
        let db_name = env::var("DB_NAME").unwrap_or_else(|_| competition.clone());
        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "postgres".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());

        let database_url = match env::var("DATABASE_URL") {
            Ok(v) if !v.trim().is_empty() => v,
            Ok(_) => return Err(anyhow!("DATABASE_URL is set but empty")),
            Err(_) => {
                let db_password = read_secret_file("/run/secrets/db_password", "db_password")?;
                format!(
                    "postgresql://{}:{}@{}:{}/{}",
                    db_user, db_password, db_host, db_port, db_name
                )
            }
        };

        Ok(Self {
            api_key,
            database_url,
            competition,
            poll_interval_seconds: env::var("POLL_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            health_port: env::var("HEALTH_PORT")
                .unwrap_or_else(|_| "8084".to_string())
                .parse()
                .unwrap_or(8084),
            run_once: env::var("RUN_ONCE")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                == "true",
        })
    }
}

/// Read a secret from a Docker secret file - required, no fallback
fn read_secret_file(file_path: &str, secret_name: &str) -> Result<String> {
    std::fs::read_to_string(file_path)
        .map(|s| s.trim().to_string())
        .context(format!(
            "Secret file not found at {} ({}). Container must have secrets mounted.",
            file_path, secret_name
        ))
}
