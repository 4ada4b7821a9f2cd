use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

/// Which persistence backend the process runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Postgres when `DATABASE_URL` is set, the JSON file otherwise.
    Auto,
    Postgres,
    File,
}

/// What the file backend does with a store file it cannot parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileReadPolicy {
    /// Log and carry on with an empty mapping.
    Lenient,
    /// Fail the request with `StoreUnreadable`.
    Strict,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub backend: StoreBackend,
    pub store_file: PathBuf,
    pub file_read_policy: FileReadPolicy,
    pub cors_origin: Option<String>,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub body_limit_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match non_empty("STORE_BACKEND") {
            Some(v) => parse_lowercase::<StoreBackend>(&v).context("STORE_BACKEND")?,
            None => StoreBackend::Auto,
        };
        let file_read_policy = match non_empty("FILE_READ_POLICY") {
            Some(v) => parse_lowercase::<FileReadPolicy>(&v).context("FILE_READ_POLICY")?,
            None => FileReadPolicy::Lenient,
        };
        let port = non_empty("APP_PORT")
            .or_else(|| non_empty("PORT"))
            .map(|v| v.parse::<u16>())
            .transpose()
            .context("APP_PORT")?
            .unwrap_or(10000);

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            backend,
            store_file: non_empty("STORE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp/meals.json")),
            file_read_policy,
            cors_origin: non_empty("CORS_ORIGIN"),
            host: non_empty("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_max_connections: non_empty("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            body_limit_bytes: non_empty("BODY_LIMIT_BYTES")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(1024 * 1024),
        })
    }
}

fn parse_lowercase<T: serde::de::DeserializeOwned>(raw: &str) -> anyhow::Result<T> {
    let value = serde_json::Value::String(raw.trim().to_lowercase());
    serde_json::from_value(value).with_context(|| format!("unsupported value {raw:?}"))
}
