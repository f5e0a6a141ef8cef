use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use crate::domain::DEFAULT_PAGE_LIMIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Without it the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub log_format: LogFormat,
    pub history_page_limit: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let page_limit: usize = lookup("HISTORY_PAGE_LIMIT")
            .map(|v| v.parse::<usize>())
            .transpose()?
            .unwrap_or(DEFAULT_PAGE_LIMIT);
        if page_limit == 0 {
            anyhow::bail!("HISTORY_PAGE_LIMIT must be at least 1");
        }

        Ok(Config {
            server_port: lookup("SERVER_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()?,
            log_format: lookup("LOG_FORMAT")
                .unwrap_or_else(|| "pretty".to_string())
                .parse()?,
            history_page_limit: page_limit,
        })
    }
}
