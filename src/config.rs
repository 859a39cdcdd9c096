use std::env::var;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use chrono_tz::Tz;
use dotenvy::dotenv;

use crate::{
    application::{
        handlers::broadcast_dispatcher::{
            DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE, DispatchSettings, FetchFailurePolicy,
        },
        services::job_queue::DEFAULT_LEASE,
    },
    infrastructure::messaging::telegram::DEFAULT_TELEGRAM_API_URL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBackend {
    Redis,
    Postgres,
    Memory,
}

impl FromStr for StateBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StateBackend::Redis),
            "postgres" => Ok(StateBackend::Postgres),
            "memory" => Ok(StateBackend::Memory),
            other => anyhow::bail!("unknown state backend '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    Redis,
    Memory,
}

impl FromStr for QueueBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(QueueBackend::Redis),
            "memory" => Ok(QueueBackend::Memory),
            other => anyhow::bail!("unknown queue backend '{other}'"),
        }
    }
}

fn parse_fetch_failure(raw: &str) -> anyhow::Result<FetchFailurePolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "exhausted" => Ok(FetchFailurePolicy::TreatAsExhausted),
        "fail" => Ok(FetchFailurePolicy::Fail),
        other => anyhow::bail!("unknown fetch failure policy '{other}'"),
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub scheme: String,
    pub api_key: String,
    pub bot_token: String,
    pub telegram_api_url: String,
    pub recipients_api_url: String,
    pub recipients_api_key: String,
    pub state_backend: StateBackend,
    pub queue_backend: QueueBackend,
    pub redis_url: String,
    pub database_url: Option<String>,
    pub source_timezone: Tz,
    pub dispatch: DispatchSettings,
    pub queue_poll_interval: Duration,
    pub queue_lease: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        let _ = dotenv();
        Self::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| get(key).with_context(|| format!("{key} must be set"));

        let api_key = required("API_KEY")?;
        let state_backend = get("STATE_BACKEND")
            .map(|raw| raw.parse::<StateBackend>())
            .transpose()
            .context("STATE_BACKEND must be redis, postgres or memory")?
            .unwrap_or(StateBackend::Redis);
        let database_url = get("DATABASE_URL");
        if state_backend == StateBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STATE_BACKEND=postgres");
        }

        Ok(Config {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: get("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .context("PORT must be a valid port number")?,
            scheme: get("SCHEME").unwrap_or_else(|| "http".to_string()),
            bot_token: required("BOT_TOKEN")?,
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            recipients_api_url: required("RECIPIENTS_API_URL")?,
            recipients_api_key: get("RECIPIENTS_API_KEY").unwrap_or_else(|| api_key.clone()),
            api_key,
            state_backend,
            queue_backend: get("QUEUE_BACKEND")
                .map(|raw| raw.parse::<QueueBackend>())
                .transpose()
                .context("QUEUE_BACKEND must be redis or memory")?
                .unwrap_or(QueueBackend::Redis),
            redis_url: get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            database_url,
            source_timezone: get("SOURCE_TIMEZONE")
                .unwrap_or_else(|| "Europe/Moscow".to_string())
                .parse::<Tz>()
                .map_err(|err| anyhow::anyhow!("SOURCE_TIMEZONE is not an IANA zone: {err}"))?,
            dispatch: DispatchSettings {
                page_size: get("PAGE_SIZE")
                    .map(|raw| raw.parse::<usize>())
                    .transpose()
                    .context("PAGE_SIZE must be a positive number")?
                    .unwrap_or(DEFAULT_PAGE_SIZE)
                    .max(1),
                batch_size: get("BATCH_SIZE")
                    .map(|raw| raw.parse::<usize>())
                    .transpose()
                    .context("BATCH_SIZE must be a positive number")?
                    .unwrap_or(DEFAULT_BATCH_SIZE)
                    .max(1),
                fetch_failure: get("FETCH_FAILURE_POLICY")
                    .map(|raw| parse_fetch_failure(&raw))
                    .transpose()?
                    .unwrap_or_default(),
            },
            queue_poll_interval: Duration::from_millis(
                get("QUEUE_POLL_INTERVAL_MS")
                    .map(|raw| raw.parse::<u64>())
                    .transpose()
                    .context("QUEUE_POLL_INTERVAL_MS must be a number")?
                    .unwrap_or(1000),
            ),
            queue_lease: get("QUEUE_LEASE_MS")
                .map(|raw| raw.parse::<u64>())
                .transpose()
                .context("QUEUE_LEASE_MS must be a number")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_LEASE)
                .max(Duration::from_secs(1)),
        })
    }

    pub fn server_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("API_KEY", "secret"),
        ("BOT_TOKEN", "123:abc"),
        ("RECIPIENTS_API_URL", "https://users.example"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.server_url(), "http://127.0.0.1:3000");
        assert_eq!(config.recipients_api_key, "secret");
        assert_eq!(config.state_backend, StateBackend::Redis);
        assert_eq!(config.queue_backend, QueueBackend::Redis);
        assert_eq!(config.source_timezone, chrono_tz::Europe::Moscow);
        assert_eq!(config.dispatch.page_size, 500);
        assert_eq!(config.dispatch.batch_size, 30);
        assert_eq!(
            config.dispatch.fetch_failure,
            FetchFailurePolicy::TreatAsExhausted
        );
        assert_eq!(config.queue_poll_interval, Duration::from_secs(1));
        assert_eq!(config.queue_lease, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_required_key() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("RECIPIENTS_API_URL"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("STATE_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://localhost/broadcasts"),
            ("QUEUE_BACKEND", "memory"),
            ("SOURCE_TIMEZONE", "Europe/Berlin"),
            ("BATCH_SIZE", "10"),
            ("FETCH_FAILURE_POLICY", "fail"),
            ("QUEUE_LEASE_MS", "45000"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.state_backend, StateBackend::Postgres);
        assert_eq!(config.queue_backend, QueueBackend::Memory);
        assert_eq!(config.source_timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.dispatch.batch_size, 10);
        assert_eq!(config.dispatch.fetch_failure, FetchFailurePolicy::Fail);
        assert_eq!(config.queue_lease, Duration::from_secs(45));
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("STATE_BACKEND", "postgres"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }
}
