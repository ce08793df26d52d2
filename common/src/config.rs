use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_UPSTREAM_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_DATABASE_URL: &str = "postgres://postgres@localhost:5432/postgres";

/// Process-wide configuration, read once at startup and injected into
/// handlers as shared state.
#[derive(Clone)]
pub struct AppConfig {
    /// Bearer credential for the completion provider. Absent or blank means
    /// every relay invocation fails fast before any upstream call.
    pub upstream_api_key: Option<String>,
    /// Model used when the request body does not name one.
    pub default_model: Option<String>,
    pub upstream_url: String,
    /// Referer sent upstream; falls back to the request's Origin/Referer.
    pub site_url: Option<String>,
    pub site_title: String,
    pub database_url: String,
    pub pool_max_connections: u32,
    pub pool_idle_timeout: Duration,
    pub pool_acquire_timeout: Duration,
}

impl AppConfig {
    pub fn load() -> Self {
        let database_url = env_opt("DATABASE_URL").unwrap_or_else(|| {
            log::warn!("DATABASE_URL not set, chat log persistence will fail");
            DEFAULT_DATABASE_URL.to_string()
        });

        Self {
            upstream_api_key: env_opt("OPENROUTER_API_KEY"),
            default_model: env_opt("OPENROUTER_MODEL"),
            upstream_url: env_opt("OPENROUTER_URL")
                .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
            site_url: env_opt("OPENROUTER_SITE").or_else(|| env_opt("OPENROUTER_SITE_URL")),
            site_title: env_opt("OPENROUTER_TITLE").unwrap_or_else(|| "chat-gateway".to_string()),
            database_url,
            pool_max_connections: env_parse("PGPOOL_MAX", 10),
            pool_idle_timeout: Duration::from_millis(env_parse("PGPOOL_IDLE", 30_000)),
            pool_acquire_timeout: Duration::from_millis(env_parse("PG_CONNECT_TIMEOUT", 5_000)),
        }
    }
}

/// Read an environment variable, treating blank values as unset.
fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    match env_opt(key) {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            log::warn!("invalid {} value {:?}: {}", key, raw, e);
            default
        }),
        None => default,
    }
}
