//! Configuration module for the contest tracker.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Base URLs of the upstream contest providers.
#[derive(Debug, Clone)]
pub struct ProviderUrls {
    pub codeforces: String,
    pub kontests: String,
    pub leetcode: String,
    pub codechef: String,
}

impl Default for ProviderUrls {
    fn default() -> Self {
        Self {
            codeforces: "https://codeforces.com".to_string(),
            kontests: "https://kontests.net".to_string(),
            leetcode: "https://leetcode.com".to_string(),
            codechef: "https://www.codechef.com".to_string(),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Timeout applied to every upstream request
    pub http_timeout: Duration,
    /// User-Agent header sent upstream
    pub user_agent: String,
    /// Attempt budget for primary providers
    pub retry_attempts: u32,
    /// Attempt budget for fallback providers
    pub fallback_attempts: u32,
    /// Fixed pause between two attempts
    pub retry_delay: Duration,
    pub providers: ProviderUrls,
    /// Run one sync cycle when the process starts
    pub sync_on_startup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/contests.sqlite"),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 2000)),
            log_level: "info".to_string(),
            http_timeout: Duration::from_secs(15),
            user_agent: "Mozilla/5.0".to_string(),
            retry_attempts: 3,
            fallback_attempts: 1,
            retry_delay: Duration::from_millis(1000),
            providers: ProviderUrls::default(),
            sync_on_startup: true,
        }
    }
}

/// Log filter from `CONTEST_LOG_LEVEL`.
///
/// Read on its own so logging can be installed before the rest of the
/// configuration is parsed and its warnings are not lost.
pub fn log_level_from_env() -> String {
    dotenvy::dotenv().ok();
    env::var("CONTEST_LOG_LEVEL").unwrap_or_else(|_| Config::default().log_level)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let db_path = env::var("CONTEST_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let bind_addr = parse_var("CONTEST_BIND_ADDR", defaults.bind_addr);

        let log_level = log_level_from_env();

        let http_timeout = Duration::from_secs(parse_var(
            "CONTEST_HTTP_TIMEOUT_SECS",
            defaults.http_timeout.as_secs(),
        ));

        let user_agent = env::var("CONTEST_USER_AGENT").unwrap_or(defaults.user_agent);

        // A zero budget would never issue a request.
        let retry_attempts = parse_var("CONTEST_RETRY_ATTEMPTS", defaults.retry_attempts).max(1);
        let fallback_attempts =
            parse_var("CONTEST_FALLBACK_ATTEMPTS", defaults.fallback_attempts).max(1);

        let retry_delay = Duration::from_millis(parse_var(
            "CONTEST_RETRY_DELAY_MS",
            defaults.retry_delay.as_millis() as u64,
        ));

        let providers = ProviderUrls {
            codeforces: env::var("CONTEST_CODEFORCES_URL")
                .unwrap_or(defaults.providers.codeforces),
            kontests: env::var("CONTEST_KONTESTS_URL").unwrap_or(defaults.providers.kontests),
            leetcode: env::var("CONTEST_LEETCODE_URL").unwrap_or(defaults.providers.leetcode),
            codechef: env::var("CONTEST_CODECHEF_URL").unwrap_or(defaults.providers.codechef),
        };

        let sync_on_startup = parse_var("CONTEST_SYNC_ON_STARTUP", defaults.sync_on_startup);

        Self {
            db_path,
            bind_addr,
            log_level,
            http_timeout,
            user_agent,
            retry_attempts,
            fallback_attempts,
            retry_delay,
            providers,
            sync_on_startup,
        }
    }
}

/// Read and parse a variable, keeping the default when it is unset or invalid.
fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid {} value {:?}, using {:?}", name, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
