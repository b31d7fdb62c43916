use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "SNIP_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "SNIP_STORAGE_BACKEND";
pub const DB_PATH_ENV: &str = "SNIP_DB_PATH";
pub const BASE_URL_ENV: &str = "SNIP_BASE_URL";
pub const CACHE_CAPACITY_ENV: &str = "SNIP_CACHE_CAPACITY";
pub const LOG_BUFFER_ENV: &str = "SNIP_LOG_BUFFER";
pub const CLICK_BUFFER_ENV: &str = "SNIP_CLICK_BUFFER";
pub const SHORTEN_TIMEOUT_ENV: &str = "SNIP_SHORTEN_TIMEOUT_MS";
pub const RESOLVE_TIMEOUT_ENV: &str = "SNIP_RESOLVE_TIMEOUT_MS";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8384";
pub const DEFAULT_DB_PATH: &str = "./data/shortener.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "sqlite")]
    Sqlite,
    #[value(name = "in-memory")]
    InMemory,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::Sqlite => write!(f, "sqlite"),
            StorageBackendArg::InMemory => write!(f, "in-memory"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "snip-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::Sqlite
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = DB_PATH_ENV, default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// Public base for generated short URLs; derived from `Host` when unset.
    #[arg(long, env = BASE_URL_ENV)]
    pub base_url: Option<String>,

    #[arg(long, env = CACHE_CAPACITY_ENV, default_value_t = 100_000)]
    pub cache_capacity: usize,

    #[arg(long, env = LOG_BUFFER_ENV, default_value_t = 100)]
    pub log_buffer: usize,

    #[arg(long, env = CLICK_BUFFER_ENV, default_value_t = 1024)]
    pub click_buffer: usize,

    #[arg(long, env = SHORTEN_TIMEOUT_ENV, default_value_t = 500)]
    pub shorten_timeout_ms: u64,

    #[arg(long, env = RESOLVE_TIMEOUT_ENV, default_value_t = 200)]
    pub resolve_timeout_ms: u64,
}

impl CLI {
    pub fn shorten_timeout(&self) -> Duration {
        Duration::from_millis(self.shorten_timeout_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = CLI::try_parse_from(["gateway"]).unwrap();

        assert_eq!(cli.listen_addr, DEFAULT_LISTEN_ADDR.parse().unwrap());
        assert_eq!(cli.storage, StorageBackendArg::Sqlite);
        assert_eq!(cli.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(cli.base_url, None);
        assert_eq!(cli.cache_capacity, 100_000);
        assert_eq!(cli.log_buffer, 100);
        assert_eq!(cli.click_buffer, 1024);
        assert_eq!(cli.shorten_timeout(), Duration::from_millis(500));
        assert_eq!(cli.resolve_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn flags_override_defaults() {
        let cli = CLI::try_parse_from([
            "gateway",
            "--storage",
            "in-memory",
            "--listen-addr",
            "0.0.0.0:9000",
            "--base-url",
            "https://sn.ip",
            "--cache-capacity",
            "10",
        ])
        .unwrap();

        assert_eq!(cli.storage, StorageBackendArg::InMemory);
        assert_eq!(cli.listen_addr.port(), 9000);
        assert_eq!(cli.base_url.as_deref(), Some("https://sn.ip"));
        assert_eq!(cli.cache_capacity, 10);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(CLI::try_parse_from(["gateway", "--storage", "mysql"]).is_err());
    }
}
