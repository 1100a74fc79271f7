//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::upstream::BearerToken;
use crate::cache::{CacheBackend, CacheConfig, DEFAULT_MEMORY_CAPACITY, DEFAULT_REDIS_URL};

pub use cli::{BootstrapArgs, CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "trendcache";
const ENV_PREFIX: &str = "TRENDCACHE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost", "http://localhost:3000"];
const DEFAULT_SINK_URL: &str = "http://127.0.0.1:9200";
const DEFAULT_SINK_INDEX: &str = "gateway-logs";
const DEFAULT_SERVICE_NAME: &str = "trendcache";
const DEFAULT_UPSTREAM_BASE_URL: &str = "https://oauth.reddit.com";
const DEFAULT_USER_AGENT: &str = concat!("trendcache/", env!("CARGO_PKG_VERSION"));
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SEARCH_URL: &str = "http://127.0.0.1:9200";
const DEFAULT_POSTS_INDEX: &str = "posts";
const DEFAULT_WAIT_ATTEMPTS: u32 = 30;
const DEFAULT_WAIT_INTERVAL_MS: u64 = 1000;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheConfig,
    pub upstream: UpstreamSettings,
    pub search: SearchSettings,
    pub startup: StartupSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
    pub sink: LogSinkSettings,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Remote log shipping target.
#[derive(Debug, Clone)]
pub struct LogSinkSettings {
    pub enabled: bool,
    pub url: Url,
    pub index: String,
    pub service_name: String,
}

#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub base_url: Url,
    pub token: Option<BearerToken>,
    pub user_agent: String,
    pub timeout: Duration,
}

impl UpstreamSettings {
    /// The configured bearer token; serving without one is a configuration error.
    pub fn credential(&self) -> Result<BearerToken, LoadError> {
        self.token.clone().ok_or_else(|| {
            LoadError::invalid(
                "upstream.token",
                "a bearer token is required to serve (set TRENDCACHE__UPSTREAM__TOKEN)",
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub url: Url,
    pub posts_index: String,
}

#[derive(Debug, Clone)]
pub struct StartupSettings {
    pub wait_attempts: u32,
    pub wait_interval: Duration,
    pub bootstrap_on_serve: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("server.cors_origins")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Bootstrap(args)) => raw.apply_bootstrap_overrides(args),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    upstream: RawUpstreamSettings,
    search: RawSearchSettings,
    startup: RawStartupSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(token) = overrides.upstream_token.as_ref() {
            self.upstream.token = Some(token.clone());
        }
    }

    fn apply_bootstrap_overrides(&mut self, overrides: &BootstrapArgs) {
        if let Some(url) = overrides.search_url.as_ref() {
            self.search.url = Some(url.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            upstream,
            search,
            startup,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            upstream: build_upstream_settings(upstream)?,
            search: build_search_settings(search)?,
            startup: build_startup_settings(startup)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let cors_origins = server.cors_origins.unwrap_or_else(|| {
        DEFAULT_CORS_ORIGINS
            .iter()
            .map(|origin| origin.to_string())
            .collect()
    });
    if cors_origins.iter().any(|origin| origin.trim().is_empty()) {
        return Err(LoadError::invalid(
            "server.cors_origins",
            "origins must not be empty",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        cors_origins,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    let sink = logging.sink;
    let sink = LogSinkSettings {
        enabled: sink.enabled.unwrap_or(false),
        url: parse_http_url(
            "logging.sink.url",
            sink.url.as_deref().unwrap_or(DEFAULT_SINK_URL),
        )?,
        index: non_empty(
            "logging.sink.index",
            sink.index,
            DEFAULT_SINK_INDEX,
        )?,
        service_name: non_empty(
            "logging.sink.service_name",
            sink.service_name,
            DEFAULT_SERVICE_NAME,
        )?,
    };

    Ok(LoggingSettings {
        level,
        format,
        sink,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheConfig, LoadError> {
    let backend = match cache.backend {
        Some(value) => CacheBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("cache.backend", reason))?,
        None => CacheBackend::Redis,
    };

    let redis_url = cache
        .redis_url
        .map(|url| url.trim().to_string())
        .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
    if backend == CacheBackend::Redis && redis_url.is_empty() {
        return Err(LoadError::invalid(
            "cache.redis_url",
            "required when the redis backend is selected",
        ));
    }

    let memory_capacity = cache.memory_capacity.unwrap_or(DEFAULT_MEMORY_CAPACITY);
    if memory_capacity == 0 {
        return Err(LoadError::invalid(
            "cache.memory_capacity",
            "must be greater than zero",
        ));
    }

    Ok(CacheConfig {
        backend,
        redis_url,
        memory_capacity,
    })
}

fn build_upstream_settings(upstream: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let base_url = parse_http_url(
        "upstream.base_url",
        upstream
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_UPSTREAM_BASE_URL),
    )?;

    let token = upstream.token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| BearerToken::new(trimmed))
    });

    let user_agent = non_empty("upstream.user_agent", upstream.user_agent, DEFAULT_USER_AGENT)?;

    let timeout_secs = upstream
        .timeout_seconds
        .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "upstream.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(UpstreamSettings {
        base_url,
        token,
        user_agent,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_search_settings(search: RawSearchSettings) -> Result<SearchSettings, LoadError> {
    Ok(SearchSettings {
        url: parse_http_url(
            "search.url",
            search.url.as_deref().unwrap_or(DEFAULT_SEARCH_URL),
        )?,
        posts_index: non_empty("search.posts_index", search.posts_index, DEFAULT_POSTS_INDEX)?,
    })
}

fn build_startup_settings(startup: RawStartupSettings) -> Result<StartupSettings, LoadError> {
    let wait_attempts = startup.wait_attempts.unwrap_or(DEFAULT_WAIT_ATTEMPTS);
    if wait_attempts == 0 {
        return Err(LoadError::invalid(
            "startup.wait_attempts",
            "must be greater than zero",
        ));
    }

    let interval_ms = startup
        .wait_interval_ms
        .unwrap_or(DEFAULT_WAIT_INTERVAL_MS);
    if interval_ms == 0 {
        return Err(LoadError::invalid(
            "startup.wait_interval_ms",
            "must be greater than zero",
        ));
    }

    Ok(StartupSettings {
        wait_attempts,
        wait_interval: Duration::from_millis(interval_ms),
        bootstrap_on_serve: startup.bootstrap_on_serve.unwrap_or(true),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    cors_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
    sink: RawLogSinkSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLogSinkSettings {
    enabled: Option<bool>,
    url: Option<String>,
    index: Option<String>,
    service_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    redis_url: Option<String>,
    memory_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    base_url: Option<String>,
    token: Option<String>,
    user_agent: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSearchSettings {
    url: Option<String>,
    posts_index: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStartupSettings {
    wait_attempts: Option<u32>,
    wait_interval_ms: Option<u64>,
    bootstrap_on_serve: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_http_url(key: &'static str, value: &str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid url `{value}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            key,
            format!("unsupported scheme `{}` (expected http or https)", url.scheme()),
        ));
    }
    Ok(url)
}

fn non_empty(
    key: &'static str,
    value: Option<String>,
    default: &str,
) -> Result<String, LoadError> {
    let value = value.unwrap_or_else(|| default.to_string());
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.addr.to_string(), "127.0.0.1:8000");
        assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
        assert_eq!(
            settings.server.cors_origins,
            vec!["http://localhost", "http://localhost:3000"]
        );
        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert!(!settings.logging.sink.enabled);
        assert_eq!(settings.logging.sink.index, "gateway-logs");
        assert_eq!(settings.cache.backend, CacheBackend::Redis);
        assert_eq!(settings.cache.memory_capacity, 1024);
        assert_eq!(settings.cache.redis_url, CacheConfig::default().redis_url);
        assert_eq!(settings.upstream.base_url.as_str(), "https://oauth.reddit.com/");
        assert!(settings.upstream.token.is_none());
        assert!(settings.upstream.user_agent.starts_with("trendcache/"));
        assert_eq!(settings.upstream.timeout, Duration::from_secs(5));
        assert_eq!(settings.search.posts_index, "posts");
        assert_eq!(settings.startup.wait_attempts, 30);
        assert!(settings.startup.bootstrap_on_serve);
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());
        raw.cache.backend = Some("redis".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            cache_backend: Some("memory".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert_eq!(settings.cache.backend, CacheBackend::Memory);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn credential_requires_token() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        let err = settings.upstream.credential().expect_err("missing token");
        assert!(matches!(err, LoadError::Invalid { key: "upstream.token", .. }));

        let mut raw = RawSettings::default();
        raw.apply_serve_overrides(&ServeOverrides {
            upstream_token: Some("  abc123 ".to_string()),
            ..Default::default()
        });
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(
            settings.upstream.credential().expect("token").expose(),
            "abc123"
        );
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let mut raw = RawSettings::default();
        raw.upstream.token = Some("   ".to_string());
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(settings.upstream.token.is_none());
    }

    #[test]
    fn rejects_invalid_values() {
        let cases: [(fn(&mut RawSettings), &str); 6] = [
            (|raw| raw.server.port = Some(0), "server.port"),
            (|raw| raw.logging.level = Some("loud".to_string()), "logging.level"),
            (|raw| raw.cache.backend = Some("memcached".to_string()), "cache.backend"),
            (|raw| raw.cache.memory_capacity = Some(0), "cache.memory_capacity"),
            (|raw| raw.upstream.base_url = Some("ftp://example.test".to_string()), "upstream.base_url"),
            (|raw| raw.startup.wait_attempts = Some(0), "startup.wait_attempts"),
        ];

        for (mutate, expected_key) in cases {
            let mut raw = RawSettings::default();
            mutate(&mut raw);
            match Settings::from_raw(raw) {
                Err(LoadError::Invalid { key, .. }) => assert_eq!(key, expected_key),
                other => panic!("expected invalid `{expected_key}`, got {other:?}"),
            }
        }
    }

    #[test]
    fn bootstrap_overrides_apply() {
        let mut raw = RawSettings::default();
        raw.apply_bootstrap_overrides(&BootstrapArgs {
            search_url: Some("http://search.internal:9200".to_string()),
            redis_url: Some("redis://cache.internal:6379/1".to_string()),
        });
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.search.url.host_str(), Some("search.internal"));
        assert_eq!(settings.cache.redis_url, "redis://cache.internal:6379/1");
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["trendcache"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "trendcache",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--cache-backend",
            "memory",
            "--log-json",
            "true",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(serve.overrides.cache_backend.as_deref(), Some("memory"));
                assert_eq!(serve.overrides.log_json, Some(true));
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_bootstrap_arguments() {
        let args = CliArgs::parse_from([
            "trendcache",
            "bootstrap",
            "--search-url",
            "http://search:9200",
        ]);

        match args.command.expect("bootstrap command") {
            Command::Bootstrap(bootstrap) => {
                assert_eq!(bootstrap.search_url.as_deref(), Some("http://search:9200"));
                assert!(bootstrap.redis_url.is_none());
            }
            _ => panic!("wrong command parsed"),
        }
    }
}
