//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    collections::HashMap, fmt, net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{CacheConfig, CacheProviderKind, DiagnosticsConfig, EndpointTtl, KeyDisplayMode};

pub use cli::{
    CacheOverrides, CliArgs, Command, DatabaseOverride, MigrateArgs, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "talentdesk";
const ENV_PREFIX: &str = "TALENTDESK";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: AppEnvironment,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub cache: CacheConfig,
    /// Non-fatal problems found while loading, reported once logging is up.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnvironment {
    Development,
    #[default]
    Production,
}

impl AppEnvironment {
    pub fn as_str(self) -> &'static str {
        match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
        }
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppEnvironment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(AppEnvironment::Development),
            "production" | "prod" | "staging" => Ok(AppEnvironment::Production),
            other => Err(format!("unknown environment `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub admin_tokens: Vec<AdminToken>,
}

/// A bearer token granting the administrative role.
#[derive(Clone)]
pub struct AdminToken {
    pub name: String,
    pub token: String,
}

impl fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminToken")
            .field("name", &self.name)
            .field("token", &"<redacted>")
            .finish()
    }
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

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
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
    environment: Option<String>,
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    auth: RawAuthSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(environment) = overrides.environment.as_ref() {
            self.environment = Some(environment.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }

        self.apply_database_override(&overrides.database);
        self.apply_cache_overrides(&overrides.cache);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }

    fn apply_cache_overrides(&mut self, overrides: &CacheOverrides) {
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(disable) = overrides.cache_disable {
            self.cache.disable_cache = Some(disable);
        }
        if let Some(provider) = overrides.cache_provider.as_ref() {
            self.cache.provider = Some(provider.clone());
        }
        if let Some(emit) = overrides.cache_diagnostics {
            self.cache.diagnostics.emit_headers = Some(emit);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            environment,
            server,
            logging,
            database,
            auth,
            cache,
        } = raw;

        let environment = match environment {
            Some(value) => value
                .parse()
                .map_err(|reason| LoadError::invalid("environment", reason))?,
            None => AppEnvironment::default(),
        };
        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let auth = build_auth_settings(auth)?;

        let mut warnings = Vec::new();
        let cache = build_cache_settings(cache, environment, &mut warnings);

        Ok(Self {
            environment,
            server,
            logging,
            database,
            auth,
            cache,
            warnings,
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

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
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

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let admin_tokens = auth
        .admin_tokens
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let token = non_blank(raw.token).ok_or_else(|| {
                LoadError::invalid("auth.admin_tokens", format!("entry {index} has no token"))
            })?;
            let name = non_blank(raw.name).unwrap_or_else(|| format!("admin-{index}"));
            Ok(AdminToken { name, token })
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    Ok(AuthSettings { admin_tokens })
}

// Cache settings never fail the load: a malformed value is reported and the
// documented default is used instead.
fn build_cache_settings(
    cache: RawCacheSettings,
    environment: AppEnvironment,
    warnings: &mut Vec<String>,
) -> CacheConfig {
    let defaults = CacheConfig::default();

    let provider = match cache.provider.as_deref().map(str::trim) {
        None | Some("") => defaults.provider,
        Some(value) if value.eq_ignore_ascii_case("memory") => CacheProviderKind::Memory,
        Some(value) if value.eq_ignore_ascii_case("distributed") => CacheProviderKind::Distributed,
        Some(value) => {
            warnings.push(format!(
                "cache.provider `{value}` is not recognized; using memory"
            ));
            CacheProviderKind::Memory
        }
    };

    let key_display_mode = match cache.diagnostics.key_display_mode.as_deref().map(str::trim) {
        None | Some("") => defaults.diagnostics.key_display_mode,
        Some(value) if value.eq_ignore_ascii_case("raw") => KeyDisplayMode::Raw,
        Some(value) if value.eq_ignore_ascii_case("hash") => KeyDisplayMode::Hash,
        Some(value) => {
            warnings.push(format!(
                "cache.diagnostics.key_display_mode `{value}` is not recognized; using hash"
            ));
            KeyDisplayMode::Hash
        }
    };

    let mut config = CacheConfig::default();
    config.enabled = cache.enabled.unwrap_or(defaults.enabled);
    config.disable_cache = cache.disable_cache.unwrap_or(defaults.disable_cache);
    config.default_ttl_seconds = lenient_seconds(
        cache.default_ttl_seconds,
        "cache.default_ttl_seconds",
        defaults.default_ttl_seconds,
        warnings,
    );
    config.provider = provider;
    config.distributed_connection_string = non_blank(cache.distributed_connection_string);
    config.memory_entry_limit = lenient_count(
        cache.memory_entry_limit,
        "cache.memory_entry_limit",
        defaults.memory_entry_limit,
        warnings,
    );
    if let Some(prefix) = cache.key_prefix {
        config.key_prefix = prefix.trim().trim_end_matches(':').to_string();
    }
    config.index_ttl_seconds = lenient_seconds(
        cache.index_ttl_seconds,
        "cache.index_ttl_seconds",
        defaults.index_ttl_seconds,
        warnings,
    );
    config.diagnostics = DiagnosticsConfig {
        emit_headers: cache
            .diagnostics
            .emit_headers
            .unwrap_or(defaults.diagnostics.emit_headers),
        status_header: header_name(
            cache.diagnostics.status_header,
            "cache.diagnostics.status_header",
            defaults.diagnostics.status_header,
            warnings,
        ),
        key_header: header_name(
            cache.diagnostics.key_header,
            "cache.diagnostics.key_header",
            defaults.diagnostics.key_header,
            warnings,
        ),
        duration_header: header_name(
            cache.diagnostics.duration_header,
            "cache.diagnostics.duration_header",
            defaults.diagnostics.duration_header,
            warnings,
        ),
        key_display_mode,
    };
    config.environment = environment;

    for (endpoint, ttl) in cache.endpoints {
        let absolute_seconds = ttl.absolute_seconds.and_then(|value| {
            parse_optional_seconds(&value, &endpoint, "absolute_seconds", warnings)
        });
        let sliding_seconds = ttl.sliding_seconds.and_then(|value| {
            parse_optional_seconds(&value, &endpoint, "sliding_seconds", warnings)
        });
        config.set_endpoint(
            &endpoint,
            EndpointTtl {
                absolute_seconds,
                sliding_seconds,
            },
        );
    }

    config
}

fn lenient_seconds(
    value: Option<String>,
    key: &str,
    default: i64,
    warnings: &mut Vec<String>,
) -> i64 {
    let Some(value) = value else {
        return default;
    };
    match value.trim().parse::<i64>() {
        Ok(seconds) => seconds,
        Err(_) => {
            warnings.push(format!("{key} `{value}` is not a number; using {default}"));
            default
        }
    }
}

fn lenient_count(
    value: Option<String>,
    key: &str,
    default: usize,
    warnings: &mut Vec<String>,
) -> usize {
    let Some(value) = value else {
        return default;
    };
    match value.trim().parse::<usize>() {
        Ok(count) if count > 0 => count,
        _ => {
            warnings.push(format!(
                "{key} `{value}` is not a positive number; using {default}"
            ));
            default
        }
    }
}

fn parse_optional_seconds(
    value: &str,
    endpoint: &str,
    field: &str,
    warnings: &mut Vec<String>,
) -> Option<i64> {
    match value.trim().parse::<i64>() {
        Ok(seconds) => Some(seconds),
        Err(_) => {
            warnings.push(format!(
                "cache.endpoints.{endpoint}.{field} `{value}` is not a number; ignoring"
            ));
            None
        }
    }
}

fn header_name(
    value: Option<String>,
    key: &str,
    default: String,
    warnings: &mut Vec<String>,
) -> String {
    let Some(value) = non_blank(value) else {
        return default;
    };
    if axum::http::HeaderName::from_bytes(value.as_bytes()).is_ok() {
        value
    } else {
        warnings.push(format!(
            "{key} `{value}` is not a valid header name; using {default}"
        ));
        default
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    admin_tokens: Vec<RawAdminToken>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAdminToken {
    name: Option<String>,
    token: Option<String>,
}

// Numeric cache values are read as strings so that a malformed value can fall
// back to its default instead of failing deserialization.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    disable_cache: Option<bool>,
    default_ttl_seconds: Option<String>,
    provider: Option<String>,
    distributed_connection_string: Option<String>,
    memory_entry_limit: Option<String>,
    key_prefix: Option<String>,
    index_ttl_seconds: Option<String>,
    endpoints: HashMap<String, RawEndpointTtl>,
    diagnostics: RawDiagnosticsSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEndpointTtl {
    absolute_seconds: Option<String>,
    sliding_seconds: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDiagnosticsSettings {
    emit_headers: Option<bool>,
    status_header: Option<String>,
    key_header: Option<String>,
    duration_header: Option<String>,
    key_display_mode: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
