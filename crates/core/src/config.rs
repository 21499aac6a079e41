use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub classifier: ClassifierConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub base_url: String,
    pub access_token: SecretString,
    pub location_id: Option<String>,
    pub allowed_variants: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub backend: ClassifierBackend,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub similarity_threshold: f64,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    Keyword,
    Embedding,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub catalog_base_url: Option<String>,
    pub catalog_access_token: Option<String>,
    pub catalog_location_id: Option<String>,
    pub classifier_backend: Option<ClassifierBackend>,
    pub classifier_model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://orderly.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            catalog: CatalogConfig {
                base_url: "https://connect.squareupsandbox.com".to_string(),
                access_token: String::new().into(),
                location_id: None,
                allowed_variants: Vec::new(),
                timeout_secs: 10,
            },
            classifier: ClassifierConfig {
                backend: ClassifierBackend::Keyword,
                api_key: None,
                base_url: None,
                model: "text-embedding-3-small".to_string(),
                similarity_threshold: 0.3,
                timeout_secs: 10,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ClassifierBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "embedding" => Ok(Self::Embedding),
            other => Err(ConfigError::Validation(format!(
                "unsupported classifier backend `{other}` (expected keyword|embedding)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("orderly.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(base_url) = catalog.base_url {
                self.catalog.base_url = base_url;
            }
            if let Some(access_token_value) = catalog.access_token {
                self.catalog.access_token = secret_value(access_token_value);
            }
            if let Some(location_id) = catalog.location_id {
                self.catalog.location_id = Some(location_id);
            }
            if let Some(allowed_variants) = catalog.allowed_variants {
                self.catalog.allowed_variants = allowed_variants;
            }
            if let Some(timeout_secs) = catalog.timeout_secs {
                self.catalog.timeout_secs = timeout_secs;
            }
        }

        if let Some(classifier) = patch.classifier {
            if let Some(backend) = classifier.backend {
                self.classifier.backend = backend;
            }
            if let Some(api_key_value) = classifier.api_key {
                self.classifier.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = classifier.base_url {
                self.classifier.base_url = Some(base_url);
            }
            if let Some(model) = classifier.model {
                self.classifier.model = model;
            }
            if let Some(similarity_threshold) = classifier.similarity_threshold {
                self.classifier.similarity_threshold = similarity_threshold;
            }
            if let Some(timeout_secs) = classifier.timeout_secs {
                self.classifier.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ORDERLY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ORDERLY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("ORDERLY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ORDERLY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ORDERLY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERLY_CATALOG_BASE_URL") {
            self.catalog.base_url = value;
        }
        if let Some(value) = read_env("ORDERLY_CATALOG_ACCESS_TOKEN") {
            self.catalog.access_token = secret_value(value);
        }
        if let Some(value) = read_env("ORDERLY_CATALOG_LOCATION_ID") {
            self.catalog.location_id = Some(value);
        }
        if let Some(value) = read_env("ORDERLY_CATALOG_ALLOWED_VARIANTS") {
            self.catalog.allowed_variants = value
                .split(',')
                .map(str::trim)
                .filter(|variant| !variant.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = read_env("ORDERLY_CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = parse_u64("ORDERLY_CATALOG_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERLY_CLASSIFIER_BACKEND") {
            self.classifier.backend = value.parse()?;
        }
        if let Some(value) = read_env("ORDERLY_CLASSIFIER_API_KEY") {
            self.classifier.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ORDERLY_CLASSIFIER_BASE_URL") {
            self.classifier.base_url = Some(value);
        }
        if let Some(value) = read_env("ORDERLY_CLASSIFIER_MODEL") {
            self.classifier.model = value;
        }
        if let Some(value) = read_env("ORDERLY_CLASSIFIER_SIMILARITY_THRESHOLD") {
            self.classifier.similarity_threshold =
                parse_f64("ORDERLY_CLASSIFIER_SIMILARITY_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("ORDERLY_CLASSIFIER_TIMEOUT_SECS") {
            self.classifier.timeout_secs = parse_u64("ORDERLY_CLASSIFIER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERLY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ORDERLY_SERVER_PORT") {
            self.server.port = parse_u16("ORDERLY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("ORDERLY_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("ORDERLY_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("ORDERLY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("ORDERLY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("ORDERLY_LOGGING_LEVEL").or_else(|| read_env("ORDERLY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ORDERLY_LOGGING_FORMAT").or_else(|| read_env("ORDERLY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(catalog_base_url) = overrides.catalog_base_url {
            self.catalog.base_url = catalog_base_url;
        }
        if let Some(catalog_access_token) = overrides.catalog_access_token {
            self.catalog.access_token = secret_value(catalog_access_token);
        }
        if let Some(catalog_location_id) = overrides.catalog_location_id {
            self.catalog.location_id = Some(catalog_location_id);
        }
        if let Some(classifier_backend) = overrides.classifier_backend {
            self.classifier.backend = classifier_backend;
        }
        if let Some(classifier_model) = overrides.classifier_model {
            self.classifier.model = classifier_model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_catalog(&self.catalog)?;
        validate_classifier(&self.classifier)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("orderly.toml"), PathBuf::from("config/orderly.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if !catalog.base_url.starts_with("http://") && !catalog.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "catalog.base_url must start with http:// or https://".to_string(),
        ));
    }

    if catalog.access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "catalog.access_token is required. Set it in orderly.toml or via ORDERLY_CATALOG_ACCESS_TOKEN"
                .to_string(),
        ));
    }

    if catalog.timeout_secs == 0 || catalog.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "catalog.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_classifier(classifier: &ClassifierConfig) -> Result<(), ConfigError> {
    if classifier.timeout_secs == 0 || classifier.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "classifier.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(classifier.similarity_threshold > 0.0 && classifier.similarity_threshold <= 1.0) {
        return Err(ConfigError::Validation(
            "classifier.similarity_threshold must be in range (0.0, 1.0]".to_string(),
        ));
    }

    if classifier.backend == ClassifierBackend::Embedding {
        let missing_key = classifier
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing_key {
            return Err(ConfigError::Validation(
                "classifier.api_key is required for the embedding backend".to_string(),
            ));
        }

        let missing_url =
            classifier.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if missing_url {
            return Err(ConfigError::Validation(
                "classifier.base_url is required for the embedding backend".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.port == server.health_check_port {
        return Err(ConfigError::Validation(
            "server.port and server.health_check_port must differ".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    catalog: Option<CatalogPatch>,
    classifier: Option<ClassifierPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    base_url: Option<String>,
    access_token: Option<String>,
    location_id: Option<String>,
    allowed_variants: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    backend: Option<ClassifierBackend>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    similarity_threshold: Option<f64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
