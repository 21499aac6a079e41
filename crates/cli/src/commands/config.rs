use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use orderly_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "ORDERLY_DATABASE_URL"),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "ORDERLY_DATABASE_MAX_CONNECTIONS"),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", "ORDERLY_DATABASE_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "catalog.base_url",
        &config.catalog.base_url,
        source("catalog.base_url", "ORDERLY_CATALOG_BASE_URL"),
    ));
    lines.push(render_line(
        "catalog.access_token",
        &redact_token(config.catalog.access_token.expose_secret()),
        source("catalog.access_token", "ORDERLY_CATALOG_ACCESS_TOKEN"),
    ));
    lines.push(render_line(
        "catalog.location_id",
        config.catalog.location_id.as_deref().unwrap_or("<first active location>"),
        source("catalog.location_id", "ORDERLY_CATALOG_LOCATION_ID"),
    ));
    lines.push(render_line(
        "catalog.allowed_variants",
        &if config.catalog.allowed_variants.is_empty() {
            "<all>".to_string()
        } else {
            config.catalog.allowed_variants.join(",")
        },
        source("catalog.allowed_variants", "ORDERLY_CATALOG_ALLOWED_VARIANTS"),
    ));

    lines.push(render_line(
        "classifier.backend",
        &format!("{:?}", config.classifier.backend),
        source("classifier.backend", "ORDERLY_CLASSIFIER_BACKEND"),
    ));
    lines.push(render_line(
        "classifier.model",
        &config.classifier.model,
        source("classifier.model", "ORDERLY_CLASSIFIER_MODEL"),
    ));
    lines.push(render_line(
        "classifier.similarity_threshold",
        &config.classifier.similarity_threshold.to_string(),
        source("classifier.similarity_threshold", "ORDERLY_CLASSIFIER_SIMILARITY_THRESHOLD"),
    ));
    lines.push(render_line(
        "classifier.api_key",
        if config.classifier.api_key.is_some() { "<redacted>" } else { "<unset>" },
        source("classifier.api_key", "ORDERLY_CLASSIFIER_API_KEY"),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "ORDERLY_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "ORDERLY_SERVER_PORT"),
    ));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        source("server.health_check_port", "ORDERLY_SERVER_HEALTH_CHECK_PORT"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "ORDERLY_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "ORDERLY_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("orderly.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/orderly.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
