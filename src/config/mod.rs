use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Fallback signing key used when neither the config file nor `JWT_SECRET` provide one.
/// Development only.
pub const INSECURE_JWT_SECRET: &str = "default_jwt_secret_change_this_in_production";

/// Fallback password for the bootstrap admin account. Development only.
pub const INSECURE_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_database_file")]
    pub database_file: String,
    /// Directory holding the HTML page stubs served to the browser client
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            templates_dir: default_templates_dir(),
            static_dir: default_static_dir(),
        }
    }
}

impl ServerConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_database_file() -> String {
    "pomonotes.db".to_string()
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC key used to sign session tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_admin_username")]
    pub default_admin_username: String,
    /// Password given to the bootstrap admin when no admin exists
    #[serde(default = "default_admin_password")]
    pub default_admin_password: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Allow anonymous visitors to create their own (non-admin) account
    #[serde(default)]
    pub allow_registration: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            default_admin_username: default_admin_username(),
            default_admin_password: default_admin_password(),
            token_ttl_hours: default_token_ttl_hours(),
            allow_registration: false,
        }
    }
}

fn default_jwt_secret() -> String {
    INSECURE_JWT_SECRET.to_string()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    INSECURE_ADMIN_PASSWORD.to_string()
}

fn default_token_ttl_hours() -> i64 {
    72
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Replace secrets with `JWT_SECRET` / `ADMIN_PASSWORD` when those are set and non-empty.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("JWT_SECRET").filter(|v| !v.is_empty()) {
            self.auth.jwt_secret = secret;
        }
        if let Some(password) = lookup("ADMIN_PASSWORD").filter(|v| !v.is_empty()) {
            self.auth.default_admin_password = password;
        }
    }

    /// Names of settings still carrying their hardcoded development fallback.
    pub fn insecure_defaults(&self) -> Vec<&'static str> {
        let mut found = Vec::new();
        if self.auth.jwt_secret == INSECURE_JWT_SECRET {
            found.push("auth.jwt_secret");
        }
        if self.auth.default_admin_password == INSECURE_ADMIN_PASSWORD {
            found.push("auth.default_admin_password");
        }
        found
    }
}
