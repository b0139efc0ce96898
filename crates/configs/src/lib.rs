//! # configs
//!
//! Process-wide settings, loaded once at startup and handed to adapters
//! explicitly. Sources, lowest precedence first:
//!
//! 1. built-in defaults,
//! 2. `config/postline.{toml,yaml,json}` if present,
//! 3. `POSTLINE__SECTION__KEY` environment variables (a `.env` file is read
//!    first, if one exists).

use config::{Config, ConfigBuilder, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

/// Signing secret used when none is configured. Never deploy with it.
pub const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub log: LogSettings,
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub smtp: SmtpSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Path prefix the post routes are nested under (e.g. "/api").
    pub api_prefix: String,
    /// Allowed CORS origin; `None` allows any origin without credentials.
    pub cors_origin: Option<String>,
    /// JSON bodies carry inline images, hence the generous limit.
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set.
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Postgres URL. Without one the binary runs on in-memory storage.
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    pub backend: MediaBackend,
    pub local_root: String,
    pub local_url_prefix: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_key_prefix: String,
    pub s3_public_base_url: Option<String>,
    /// Upper bound on a best-effort media delete.
    pub delete_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    /// Empty host means notifications are only logged.
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub from: String,
    pub starttls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
}

impl Settings {
    /// Defaults for every key, so a bare environment still starts a dev server.
    pub fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, SettingsError> {
        Ok(Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("server.api_prefix", "/api")?
            .set_default("server.body_limit_bytes", 50 * 1024 * 1024)?
            .set_default("log.filter", "info,tower_http=info")?
            .set_default("log.json", false)?
            .set_default("database.max_connections", 10)?
            .set_default("media.backend", "local")?
            .set_default("media.local_root", "./data/uploads")?
            .set_default("media.local_url_prefix", "/static/uploads")?
            .set_default("media.s3_key_prefix", "posts")?
            .set_default("media.delete_timeout_ms", 5_000)?
            .set_default("smtp.host", "")?
            .set_default("smtp.port", 587)?
            .set_default("smtp.from", "Postline <noreply@localhost>")?
            .set_default("smtp.starttls", true)?
            .set_default("auth.jwt_secret", DEV_JWT_SECRET)?)
    }

    /// Loads `.env`, the optional config file and the environment.
    pub fn load() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        let builder = Self::defaults()?
            .add_source(File::with_name("config/postline").required(false))
            .add_source(Environment::with_prefix("POSTLINE").separator("__"));
        Self::from_builder(builder)
    }

    pub fn from_builder(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, SettingsError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if !self.server.api_prefix.is_empty() && !self.server.api_prefix.starts_with('/') {
            return Err(SettingsError::Invalid(
                "server.api_prefix must start with '/'".into(),
            ));
        }
        if self.media.backend == MediaBackend::S3
            && (self.media.s3_bucket.is_none() || self.media.s3_public_base_url.is_none())
        {
            return Err(SettingsError::Invalid(
                "media.backend = s3 requires media.s3_bucket and media.s3_public_base_url".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
