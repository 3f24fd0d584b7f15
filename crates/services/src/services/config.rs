use std::{net::SocketAddr, str::FromStr};

use assistant::LLMConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
    #[error("Invalid bind address {0}")]
    InvalidAddress(String),
}

/// Credentials for signed uploads to Cloudinary
#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Runtime settings, read once at startup
#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub llm: LLMConfig,
    pub session_ttl_days: i64,
    pub cookie_secure: bool,
    pub cors_origin: String,
    pub cloudinary: Option<CloudinaryConfig>,
    pub max_image_bytes: usize,
    pub ask_rate_limit_per_minute: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            database_url: None,
            llm: LLMConfig::default(),
            session_ttl_days: 30,
            cookie_secure: false,
            cors_origin: "http://localhost:5173".to_string(),
            cloudinary: None,
            max_image_bytes: 10 * 1024 * 1024,
            ask_rate_limit_per_minute: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Unset or blank variables fall back to
    /// defaults; values that fail to parse are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get("BACKEND_PORT").or_else(|| get("PORT")) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "PORT",
                    value: raw,
                })?,
            None => defaults.port,
        };

        let cloudinary = match (
            get("CLOUDINARY_CLOUD_NAME"),
            get("CLOUDINARY_API_KEY"),
            get("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            (None, None, None) => None,
            _ => {
                tracing::warn!(
                    "Cloudinary is partially configured; storing images on local disk instead"
                );
                None
            }
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            database_url: get("DATABASE_URL"),
            llm: LLMConfig {
                api_key: get("GEMINI_API_KEY"),
                model: get("GEMINI_MODEL"),
                api_base: get("GEMINI_API_BASE"),
                max_retries: parse_or(&get, "LLM_MAX_RETRIES", defaults.llm.max_retries)?,
                retry_delay_ms: parse_or(
                    &get,
                    "LLM_RETRY_DELAY_MS",
                    defaults.llm.retry_delay_ms,
                )?,
            },
            session_ttl_days: parse_or(&get, "SESSION_TTL_DAYS", defaults.session_ttl_days)?,
            cookie_secure: parse_bool(&get, "COOKIE_SECURE", defaults.cookie_secure)?,
            cors_origin: get("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            cloudinary,
            max_image_bytes: parse_or(&get, "MAX_IMAGE_BYTES", defaults.max_image_bytes)?,
            ask_rate_limit_per_minute: parse_or(
                &get,
                "ASK_RATE_LIMIT_PER_MINUTE",
                defaults.ask_rate_limit_per_minute,
            )?,
        })
    }

    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidAddress(raw))
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_ttl_days)
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        None => Ok(default),
    }
}

fn parse_bool<G>(get: &G, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(value) => Err(ConfigError::InvalidValue { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.session_ttl_days, 30);
        assert!(!config.cookie_secure);
        assert!(config.cloudinary.is_none());
        assert_eq!(config.max_image_bytes, 10_485_760);
        assert_eq!(config.ask_rate_limit_per_minute, 30);
        assert_eq!(config.bind_address().unwrap().to_string(), "127.0.0.1:8000");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "9000"),
            ("BACKEND_PORT", "9100"),
            ("COOKIE_SECURE", "TRUE"),
            ("SESSION_TTL_DAYS", "7"),
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9100);
        assert!(config.cookie_secure);
        assert_eq!(config.session_ttl(), chrono::Duration::days(7));
        assert_eq!(config.cloudinary.as_ref().unwrap().cloud_name, "demo");
        assert_eq!(config.bind_address().unwrap().to_string(), "0.0.0.0:9100");
    }

    #[test]
    fn test_partial_cloudinary_falls_back_to_local() {
        let config = Config::from_lookup(lookup(&[("CLOUDINARY_CLOUD_NAME", "demo")])).unwrap();
        assert!(config.cloudinary.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(ConfigError::InvalidValue { var: "PORT", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("COOKIE_SECURE", "maybe")])),
            Err(ConfigError::InvalidValue { var: "COOKIE_SECURE", .. })
        ));
        assert!(Config::from_lookup(lookup(&[("MAX_IMAGE_BYTES", "-1")])).is_err());
        assert!(matches!(
            Config::from_lookup(lookup(&[("LLM_MAX_RETRIES", "lots")])),
            Err(ConfigError::InvalidValue { var: "LLM_MAX_RETRIES", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("LLM_RETRY_DELAY_MS", "1.5")])),
            Err(ConfigError::InvalidValue { var: "LLM_RETRY_DELAY_MS", .. })
        ));
    }

    #[test]
    fn test_llm_settings_come_from_the_same_source() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_MODEL", "gemini-1.5-flash"),
            ("GEMINI_API_BASE", "  "),
            ("LLM_MAX_RETRIES", "5"),
            ("LLM_RETRY_DELAY_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.llm.api_key.as_deref(), Some("secret"));
        assert_eq!(config.llm.model.as_deref(), Some("gemini-1.5-flash"));
        assert!(config.llm.api_base.is_none());
        assert_eq!(config.llm.max_retries, 5);
        assert_eq!(config.llm.retry_delay(), std::time::Duration::from_millis(250));

        let defaults = Config::from_lookup(lookup(&[])).unwrap();
        assert!(defaults.llm.api_key.is_none());
        assert_eq!(defaults.llm.max_retries, assistant::brain::DEFAULT_MAX_RETRIES);
    }
}
