//! Configuration module
//!
//! Gateway settings are read from the environment (after loading an optional
//! `.env` file) and validated once at startup.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_ALLOWED_EXTENSIONS, MAX_TOKEN_LIFETIME_SECS};

const SERVER_PORT: u16 = 4000;
const PORT_FALLBACK_ATTEMPTS: u16 = 5;
const ENGINE_URL: &str = "http://localhost:5001";
const ENGINE_PREFERENCE_FILE: &str = ".sheetgate/preferred-engine";
const ENGINE_TIMEOUT_SECS: u64 = 5;
const ENGINE_READY_TIMEOUT_SECS: u64 = 30;
const JWT_SUBJECT: &str = "sheetgate-gateway";
const MAX_UPLOAD_SIZE_MB: usize = 50;
const MIN_JWT_SECRET_LEN: usize = 16;

/// How a declared MIME type that does not match the extension is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MimeStrictness {
    /// Mismatch is rejected with a 400.
    Strict,
    /// Mismatch is logged and the upload continues.
    Permissive,
}

impl FromStr for MimeStrictness {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(MimeStrictness::Strict),
            "permissive" | "lenient" => Ok(MimeStrictness::Permissive),
            other => Err(anyhow::anyhow!(
                "MIME_STRICTNESS must be 'strict' or 'permissive', got '{}'",
                other
            )),
        }
    }
}

impl fmt::Display for MimeStrictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MimeStrictness::Strict => write!(f, "strict"),
            MimeStrictness::Permissive => write!(f, "permissive"),
        }
    }
}

/// Gateway configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    /// Ports tried in sequence from `server_port` when one is already taken.
    pub port_fallback_attempts: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    /// Primary engine base URL; always the first configured candidate.
    pub engine_url: String,
    pub engine_fallback_urls: Vec<String>,
    /// `None` keeps the preferred engine in memory only.
    pub engine_preference_file: Option<PathBuf>,
    pub engine_timeout_secs: u64,
    pub engine_ready_timeout_secs: u64,
    pub jwt_secret: String,
    pub jwt_subject: String,
    pub jwt_expiry_secs: i64,
    pub max_upload_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub mime_strictness: MimeStrictness,
    pub transient_dir: PathBuf,
    pub local_json_fallback: bool,
}

impl Config {
    /// Configuration with every default applied and the given signing secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            server_port: SERVER_PORT,
            port_fallback_attempts: PORT_FALLBACK_ATTEMPTS,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            engine_url: ENGINE_URL.to_string(),
            engine_fallback_urls: Vec::new(),
            engine_preference_file: None,
            engine_timeout_secs: ENGINE_TIMEOUT_SECS,
            engine_ready_timeout_secs: ENGINE_READY_TIMEOUT_SECS,
            jwt_secret: jwt_secret.into(),
            jwt_subject: JWT_SUBJECT.to_string(),
            jwt_expiry_secs: MAX_TOKEN_LIFETIME_SECS,
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            mime_strictness: MimeStrictness::Strict,
            transient_dir: env::temp_dir().join("sheetgate"),
            local_json_fallback: false,
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let engine_fallback_urls = split_list(&env::var("ENGINE_FALLBACK_URLS").unwrap_or_default());

        // Explicitly empty means "do not persist".
        let engine_preference_file = match env::var("ENGINE_PREFERENCE_FILE") {
            Ok(path) if path.trim().is_empty() => None,
            Ok(path) => Some(PathBuf::from(path.trim())),
            Err(_) => Some(PathBuf::from(ENGINE_PREFERENCE_FILE)),
        };

        let max_upload_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let allowed_extensions = env::var("ALLOWED_EXTENSIONS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                DEFAULT_ALLOWED_EXTENSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let mime_strictness = env::var("MIME_STRICTNESS")
            .unwrap_or_else(|_| "strict".to_string())
            .parse::<MimeStrictness>()?;

        let jwt_expiry_secs = env::var("JWT_EXPIRY_SECS")
            .unwrap_or_else(|_| MAX_TOKEN_LIFETIME_SECS.to_string())
            .parse::<i64>()
            .unwrap_or(MAX_TOKEN_LIFETIME_SECS)
            .clamp(1, MAX_TOKEN_LIFETIME_SECS);

        let config = Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            port_fallback_attempts: env::var("PORT_FALLBACK_ATTEMPTS")
                .unwrap_or_else(|_| PORT_FALLBACK_ATTEMPTS.to_string())
                .parse()
                .unwrap_or(PORT_FALLBACK_ATTEMPTS),
            environment,
            cors_origins,
            engine_url: env::var("ENGINE_URL").unwrap_or_else(|_| ENGINE_URL.to_string()),
            engine_fallback_urls,
            engine_preference_file,
            engine_timeout_secs: env::var("ENGINE_TIMEOUT_SECS")
                .unwrap_or_else(|_| ENGINE_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(ENGINE_TIMEOUT_SECS),
            engine_ready_timeout_secs: env::var("ENGINE_READY_TIMEOUT_SECS")
                .unwrap_or_else(|_| ENGINE_READY_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(ENGINE_READY_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            jwt_subject: env::var("JWT_SUBJECT").unwrap_or_else(|_| JWT_SUBJECT.to_string()),
            jwt_expiry_secs,
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            allowed_extensions,
            mime_strictness,
            transient_dir: env::var("TRANSIENT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("sheetgate")),
            local_json_fallback: env::var("LOCAL_JSON_FALLBACK")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LEN
            ));
        }

        if self.engine_candidates().is_empty() {
            return Err(anyhow::anyhow!(
                "ENGINE_URL or ENGINE_FALLBACK_URLS must name at least one engine"
            ));
        }

        for url in self.engine_candidates() {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow::anyhow!(
                    "Engine URL '{}' must start with http:// or https://",
                    url
                ));
            }
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }

        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_EXTENSIONS must contain at least one extension"
            ));
        }

        if self.port_fallback_attempts == 0 {
            return Err(anyhow::anyhow!("PORT_FALLBACK_ATTEMPTS must be at least 1"));
        }

        if self.engine_timeout_secs == 0 {
            return Err(anyhow::anyhow!("ENGINE_TIMEOUT_SECS must be greater than 0"));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Configured engine base URLs in order: `ENGINE_URL` first, then fallbacks.
    pub fn engine_candidates(&self) -> Vec<String> {
        std::iter::once(self.engine_url.trim().to_string())
            .chain(self.engine_fallback_urls.iter().map(|u| u.trim().to_string()))
            .filter(|u| !u.is_empty())
            .collect()
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    pub fn engine_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_ready_timeout_secs)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::with_secret("0123456789abcdef");
        assert_eq!(config.server_port, 4000);
        assert_eq!(config.port_fallback_attempts, 5);
        assert_eq!(config.max_upload_size_bytes, 50 * 1024 * 1024);
        assert_eq!(config.engine_candidates(), vec!["http://localhost:5001"]);
        assert_eq!(config.mime_strictness, MimeStrictness::Strict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = Config::with_secret("short");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_candidates_keep_configured_order() {
        let mut config = Config::with_secret("0123456789abcdef");
        config.engine_url = "http://a:1".to_string();
        config.engine_fallback_urls = vec![" http://b:2 ".to_string(), "http://c:3".to_string()];
        assert_eq!(
            config.engine_candidates(),
            vec!["http://a:1", "http://b:2", "http://c:3"]
        );
    }

    #[test]
    fn test_zero_port_attempts_rejected() {
        let mut config = Config::with_secret("0123456789abcdef");
        config.port_fallback_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_engine_scheme_rejected() {
        let mut config = Config::with_secret("0123456789abcdef");
        config.engine_url = "ftp://engine".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mime_strictness_parse() {
        assert_eq!(
            "Permissive".parse::<MimeStrictness>().unwrap(),
            MimeStrictness::Permissive
        );
        assert_eq!(
            " strict ".parse::<MimeStrictness>().unwrap(),
            MimeStrictness::Strict
        );
        assert!("loose".parse::<MimeStrictness>().is_err());
    }

    #[test]
    fn test_split_list_drops_blanks() {
        assert_eq!(split_list("a, ,b,"), vec!["a", "b"]);
        assert!(split_list("").is_empty());
    }
}
