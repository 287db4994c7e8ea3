use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use medi_core::AppError;
use medi_core::upload::DEFAULT_MAX_UPLOAD_BYTES;

/// Server settings read from `MEDI_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub upload_dir: PathBuf,
    pub upload_max_bytes: u64,
    pub session_ttl: Duration,
    /// Add the `Secure` attribute to the session cookie.
    pub cookie_secure: bool,
    pub stats_ttl: Duration,
    pub stats_sweep_interval: Duration,
    pub ai_api_key: Option<String>,
    pub ai_model: String,
    pub ai_base_url: String,
    pub identity_api_key: String,
    pub identity_base_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let identity_api_key = std::env::var("MEDI_IDENTITY_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AppError::ConfigError(
                    "MEDI_IDENTITY_API_KEY not set. Required to verify sign-ins.".into(),
                )
            })?;

        let session_hours: u64 = parse_var("MEDI_SESSION_TTL_HOURS", 336)?;
        let stats_secs: u64 = parse_var("MEDI_STATS_TTL_SECS", 300)?;
        let sweep_secs: u64 = parse_var("MEDI_STATS_SWEEP_SECS", 60)?;
        let upload_max_bytes: u64 = parse_var("MEDI_UPLOAD_MAX_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        for (name, value) in [
            ("MEDI_SESSION_TTL_HOURS", session_hours),
            ("MEDI_STATS_TTL_SECS", stats_secs),
            ("MEDI_STATS_SWEEP_SECS", sweep_secs),
            ("MEDI_UPLOAD_MAX_BYTES", upload_max_bytes),
        ] {
            if value == 0 {
                return Err(AppError::ConfigError(format!("{name} must be at least 1")));
            }
        }

        Ok(Self {
            port: parse_var("MEDI_SERVER_PORT", 3000)?,
            upload_dir: std::env::var("MEDI_UPLOAD_DIR")
                .unwrap_or_else(|_| "./uploads".into())
                .into(),
            upload_max_bytes,
            session_ttl: Duration::from_secs(session_hours * 3600),
            cookie_secure: parse_var("MEDI_COOKIE_SECURE", true)?,
            stats_ttl: Duration::from_secs(stats_secs),
            stats_sweep_interval: Duration::from_secs(sweep_secs),
            ai_api_key: std::env::var("MEDI_AI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            ai_model: std::env::var("MEDI_AI_MODEL")
                .unwrap_or_else(|_| medi_client::llm::DEFAULT_MODEL.into()),
            ai_base_url: std::env::var("MEDI_AI_BASE_URL")
                .unwrap_or_else(|_| medi_client::llm::DEFAULT_BASE_URL.into()),
            identity_api_key,
            identity_base_url: std::env::var("MEDI_IDENTITY_BASE_URL")
                .unwrap_or_else(|_| medi_client::identity::DEFAULT_BASE_URL.into()),
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::ConfigError(format!("Invalid {name} '{raw}'"))),
    }
}
