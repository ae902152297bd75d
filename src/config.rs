use anyhow::{Result, anyhow};
use std::env;
use tracing::{info, warn};

use crate::{log_system_event, log_validation};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Generative-language endpoint configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

/// Logging system configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            llm: LlmConfig::from_env()?,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env(),
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            api_key_masked = %mask_sensitive_data(&self.llm.api_key),
            llm_model = %self.llm.model,
            llm_base_url = %self.llm.base_url,
            llm_timeout_secs = self.llm.timeout_secs,
            llm_max_attempts = self.llm.max_attempts,
            server_address = %self.server.address(),
            cors_origins = ?self.server.cors_allowed_origins,
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            return Err(anyhow!("GEMINI_API_KEY must not be empty"));
        }

        if !self.llm.base_url.starts_with("http://") && !self.llm.base_url.starts_with("https://") {
            return Err(anyhow!("GEMINI_BASE_URL must start with 'http://' or 'https://'"));
        }

        if self.llm.timeout_secs == 0 {
            return Err(anyhow!("LLM_TIMEOUT_SECS must be greater than 0"));
        }

        if self.llm.max_attempts == 0 {
            return Err(anyhow!("LLM_MAX_ATTEMPTS must be greater than 0"));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.server.cors_allowed_origins.is_empty() {
            warn!("No CORS origins configured - browser clients will be rejected");
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl LlmConfig {
    fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY is not set in environment variables"))?;

        let base_url = env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string());

        let model = env::var("GEMINI_MODEL")
            .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());

        let timeout_secs = parse_env_number("LLM_TIMEOUT_SECS", 30)?;
        let max_attempts = parse_env_number("LLM_MAX_ATTEMPTS", 3)?;

        Ok(LlmConfig {
            api_key,
            base_url,
            model,
            timeout_secs,
            max_attempts,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port = parse_env_number("PORT", 5000)?;

        let host = env::var("HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let cors_allowed_origins = parse_origin_list(
            &env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        );

        Ok(ServerConfig {
            port,
            host,
            cors_allowed_origins,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info,quiz_backend=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY")
            .unwrap_or_else(|_| "logs".to_string());

        LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        }
    }
}

fn parse_env_number<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'. Must be a positive number", name, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    if data.len() <= 8 {
        "*".repeat(data.len())
    } else {
        format!("{}***{}", &data[..4], &data[data.len() - 4..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests below mutate process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn valid_config() -> Config {
        Config {
            llm: LlmConfig {
                api_key: "AIza-valid-test-key".to_string(),
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                model: DEFAULT_GEMINI_MODEL.to_string(),
                timeout_secs: 30,
                max_attempts: 3,
            },
            server: ServerConfig {
                port: 5000,
                host: "0.0.0.0".to_string(),
                cors_allowed_origins: vec!["http://localhost:5173".to_string()],
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_enabled: true,
                console_enabled: true,
                log_directory: "logs".to_string(),
            },
        }
    }

    #[test]
    fn test_mask_sensitive_data() {
        assert_eq!(mask_sensitive_data("short"), "*****");
        assert_eq!(mask_sensitive_data("AIzaSyD-1234567890abcd"), "AIza***abcd");
    }

    #[test]
    fn test_server_config_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::remove_var("PORT");
            env::remove_var("HOST");
            env::remove_var("CORS_ALLOWED_ORIGINS");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_invalid_port_parsing() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe { env::set_var("PORT", "not-a-number"); }
        let result = ServerConfig::from_env();
        assert!(result.is_err());

        unsafe { env::remove_var("PORT"); }
    }

    #[test]
    fn test_llm_config_requires_api_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe { env::remove_var("GEMINI_API_KEY"); }
        assert!(LlmConfig::from_env().is_err());

        unsafe {
            env::set_var("GEMINI_API_KEY", "test-key");
            env::remove_var("GEMINI_MODEL");
            env::remove_var("GEMINI_BASE_URL");
            env::remove_var("LLM_TIMEOUT_SECS");
            env::remove_var("LLM_MAX_ATTEMPTS");
        }
        let config = LlmConfig::from_env().unwrap();
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.base_url, DEFAULT_GEMINI_BASE_URL);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_attempts, 3);

        unsafe { env::remove_var("GEMINI_API_KEY"); }
    }

    #[test]
    fn test_origin_list_parsing() {
        let origins = parse_origin_list(" http://localhost:5173/, *.vercel.app ,,");
        assert_eq!(origins, vec!["http://localhost:5173", "*.vercel.app"]);
        assert!(parse_origin_list("").is_empty());
    }

    #[test]
    fn test_config_validation() {
        let config = valid_config();
        assert!(config.validate().is_ok());

        let mut invalid = config.clone();
        invalid.server.port = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.llm.api_key = "  ".to_string();
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.llm.base_url = "generativelanguage.googleapis.com".to_string();
        assert!(invalid.validate().is_err());

        let mut invalid = config;
        invalid.llm.max_attempts = 0;
        assert!(invalid.validate().is_err());
    }
}
