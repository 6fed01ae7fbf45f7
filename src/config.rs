use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::compression::{ImageCompressor, JpegEncoderKind, ResizeFilter, SIZE_THRESHOLD_BYTES};
use crate::profile::CompressionProfile;

/// Studio Media Service - image compression for the studio website.
#[derive(Parser, Debug, Clone)]
#[command(name = "studio-media-rs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path of the TOML configuration file.
    #[arg(long, default_value = "config.toml", env = "STUDIO_MEDIA_CONFIG")]
    pub config: PathBuf,

    /// Write a configuration file with default values to PATH and exit.
    #[arg(long, value_name = "PATH")]
    pub sample_config: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub compression: CompressionConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_file_size_mb: usize,
    pub worker_threads: Option<usize>,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Uploads smaller than this are returned as-is.
    pub size_threshold_bytes: usize,
    pub jpeg_encoder: String,
    pub png_quantize: bool,
    pub resize_filter: String,
    /// Profile used by `/compress` when the request names none.
    pub default_profile: String,
}

/// Where the studio REST API lives and how requests authenticate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// `session`, `static` or `none`
    pub auth_mode: String,
    pub static_token: Option<String>,
    pub session_ttl_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub enable_request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3030,
            max_file_size_mb: 50,
            worker_threads: None,
            enable_cors: true,
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            size_threshold_bytes: SIZE_THRESHOLD_BYTES,
            jpeg_encoder: "mozjpeg".to_string(),
            png_quantize: false,
            resize_filter: "lanczos3".to_string(),
            default_profile: "default".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_secs: 30,
            auth_mode: "session".to_string(),
            static_token: None,
            session_ttl_minutes: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_request_logging: true,
        }
    }
}

impl Config {
    /// Parses a configuration file, falling back to defaults if it doesn't exist.
    /// Environment overrides and validation are left to [`Config::load_from`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse config: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// File, then `STUDIO_MEDIA_*` environment overrides, then validation.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("STUDIO_MEDIA_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("STUDIO_MEDIA_PORT") {
            if let Ok(port_num) = port.parse::<u16>() {
                self.server.port = port_num;
            }
        }

        if let Ok(max_size) = std::env::var("STUDIO_MEDIA_MAX_FILE_SIZE_MB") {
            if let Ok(size) = max_size.parse::<usize>() {
                self.server.max_file_size_mb = size;
            }
        }

        if let Ok(threshold) = std::env::var("STUDIO_MEDIA_SIZE_THRESHOLD") {
            if let Ok(bytes) = threshold.parse::<usize>() {
                self.compression.size_threshold_bytes = bytes;
            }
        }

        if let Ok(encoder) = std::env::var("STUDIO_MEDIA_JPEG_ENCODER") {
            self.compression.jpeg_encoder = encoder;
        }

        if let Ok(base_url) = std::env::var("STUDIO_MEDIA_API_BASE_URL") {
            self.api.base_url = base_url;
        }

        if let Ok(token) = std::env::var("STUDIO_MEDIA_API_TOKEN") {
            self.api.static_token = Some(token);
            self.api.auth_mode = "static".to_string();
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.logging.level = log_level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError("Port cannot be 0".to_string()));
        }

        if self.server.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError("Max file size cannot be 0".to_string()));
        }

        self.compression
            .jpeg_encoder
            .parse::<JpegEncoderKind>()
            .map_err(ConfigError::ValidationError)?;
        self.compression
            .resize_filter
            .parse::<ResizeFilter>()
            .map_err(ConfigError::ValidationError)?;
        CompressionProfile::named(&self.compression.default_profile)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        match self.api.auth_mode.as_str() {
            "session" | "none" => {}
            "static" => {
                if self.api.static_token.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::ValidationError(
                        "auth_mode 'static' requires api.static_token".to_string(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid auth_mode '{}'. Must be one of: session, static, none",
                    other
                )));
            }
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::ValidationError("API timeout cannot be 0".to_string()));
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let config = Self::default();
        let toml_content = toml::to_string_pretty(&config)
            .map_err(|e| ConfigError::SerializeError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_content)
            .map_err(|e| ConfigError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.server.max_file_size_mb * 1024 * 1024
    }

    /// Builds the compressor described by the `[compression]` section.
    pub fn compressor(&self) -> Result<ImageCompressor, ConfigError> {
        let jpeg_encoder = self
            .compression
            .jpeg_encoder
            .parse::<JpegEncoderKind>()
            .map_err(ConfigError::ValidationError)?;
        let filter = self
            .compression
            .resize_filter
            .parse::<ResizeFilter>()
            .map_err(ConfigError::ValidationError)?;

        Ok(ImageCompressor::new()
            .with_size_threshold(self.compression.size_threshold_bytes)
            .with_jpeg_encoder(jpeg_encoder)
            .with_png_quantize(self.compression.png_quantize)
            .with_filter(filter))
    }

    pub fn default_profile(&self) -> CompressionProfile {
        CompressionProfile::named(&self.compression.default_profile).unwrap_or_default()
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_minutes * 60)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Tests touching process environment run one at a time.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn temp_config_path() -> PathBuf {
        env::temp_dir().join(format!("studio-media-{}.toml", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3030);
        assert_eq!(config.compression.size_threshold_bytes, 500_000);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.default_profile(), CompressionProfile::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.compression.jpeg_encoder = "invalid".to_string();
        assert!(config.validate().is_err());
        config.compression.jpeg_encoder = "jpeg-encoder".to_string();

        config.compression.default_profile = "thumbnail".to_string();
        assert!(config.validate().is_err());
        config.compression.default_profile = "gallery".to_string();
        assert!(config.validate().is_ok());

        config.api.auth_mode = "static".to_string();
        assert!(config.validate().is_err());
        config.api.static_token = Some("secret".to_string());
        assert!(config.validate().is_ok());

        config.api.auth_mode = "basic".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("STUDIO_MEDIA_HOST", "127.0.0.1");
        env::set_var("STUDIO_MEDIA_PORT", "8080");
        env::set_var("STUDIO_MEDIA_SIZE_THRESHOLD", "1000");
        env::set_var("STUDIO_MEDIA_API_TOKEN", "static-token");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.compression.size_threshold_bytes, 1000);
        assert_eq!(config.api.auth_mode, "static");
        assert_eq!(config.api.static_token.as_deref(), Some("static-token"));

        env::remove_var("STUDIO_MEDIA_HOST");
        env::remove_var("STUDIO_MEDIA_PORT");
        env::remove_var("STUDIO_MEDIA_SIZE_THRESHOLD");
        env::remove_var("STUDIO_MEDIA_API_TOKEN");
    }

    #[test]
    fn test_sample_config_round_trips() {
        let path = temp_config_path();
        Config::generate_sample_config(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.server.port, 3030);
        assert_eq!(loaded.compression.resize_filter, "lanczos3");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_static_token_from_env_completes_file_config() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let path = temp_config_path();
        fs::write(&path, "[server]\nport = 4040\n\n[api]\nauth_mode = \"static\"\n").unwrap();

        // the file alone is incomplete
        assert!(Config::load_from_file(&path).unwrap().validate().is_err());

        env::set_var("STUDIO_MEDIA_API_TOKEN", "from-env");
        let loaded = Config::load_from(&path);
        env::remove_var("STUDIO_MEDIA_API_TOKEN");
        fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.server.port, 4040);
        assert_eq!(config.api.auth_mode, "static");
        assert_eq!(config.api.static_token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_load_from_rejects_invalid_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let path = temp_config_path();
        fs::write(&path, "[compression]\njpeg_encoder = \"gif\"\n").unwrap();

        let loaded = Config::load_from(&path);
        fs::remove_file(&path).unwrap();
        assert!(matches!(loaded, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from(["studio-media-rs", "--sample-config", "sample.toml"]).unwrap();
        assert_eq!(cli.sample_config, Some(PathBuf::from("sample.toml")));

        let cli = Cli::try_parse_from(["studio-media-rs", "--config", "/etc/studio/media.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/studio/media.toml"));
        assert_eq!(cli.sample_config, None);

        assert!(Cli::try_parse_from(["studio-media-rs", "--sample-config"]).is_err());
    }

    #[test]
    fn test_compressor_from_config() {
        let mut config = Config::default();
        config.compression.jpeg_encoder = "jpeg-encoder".to_string();
        config.compression.size_threshold_bytes = 10;

        let compressor = config.compressor().unwrap();
        assert_eq!(compressor.jpeg_encoder(), JpegEncoderKind::JpegEncoder);
        assert_eq!(compressor.size_threshold(), 10);
    }

    #[test]
    fn test_bind_address() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0:3030");
        assert_eq!(config.max_file_size_bytes(), 50 * 1024 * 1024);
    }
}
