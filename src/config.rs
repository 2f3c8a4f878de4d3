use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, TwrError};

/// Lavalink admin API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LavalinkConfig {
    /// Base URL of the Lavalink server (e.g., "http://localhost:9296")
    #[serde(default = "default_lavalink_url")]
    pub url: String,

    /// Password sent as the Authorization header on token updates
    #[serde(default = "default_lavalink_password")]
    pub password: String,
}

fn default_lavalink_url() -> String {
    "http://localhost:9296".to_string()
}

fn default_lavalink_password() -> String {
    "glace".to_string()
}

impl Default for LavalinkConfig {
    fn default() -> Self {
        Self {
            url: default_lavalink_url(),
            password: default_lavalink_password(),
        }
    }
}

/// External token generator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    /// Command line for the primary generator (program + arguments)
    #[serde(default = "default_generator_command")]
    pub command: Vec<String>,

    /// Working directory for the primary generator
    pub workdir: Option<String>,

    /// Primary generator timeout in seconds (default: 120)
    #[serde(default = "default_generator_timeout")]
    pub timeout_seconds: u64,

    /// Whether to fall back to the docker image when the primary fails
    #[serde(default = "default_use_docker")]
    pub use_docker: bool,

    /// Docker image run as the fallback generator
    #[serde(default = "default_docker_image")]
    pub docker_image: String,

    /// Docker fallback timeout in seconds (default: 60)
    #[serde(default = "default_docker_timeout")]
    pub docker_timeout_seconds: u64,
}

fn default_generator_command() -> Vec<String> {
    vec!["python3".to_string(), "/app/generator/main.py".to_string()]
}

fn default_generator_timeout() -> u64 {
    120
}

fn default_use_docker() -> bool {
    true
}

fn default_docker_image() -> String {
    "iv-org/youtube-trusted-session-generator".to_string()
}

fn default_docker_timeout() -> u64 {
    60
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: default_generator_command(),
            workdir: None,
            timeout_seconds: default_generator_timeout(),
            use_docker: default_use_docker(),
            docker_image: default_docker_image(),
            docker_timeout_seconds: default_docker_timeout(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelemetryConfig {
    /// OTLP endpoint for exporting traces and metrics
    pub otlp_endpoint: Option<String>,
    /// Log filter (e.g., "info", "debug", "twr=debug")
    pub log_filter: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Listen address (e.g., "0.0.0.0:8000")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Lavalink admin API configuration
    #[serde(default)]
    pub lavalink: LavalinkConfig,

    /// Token generator configuration
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            lavalink: LavalinkConfig::default(),
            generator: GeneratorConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration: optional YAML file, then environment overrides.
    /// Environment variables win over file values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    TwrError::Config(format!("Failed to read config file: {}", e))
                })?;
                serde_yaml::from_str(&content)?
            }
            None => Config::default(),
        };

        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env(&mut self, vars: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        for (key, value) in vars {
            match key.as_str() {
                "PORT" => {
                    let port: u16 = value.parse().map_err(|_| {
                        TwrError::Config(format!("Invalid PORT value: '{}'", value))
                    })?;
                    self.listen = format!("0.0.0.0:{}", port);
                }
                "LAVALINK_URL" => self.lavalink.url = value,
                "LAVALINK_PASSWORD" => self.lavalink.password = value,
                "USE_DOCKER" => {
                    // Anything other than "true" (case-insensitive) disables
                    // the docker fallback
                    self.generator.use_docker = value.eq_ignore_ascii_case("true");
                }
                "GENERATOR_COMMAND" => {
                    self.generator.command =
                        value.split_whitespace().map(str::to_string).collect();
                }
                "OTLP_ENDPOINT" => self.telemetry.otlp_endpoint = Some(value),
                "LOG_FILTER" => self.telemetry.log_filter = Some(value),
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate configuration and normalize the Lavalink URL
    fn validate(&mut self) -> Result<()> {
        if self.listen.is_empty() {
            return Err(TwrError::Config("'listen' address is required".to_string()));
        }

        if self.lavalink.url.is_empty() {
            return Err(TwrError::Config("'lavalink.url' is required".to_string()));
        }

        // Ensure the URL carries a scheme; plain host:port gets http://
        if !self.lavalink.url.starts_with("http://") && !self.lavalink.url.starts_with("https://")
        {
            self.lavalink.url = format!("http://{}", self.lavalink.url);
        }

        if self.generator.command.is_empty() {
            return Err(TwrError::Config(
                "'generator.command' must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
