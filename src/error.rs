use thiserror::Error;

#[derive(Error, Debug)]
pub enum TwrError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Token generation error: {0}")]
    Generation(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, TwrError>;
