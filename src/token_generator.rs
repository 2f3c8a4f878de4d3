use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::GeneratorConfig;
use crate::error::{Result, TwrError};

/// The credential bundle Lavalink needs to authenticate as a legitimate client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    #[serde(rename = "poToken")]
    pub po_token: String,
    #[serde(rename = "visitorData")]
    pub visitor_data: String,
}

impl TokenPair {
    /// A pair is usable only when both fields are non-empty
    pub fn is_complete(&self) -> bool {
        !self.po_token.is_empty() && !self.visitor_data.is_empty()
    }
}

/// Opaque token-generation capability; swapped for a stub in tests
#[async_trait]
pub trait TokenGenerator: Send + Sync {
    async fn generate(&self) -> Result<TokenPair>;
}

/// Generates token pairs by running an external generator process and
/// parsing its output
pub struct CommandGenerator {
    config: GeneratorConfig,
}

impl CommandGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Run the configured primary generator command
    async fn run_primary(&self) -> Result<TokenPair> {
        info!("Generating new token pair via external generator");
        run_command(
            &self.config.command,
            self.config.workdir.as_deref(),
            Duration::from_secs(self.config.timeout_seconds),
        )
        .await
    }

    /// Run the docker fallback generator
    async fn run_docker(&self) -> Result<TokenPair> {
        info!(
            "Generating new token pair via docker image '{}'",
            self.config.docker_image
        );
        let argv = vec![
            "docker".to_string(),
            "run".to_string(),
            "--rm".to_string(),
            self.config.docker_image.clone(),
        ];
        run_command(
            &argv,
            None,
            Duration::from_secs(self.config.docker_timeout_seconds),
        )
        .await
    }
}

#[async_trait]
impl TokenGenerator for CommandGenerator {
    async fn generate(&self) -> Result<TokenPair> {
        match self.run_primary().await {
            Ok(pair) => Ok(pair),
            Err(e) if self.config.use_docker => {
                warn!("Primary generator failed ({}), trying docker fallback", e);
                self.run_docker().await
            }
            Err(e) => Err(e),
        }
    }
}

/// Run one generator invocation and parse a token pair out of its output
async fn run_command(argv: &[String], workdir: Option<&str>, limit: Duration) -> Result<TokenPair> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| TwrError::Generation("Generator command is empty".to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }

    let output = timeout(limit, cmd.output())
        .await
        .map_err(|_| {
            TwrError::Generation(format!(
                "Generator '{}' timed out after {:?}",
                program, limit
            ))
        })?
        .map_err(|e| TwrError::Generation(format!("Failed to run generator '{}': {}", program, e)))?;

    if !output.status.success() {
        warn!(
            "Generator '{}' exited with {}; attempting to parse output anyway",
            program, output.status
        );
    }

    // Generators are inconsistent about which stream they print to
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push('\n');
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    let pair = parse_generator_output(&combined).ok_or_else(|| {
        let head: String = combined.chars().take(500).collect();
        TwrError::Generation(format!(
            "Could not parse token pair from generator output (first 500 chars: {:?})",
            head
        ))
    })?;

    info!("Successfully generated new token pair");
    Ok(pair)
}

/// Extract a token pair from raw generator output.
///
/// Tries a JSON blob first (substring between the first `{` and the last
/// `}`), accepting both `poToken`/`token` and `visitorData`/`visitor_data`
/// spellings. Fields still missing afterwards are filled by scanning lines
/// for `key: value` patterns.
pub(crate) fn parse_generator_output(output: &str) -> Option<TokenPair> {
    let mut po_token: Option<String> = None;
    let mut visitor_data: Option<String> = None;

    if let Some(value) = extract_json_blob(output) {
        po_token = string_field(&value, &["poToken", "token"]);
        visitor_data = string_field(&value, &["visitorData", "visitor_data"]);
    }

    if po_token.is_none() || visitor_data.is_none() {
        scan_lines(output, &mut po_token, &mut visitor_data);
    }

    match (po_token, visitor_data) {
        (Some(t), Some(v)) if !t.is_empty() && !v.is_empty() => Some(TokenPair {
            po_token: t,
            visitor_data: v,
        }),
        _ => None,
    }
}

fn extract_json_blob(output: &str) -> Option<Value> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&output[start..=end]).ok()
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Line-by-line fallback for generators that print plain `key: value` pairs
fn scan_lines(output: &str, po_token: &mut Option<String>, visitor_data: &mut Option<String>) {
    for line in output.lines() {
        let Some((_, raw)) = line.split_once(':') else {
            continue;
        };
        let value = raw.trim().trim_matches('"').trim_matches('\'').to_string();
        let lower = line.to_lowercase();

        if visitor_data.is_none()
            && ((lower.contains("visitor") && lower.contains("data"))
                || lower.contains("visitordata"))
        {
            if !value.is_empty() {
                *visitor_data = Some(value);
            }
            continue;
        }

        // Real tokens are long; short values are labels or noise
        if po_token.is_none() && lower.contains("token") && value.len() > 20 {
            *po_token = Some(value);
        }
    }
}
