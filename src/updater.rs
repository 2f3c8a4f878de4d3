use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{error, info};

/// JSON body for the Lavalink youtube-source token update
#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    #[serde(rename = "poToken")]
    po_token: &'a str,
    #[serde(rename = "visitorData")]
    visitor_data: &'a str,
}

/// Pushes a token pair to the downstream admin API; swapped for a stub in
/// tests. Always degrades to a boolean, never propagates transport errors.
#[async_trait]
pub trait Updater: Send + Sync {
    async fn update(&self, po_token: &str, visitor_data: &str) -> bool;
}

/// Updates Lavalink's youtube-source tokens via its REST API
pub struct LavalinkUpdater {
    client: Client,
    update_url: String,
    password: String,
}

impl LavalinkUpdater {
    /// Create a new updater for the given Lavalink base URL
    pub fn new(base_url: &str, password: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            update_url: build_update_url(base_url),
            password: password.to_string(),
        }
    }
}

/// Build the token update URL from a base URL, stripping trailing slashes
/// so repeated normalization never doubles separators
pub(crate) fn build_update_url(base_url: &str) -> String {
    format!("{}/youtube", base_url.trim_end_matches('/'))
}

#[async_trait]
impl Updater for LavalinkUpdater {
    async fn update(&self, po_token: &str, visitor_data: &str) -> bool {
        let body = UpdateRequest {
            po_token,
            visitor_data,
        };

        let response = self
            .client
            .post(&self.update_url)
            .header("Authorization", &self.password)
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status() == StatusCode::NO_CONTENT => {
                info!("Successfully updated Lavalink token");
                true
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                error!(
                    "Failed to update token. Status: {}, body: {}",
                    status, body
                );
                false
            }
            Err(e) => {
                error!("Error updating Lavalink token: {}", e);
                false
            }
        }
    }
}
