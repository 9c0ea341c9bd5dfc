//! Gateway stream-registry client
//!
//! The media gateway exposes a small REST surface next to the negotiation
//! endpoint: `GET /streams` lists the registered camera feeds and
//! `POST /stream` registers one. The settings layer uses this to keep the
//! gateway's registry in step with the configured cameras.

use crate::config::GatewayCredentials;
use crate::{Error, Result};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Details of one registered stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDetails {
    /// Source address of the camera feed (e.g. an rtsp:// URL)
    #[serde(default)]
    pub url: String,

    /// Whether the gateway pulls the feed only while a viewer is attached
    #[serde(default)]
    pub on_demand: bool,
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    #[serde(default)]
    streams: HashMap<String, StreamDetails>,
}

#[derive(Debug, Serialize)]
struct RegisterStreamRequest<'a> {
    name: &'a str,
    url: &'a str,
    on_demand: bool,
    debug: bool,
}

/// REST client for the gateway's stream registry
pub struct GatewayClient {
    base_url: String,
    auth: Option<String>,
    client: reqwest::Client,
}

impl GatewayClient {
    /// Create a client for the given gateway base address
    pub fn new(
        base_url: impl Into<String>,
        credentials: Option<&GatewayCredentials>,
    ) -> Result<Self> {
        let base_url = base_url.into();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "gateway base_url must start with http:// or https://, got {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: credentials.map(GatewayCredentials::basic_header),
            client,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(auth) => builder.header(AUTHORIZATION, auth.clone()),
            None => builder,
        }
    }

    /// List the streams registered on the gateway
    pub async fn list_streams(&self) -> Result<HashMap<String, StreamDetails>> {
        let url = format!("{}/streams", self.base_url);
        debug!(%url, "listing gateway streams");

        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("streams request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "gateway returned {} for {}",
                status, url
            )));
        }

        let body: StreamsResponse = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("malformed streams response: {}", e)))?;

        Ok(body.streams)
    }

    /// Register a stream on the gateway
    pub async fn register_stream(&self, name: &str, source_url: &str, on_demand: bool) -> Result<()> {
        let url = format!("{}/stream", self.base_url);
        debug!(%url, stream = name, "registering gateway stream");

        let response = self
            .request(self.client.post(&url))
            .json(&RegisterStreamRequest {
                name,
                url: source_url,
                on_demand,
                debug: false,
            })
            .send()
            .await
            .map_err(|e| Error::Transport(format!("stream registration failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "failed to register stream {}: gateway returned {}",
                name, status
            )));
        }

        Ok(())
    }
}
