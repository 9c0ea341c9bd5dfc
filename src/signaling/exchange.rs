//! One-shot HTTP negotiation exchange
//!
//! The gateway accepts a POST of `{"sdp": {"type", "sdp"}}` on the
//! per-stream endpoint and responds with `{"sdp": {...}}` or
//! `{"error": "..."}`. Candidates are carried inline in the SDP; the
//! endpoint has no separate candidate call.

use super::{
    NegotiationRole, OutboundSignal, SdpMessage, SignalEvent, SignalingChannel, SignalingConnector,
};
use crate::{CameraStreamRef, Error, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ExchangeRequest {
    sdp: SdpMessage,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    sdp: Option<SdpMessage>,
    #[serde(default)]
    error: Option<String>,
}

/// Opens [`ExchangeChannel`]s against the gateway's per-stream endpoint
#[derive(Clone)]
pub struct ExchangeConnector {
    client: reqwest::Client,
}

impl ExchangeConnector {
    /// Create a connector with a shared HTTP client
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for ExchangeConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingConnector for ExchangeConnector {
    async fn open(&self, stream: &CameraStreamRef) -> Result<Box<dyn SignalingChannel>> {
        stream.validate()?;

        Ok(Box::new(ExchangeChannel {
            client: self.client.clone(),
            endpoint: stream.exchange_url(),
            auth: stream.credentials.as_ref().map(|c| c.basic_header()),
            pending: None,
            closed: false,
        }))
    }
}

/// One request/response negotiation
///
/// Sending the local description performs the HTTP exchange; the remote
/// answer surfaces as the next inbound event. Local candidates have no
/// wire representation on this transport and are dropped.
pub struct ExchangeChannel {
    client: reqwest::Client,
    endpoint: String,
    auth: Option<String>,
    pending: Option<SignalEvent>,
    closed: bool,
}

#[async_trait]
impl SignalingChannel for ExchangeChannel {
    fn role(&self) -> NegotiationRole {
        NegotiationRole::LocalOffer
    }

    async fn send(&mut self, signal: OutboundSignal) -> Result<()> {
        let sdp = match signal {
            OutboundSignal::Description(sdp) => sdp,
            OutboundSignal::Candidate(candidate) => {
                debug!(
                    endpoint = %self.endpoint,
                    candidate = %candidate.candidate,
                    "exchange transport carries candidates inline, dropping"
                );
                return Ok(());
            }
        };

        if self.closed {
            return Err(Error::Cancelled);
        }

        let mut request = self.client.post(&self.endpoint).json(&ExchangeRequest { sdp });
        if let Some(auth) = &self.auth {
            request = request.header(AUTHORIZATION, auth.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("negotiation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "gateway returned {}: {}",
                status, body
            )));
        }

        let body: ExchangeResponse = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("malformed negotiation response: {}", e)))?;

        if let Some(message) = body.error {
            return Err(Error::Protocol(message));
        }

        let answer = body
            .sdp
            .ok_or_else(|| Error::Decode("negotiation response missing sdp".to_string()))?;

        debug!(endpoint = %self.endpoint, "received remote answer");
        self.pending = Some(SignalEvent::RemoteDescription(answer));

        Ok(())
    }

    async fn next_event(&mut self) -> Option<SignalEvent> {
        if let Some(event) = self.pending.take() {
            return Some(event);
        }
        if self.closed {
            return None;
        }

        // The exchange is spent after the answer; there is nothing further
        // to deliver, so stay suspended until the caller closes.
        std::future::pending::<()>().await;
        unreachable!()
    }

    async fn close(&mut self) {
        self.closed = true;
        self.pending = None;
    }
}
