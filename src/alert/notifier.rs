//! Alert delivery channels and concurrent fan-out

use crate::config::StreamId;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// The kind of external channel an alert is delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertChannel {
    /// Instant-messaging bot (Telegram)
    Messaging,
    /// Email relay service
    Email,
    /// Push message API (WhatsApp)
    PushMessage,
}

impl fmt::Display for AlertChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertChannel::Messaging => "messaging",
            AlertChannel::Email => "email",
            AlertChannel::PushMessage => "push_message",
        };
        f.write_str(name)
    }
}

/// One camera's unavailability alert
#[derive(Debug, Clone)]
pub struct CameraAlert {
    /// Which camera stream failed
    pub stream_id: StreamId,
    /// Reconnection attempts made before giving up
    pub attempts: u32,
    /// When the alert was raised
    pub fired_at: DateTime<Local>,
}

impl CameraAlert {
    /// Create an alert stamped with the current time
    pub fn new(stream_id: StreamId, attempts: u32) -> Self {
        Self {
            stream_id,
            attempts,
            fired_at: Local::now(),
        }
    }

    /// Subject line for channels that carry one
    pub fn subject(&self) -> String {
        format!("Camera Alert - {} Stream Error", self.stream_id)
    }

    /// Message body shared by all channels
    pub fn body(&self) -> String {
        format!(
            "⚠️ Camera Alert\n\nCamera: {}\nStatus: Stream Unavailable\nReconnection Attempts: {}\nTime: {}",
            self.stream_id,
            self.attempts,
            self.fired_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Delivers one alert to one external channel
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// The channel this notifier delivers to
    fn channel(&self) -> AlertChannel;

    /// Deliver the alert
    async fn notify(&self, alert: &CameraAlert) -> Result<()>;
}

/// Fans one alert out to every configured channel concurrently
///
/// Individual channel failures are logged and swallowed; alert delivery
/// never feeds back into session state.
#[derive(Clone, Default)]
pub struct AlertDispatcher {
    notifiers: Vec<Arc<dyn AlertNotifier>>,
}

impl AlertDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel
    pub fn with_notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Number of configured channels
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// True when no channels are configured
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Deliver `alert` to all channels, waiting for every delivery to settle
    pub async fn dispatch(&self, alert: &CameraAlert) {
        let deliveries = self.notifiers.iter().map(|notifier| async move {
            match notifier.notify(alert).await {
                Ok(()) => debug!(
                    channel = %notifier.channel(),
                    stream = %alert.stream_id,
                    "alert delivered"
                ),
                Err(e) => warn!(
                    channel = %notifier.channel(),
                    stream = %alert.stream_id,
                    error = %e,
                    "alert delivery failed"
                ),
            }
        });

        futures::future::join_all(deliveries).await;
    }
}

impl fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("channels", &self.notifiers.len())
            .finish()
    }
}

fn check_status(channel: AlertChannel, resp: reqwest::Response) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::Transport(format!(
            "{} endpoint returned {}",
            channel, status
        )))
    }
}

/// Telegram bot channel
pub struct TelegramNotifier {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

impl TelegramNotifier {
    /// Create a notifier posting through the given bot to the given chat
    pub fn new(client: reqwest::Client, bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl AlertNotifier for TelegramNotifier {
    fn channel(&self) -> AlertChannel {
        AlertChannel::Messaging
    }

    async fn notify(&self, alert: &CameraAlert) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let body = alert.body();
        let resp = self
            .client
            .post(&url)
            .json(&TelegramMessage {
                chat_id: &self.chat_id,
                text: &body,
                parse_mode: "HTML",
            })
            .send()
            .await
            .map_err(|e| Error::Transport(format!("telegram request failed: {}", e)))?;

        check_status(self.channel(), resp)
    }
}

/// Email relay channel (posts to a mail-sending service endpoint)
pub struct EmailNotifier {
    client: reqwest::Client,
    service_url: String,
    to: String,
}

#[derive(Serialize)]
struct EmailMessage<'a> {
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl EmailNotifier {
    /// Create a notifier posting to `service_url` addressed to `to`
    pub fn new(client: reqwest::Client, service_url: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            client,
            service_url: service_url.into(),
            to: to.into(),
        }
    }
}

#[async_trait]
impl AlertNotifier for EmailNotifier {
    fn channel(&self) -> AlertChannel {
        AlertChannel::Email
    }

    async fn notify(&self, alert: &CameraAlert) -> Result<()> {
        let resp = self
            .client
            .post(&self.service_url)
            .json(&EmailMessage {
                to: &self.to,
                subject: &alert.subject(),
                text: &alert.body(),
            })
            .send()
            .await
            .map_err(|e| Error::Transport(format!("email request failed: {}", e)))?;

        check_status(self.channel(), resp)
    }
}

/// WhatsApp cloud-API channel
pub struct WhatsAppNotifier {
    client: reqwest::Client,
    api_url: String,
    token: String,
    to: String,
}

#[derive(Serialize)]
struct WhatsAppText<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct WhatsAppMessage<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: WhatsAppText<'a>,
}

impl WhatsAppNotifier {
    /// Create a notifier posting to the WhatsApp API with bearer auth
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        token: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            token: token.into(),
            to: to.into(),
        }
    }
}

#[async_trait]
impl AlertNotifier for WhatsAppNotifier {
    fn channel(&self) -> AlertChannel {
        AlertChannel::PushMessage
    }

    async fn notify(&self, alert: &CameraAlert) -> Result<()> {
        let body = alert.body();
        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&WhatsAppMessage {
                messaging_product: "whatsapp",
                to: &self.to,
                kind: "text",
                text: WhatsAppText { body: &body },
            })
            .send()
            .await
            .map_err(|e| Error::Transport(format!("whatsapp request failed: {}", e)))?;

        check_status(self.channel(), resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct RecordingNotifier {
        channel: AlertChannel,
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl AlertNotifier for RecordingNotifier {
        fn channel(&self) -> AlertChannel {
            self.channel
        }

        async fn notify(&self, _alert: &CameraAlert) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Transport("simulated outage".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_alert_body_contents() {
        let alert = CameraAlert::new(StreamId::new("garage"), 3);
        let body = alert.body();
        assert!(body.contains("Camera: garage"));
        assert!(body.contains("Status: Stream Unavailable"));
        assert!(body.contains("Reconnection Attempts: 3"));
        assert!(body.contains("Time: "));
        assert_eq!(alert.subject(), "Camera Alert - garage Stream Error");
    }

    #[test]
    fn test_whatsapp_message_shape() {
        let msg = WhatsAppMessage {
            messaging_product: "whatsapp",
            to: "+1555",
            kind: "text",
            text: WhatsAppText { body: "hi" },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["messaging_product"], "whatsapp");
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"]["body"], "hi");
    }

    #[tokio::test]
    async fn test_dispatch_reaches_every_channel() {
        let a = Arc::new(RecordingNotifier {
            channel: AlertChannel::Messaging,
            calls: AtomicU32::new(0),
            fail: false,
        });
        let b = Arc::new(RecordingNotifier {
            channel: AlertChannel::Email,
            calls: AtomicU32::new(0),
            fail: false,
        });

        let dispatcher = AlertDispatcher::new()
            .with_notifier(a.clone())
            .with_notifier(b.clone());

        dispatcher
            .dispatch(&CameraAlert::new(StreamId::new("cam"), 1))
            .await;

        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_survives_channel_failure() {
        let failing = Arc::new(RecordingNotifier {
            channel: AlertChannel::Messaging,
            calls: AtomicU32::new(0),
            fail: true,
        });
        let healthy = Arc::new(RecordingNotifier {
            channel: AlertChannel::PushMessage,
            calls: AtomicU32::new(0),
            fail: false,
        });

        let dispatcher = AlertDispatcher::new()
            .with_notifier(failing.clone())
            .with_notifier(healthy.clone());

        // must not panic or propagate the failure
        dispatcher
            .dispatch(&CameraAlert::new(StreamId::new("cam"), 2))
            .await;

        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }
}
