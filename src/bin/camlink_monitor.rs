//! Headless camera fleet monitor
//!
//! Loads a YAML file describing the gateway, cameras, and alert channels,
//! supervises every stream, and logs session events until interrupted.
//!
//! ```yaml
//! gateway:
//!   url: http://192.168.1.10:8083
//!   username: admin
//!   password: admin
//! cameras:
//!   - id: front-door
//!   - id: garage
//! alerts:
//!   telegram:
//!     bot_token: "123:abc"
//!     chat_id: "-100123"
//!   email:
//!     service_url: https://mail.example.com/send
//!     to: ops@example.com
//! ```

use anyhow::Context;
use camlink::{
    AlertDispatcher, CameraFleet, CameraStreamRef, EmailNotifier, GatewayCredentials,
    SupervisorConfig, TelegramNotifier, WhatsAppNotifier,
};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "camlink-monitor", about = "Supervise camera streams against a media gateway")]
struct Args {
    /// Path to the fleet configuration file
    #[arg(long, env = "CAMLINK_CONFIG", default_value = "cameras.yaml")]
    config: PathBuf,
}

#[derive(Debug, Deserialize)]
struct MonitorConfig {
    gateway: GatewaySection,
    cameras: Vec<CameraEntry>,
    #[serde(default)]
    supervisor: SupervisorConfig,
    #[serde(default)]
    alerts: AlertsSection,
}

#[derive(Debug, Deserialize)]
struct GatewaySection {
    url: String,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CameraEntry {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct AlertsSection {
    telegram: Option<TelegramSection>,
    email: Option<EmailSection>,
    whatsapp: Option<WhatsAppSection>,
}

#[derive(Debug, Deserialize)]
struct TelegramSection {
    bot_token: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct EmailSection {
    service_url: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct WhatsAppSection {
    api_url: String,
    token: String,
    to: String,
}

fn build_dispatcher(alerts: &AlertsSection) -> AlertDispatcher {
    let client = reqwest::Client::new();
    let mut dispatcher = AlertDispatcher::new();

    if let Some(telegram) = &alerts.telegram {
        dispatcher = dispatcher.with_notifier(Arc::new(TelegramNotifier::new(
            client.clone(),
            telegram.bot_token.clone(),
            telegram.chat_id.clone(),
        )));
    }
    if let Some(email) = &alerts.email {
        dispatcher = dispatcher.with_notifier(Arc::new(EmailNotifier::new(
            client.clone(),
            email.service_url.clone(),
            email.to.clone(),
        )));
    }
    if let Some(whatsapp) = &alerts.whatsapp {
        dispatcher = dispatcher.with_notifier(Arc::new(WhatsAppNotifier::new(
            client,
            whatsapp.api_url.clone(),
            whatsapp.token.clone(),
            whatsapp.to.clone(),
        )));
    }

    dispatcher
}

fn stream_refs(config: &MonitorConfig) -> Vec<CameraStreamRef> {
    let credentials = match (&config.gateway.username, &config.gateway.password) {
        (Some(username), Some(password)) => Some(GatewayCredentials::new(username, password)),
        _ => None,
    };

    config
        .cameras
        .iter()
        .map(|camera| {
            let mut stream = CameraStreamRef::new(camera.id.as_str(), config.gateway.url.clone());
            if let Some(credentials) = &credentials {
                stream = stream.with_credentials(credentials.clone());
            }
            stream
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read {}", args.config.display()))?;
    let config: MonitorConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse {}", args.config.display()))?;

    config
        .supervisor
        .validate()
        .context("invalid supervisor configuration")?;

    let dispatcher = build_dispatcher(&config.alerts);
    if dispatcher.is_empty() {
        warn!("no alert channels configured, failures will only be logged");
    }

    let refs = stream_refs(&config);
    info!(cameras = refs.len(), gateway = %config.gateway.url, "starting fleet");

    let (mut fleet, events_rx) = CameraFleet::new(config.supervisor.clone(), dispatcher);
    fleet.configure_sessions(refs).await;

    let mut events = UnboundedReceiverStream::new(events_rx);

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => info!(
                    stream = %event.stream_id,
                    state = %event.state,
                    attempt = event.attempt,
                    failure = ?event.failure,
                    "session event"
                ),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    fleet.close_all().await;
    Ok(())
}
