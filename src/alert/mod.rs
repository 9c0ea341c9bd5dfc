//! Alerting: per-camera notification throttling and channel fan-out

mod notifier;
mod throttle;

pub use notifier::{
    AlertChannel, AlertDispatcher, AlertNotifier, CameraAlert, EmailNotifier, TelegramNotifier,
    WhatsAppNotifier,
};
pub use throttle::NotificationThrottle;
