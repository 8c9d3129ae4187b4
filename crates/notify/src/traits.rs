//! Notifier trait definition and shared delivery types.

/// Errors that can occur while configuring or performing delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// A rendered alert email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub subject: String,
    pub body: String,
}

/// Delivery channel for batched alerts.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message through this channel.
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g. "email").
    fn channel_name(&self) -> &str;
}
