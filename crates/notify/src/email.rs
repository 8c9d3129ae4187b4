//! SMTP email delivery via `lettre`.

use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use omicron_conf::{ConfigKey, Configuration};

use crate::traits::{Notifier, NotifyError, OutboundEmail};

/// Recipient that suppresses real delivery; the message is logged instead.
/// Shipping the default config must never spam a real mailbox.
const SENTINEL_RECIPIENT: &str = "someone@example.com";

/// Sends batched alert emails through the configured SMTP relay.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    dry_run: bool,
}

impl EmailNotifier {
    /// Build a notifier from the alert email settings.
    ///
    /// The recipient key is a comma-separated address list. Alert relays in
    /// this niche are unauthenticated plain SMTP (localhost:25 by default),
    /// so no TLS negotiation is attempted.
    pub fn from_config(config: &Configuration) -> Result<EmailNotifier, NotifyError> {
        let from: Mailbox = config
            .get(ConfigKey::AlertEmailAddressFrom)
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let raw_to = config.get(ConfigKey::AlertEmailAddressTo);
        let to: Vec<Mailbox> = raw_to
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(|addr| {
                addr.parse()
                    .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if to.is_empty() {
            return Err(NotifyError::Config(
                "at least one alert recipient is required".to_string(),
            ));
        }

        let dry_run = to
            .iter()
            .any(|mailbox| mailbox.email.to_string() == SENTINEL_RECIPIENT);

        let host = config.get(ConfigKey::AlertEmailSmtpHost);
        let port = config.int(ConfigKey::AlertEmailSmtpPort) as u16;

        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port).build();

        Ok(EmailNotifier {
            transport,
            from,
            to,
            dry_run,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        if self.dry_run {
            info!(
                subject = email.subject,
                body = email.body,
                "sentinel recipient configured, dumping alert email to the log"
            );
            return Ok(());
        }

        let mut builder = Message::builder().from(self.from.clone());
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        let message = builder
            .subject(&email.subject)
            .body(email.body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        info!(
            subject = email.subject,
            recipients = self.to.len(),
            "alert email delivered"
        );

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}
