//! Email alerts over SMTP (STARTTLS)

use super::{AlertMessage, NotificationSink};
use crate::error::{Error, Result};
use crate::store::ContactRecord;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP email sink
pub struct EmailSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl EmailSink {
    pub fn new(
        smtp_server: &str,
        smtp_port: u16,
        sender: &str,
        password: &str,
    ) -> Result<Self> {
        let sender_mailbox: Mailbox = sender
            .parse()
            .map_err(|e| Error::Notify(format!("invalid sender address {}: {}", sender, e)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_server)
            .map_err(|e| Error::Notify(format!("smtp relay setup failed: {}", e)))?
            .port(smtp_port)
            .credentials(Credentials::new(sender.to_string(), password.to_string()))
            .build();

        Ok(Self {
            transport,
            sender: sender_mailbox,
        })
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, alert: &AlertMessage, recipients: &[ContactRecord]) -> Result<()> {
        let label = alert.identities_label();
        let body = format!(
            "Target individual(s) {} identified on stream {}.\nTimestamp: {}\nVideo: {}\n",
            label,
            alert.stream_id,
            alert.occurred_at.format("%Y-%m-%d %H:%M:%S"),
            alert.video_url
        );

        for contact in recipients {
            let Some(address) = contact.contact_email.as_deref() else {
                continue;
            };

            let mailbox: Mailbox = match address.parse() {
                Ok(mb) => mb,
                Err(e) => {
                    tracing::warn!(
                        contact = %contact.contact_name,
                        address = %address,
                        error = %e,
                        "Skipping contact with unparseable email"
                    );
                    continue;
                }
            };

            let message = Message::builder()
                .from(self.sender.clone())
                .to(mailbox)
                .subject(format!("ALERT: Target {} identified", label))
                .body(body.clone())
                .map_err(|e| Error::Notify(format!("email build failed: {}", e)))?;

            match self.transport.send(message).await {
                Ok(_) => {
                    tracing::info!(address = %address, "Email alert sent");
                }
                Err(e) => {
                    tracing::error!(
                        address = %address,
                        error = %e,
                        "Failed to send email alert"
                    );
                }
            }
        }

        Ok(())
    }
}
