use async_trait::async_trait;

/// Outbound mail transport. Real SMTP delivery is out of scope here;
/// this is the seam a deployment binds to its own sender.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
#[error("mail send failed: {0}")]
pub struct MailError(pub String);

/// Logs the rendered mail instead of delivering it; the default binding
/// until a deployment wires a real transport behind `Mailer`.
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), MailError> {
        tracing::info!(recipients = ?recipients, subject, body, "mail dispatched");
        Ok(())
    }
}
