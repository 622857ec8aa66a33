use std::sync::Arc;

use gateway_storage::Storage;
use time::OffsetDateTime;

use crate::mailer::Mailer;

const POP_LIMIT: usize = 50;

/// Pops due mail, renders it against its template body, and hands it to
/// `mailer`. A send failure reschedules the row with its configured
/// backoff instead of dropping it.
pub async fn dispatch_due_mail<S: Storage>(
    storage: &Arc<S>,
    mailer: &Arc<dyn Mailer>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let now = OffsetDateTime::now_utc();
    let due = storage.pop_due_mail(now, POP_LIMIT).await?;

    for mail in due {
        if mail.attempts >= mail.retry_max {
            tracing::warn!(mail_id = mail.id, attempts = mail.attempts, "dropping mail after exhausting retries");
            storage.delete_mail(mail.id).await?;
            continue;
        }

        let recipients: Vec<String> = serde_json::from_value(mail.recipients.clone()).unwrap_or_default();
        let body = serde_json::to_string_pretty(&mail.template_body).unwrap_or_default();

        match mailer.send(&recipients, &mail.template_name, &body).await {
            Ok(()) => {
                storage.delete_mail(mail.id).await?;
            }
            Err(err) => {
                tracing::warn!(mail_id = mail.id, error = %err, "mail send failed, rescheduling");
                let send_at = now + time::Duration::seconds(mail.retry_after_secs);
                storage.reschedule_mail(mail.id, send_at, mail.attempts + 1).await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::{MailError, TracingMailer};
    use async_trait::async_trait;
    use gateway_storage::entities::mail_queue;
    use gateway_storage::SeaOrmStorage;
    use sea_orm::ActiveValue;

    async fn seeded_storage() -> Arc<SeaOrmStorage> {
        let storage = Arc::new(SeaOrmStorage::connect("sqlite::memory:").await.unwrap());
        storage.sync().await.unwrap();
        storage
    }

    fn queued_mail(now: OffsetDateTime) -> mail_queue::ActiveModel {
        mail_queue::ActiveModel {
            id: ActiveValue::NotSet,
            dedupe_key: ActiveValue::Set("alert:1".into()),
            recipients: ActiveValue::Set(serde_json::json!(["ops@example.com"])),
            template_name: ActiveValue::Set("alert_triggered".into()),
            template_body: ActiveValue::Set(serde_json::json!({"alert_id": 1})),
            send_at: ActiveValue::Set(now),
            attempts: ActiveValue::Set(0),
            retry_max: ActiveValue::Set(3),
            retry_after_secs: ActiveValue::Set(60),
            created_at: ActiveValue::Set(now),
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _recipients: &[String], _subject: &str, _body: &str) -> Result<(), MailError> {
            Err(MailError("upstream unavailable".into()))
        }
    }

    #[tokio::test]
    async fn successful_send_deletes_the_row() {
        let storage = seeded_storage().await;
        let now = OffsetDateTime::now_utc();
        storage.enqueue_mail(queued_mail(now)).await.unwrap();

        let mailer: Arc<dyn Mailer> = Arc::new(TracingMailer);
        dispatch_due_mail(&storage, &mailer).await.unwrap();

        assert!(storage.pop_due_mail(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_send_reschedules_with_incremented_attempts() {
        let storage = seeded_storage().await;
        let now = OffsetDateTime::now_utc();
        storage.enqueue_mail(queued_mail(now)).await.unwrap();

        let mailer: Arc<dyn Mailer> = Arc::new(FailingMailer);
        dispatch_due_mail(&storage, &mailer).await.unwrap();

        let still_due = storage.pop_due_mail(now + time::Duration::minutes(2), 10).await.unwrap();
        assert_eq!(still_due.len(), 1);
        assert_eq!(still_due[0].attempts, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_are_dropped_not_retried_forever() {
        let storage = seeded_storage().await;
        let now = OffsetDateTime::now_utc();
        let mut mail = queued_mail(now);
        mail.attempts = ActiveValue::Set(3);
        storage.enqueue_mail(mail).await.unwrap();

        let mailer: Arc<dyn Mailer> = Arc::new(FailingMailer);
        dispatch_due_mail(&storage, &mailer).await.unwrap();

        assert!(storage.pop_due_mail(now, 10).await.unwrap().is_empty());
    }
}
