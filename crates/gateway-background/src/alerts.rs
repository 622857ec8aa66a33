use std::sync::Arc;

use gateway_storage::{entities::alerts, entities::mail_queue, Storage, WatchedKind};
use sea_orm::ActiveValue;
use time::OffsetDateTime;

use crate::window::next_window;

fn watched_kind(raw: &str) -> Option<WatchedKind> {
    match raw {
        "api_key" => Some(WatchedKind::ApiKey),
        "provider" => Some(WatchedKind::Provider),
        _ => None,
    }
}

/// The `budget` an alert's threshold is measured against: the
/// threshold value directly for `absolute`, or a percentage of the
/// watched object's own budget document for `percentage`.
async fn effective_threshold<S: Storage>(storage: &Arc<S>, alert: &alerts::Model, kind: WatchedKind) -> Option<f64> {
    match alert.threshold_kind.as_str() {
        "absolute" => Some(alert.threshold_value),
        "percentage" => {
            let budget = storage.find_budget(kind, alert.watched_id).await.ok().flatten()?;
            Some(budget.amount * alert.threshold_value / 100.0)
        }
        _ => None,
    }
}

/// Closes every alert whose window has ended: logs a `Recycled` event
/// if anything was spent, resets `used`/`threshold_state`, and advances
/// `starts_at`/`ends_at` to the next aligned window.
pub async fn recycle_closed_windows<S: Storage>(storage: &Arc<S>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let now = OffsetDateTime::now_utc();
    for mut alert in storage.list_due_alerts(now).await? {
        let Some(kind) = watched_kind(&alert.watched_kind) else {
            tracing::warn!(watched_kind = %alert.watched_kind, "unknown watched_kind on alert row, skipping");
            continue;
        };
        let used = storage.sum_usage_cost(kind, alert.watched_id, alert.starts_at).await?;
        if used > 0.0 {
            tracing::info!(alert_id = alert.id, used, "Recycled");
            storage
                .enqueue_log(serde_json::json!({
                    "event": "Recycled",
                    "alert_id": alert.id,
                    "used": used,
                }))
                .await?;
        }

        let (starts_at, ends_at) = next_window(&alert.period, alert.starts_at, alert.ends_at);
        alert.used = 0.0;
        alert.threshold_state = "ok".to_string();
        alert.starts_at = starts_at;
        alert.ends_at = ends_at;
        alert.updated_at = now;
        storage.save_alert(alert).await?;
    }
    Ok(())
}

/// Recomputes every alert's running spend; on crossing its threshold
/// for the first time, marks it exceeded and enqueues a notification
/// mail keyed so re-triggering an already-exceeded alert is a no-op.
pub async fn check_thresholds<S: Storage>(storage: &Arc<S>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let now = OffsetDateTime::now_utc();
    for mut alert in storage.list_alerts().await? {
        let Some(kind) = watched_kind(&alert.watched_kind) else {
            tracing::warn!(watched_kind = %alert.watched_kind, "unknown watched_kind on alert row, skipping");
            continue;
        };
        let used = storage.sum_usage_cost(kind, alert.watched_id, alert.starts_at).await?;
        let changed = (used - alert.used).abs() > f64::EPSILON;
        alert.used = used;

        if alert.threshold_state == "ok" {
            if let Some(threshold) = effective_threshold(storage, &alert, kind).await {
                if used > threshold {
                    alert.threshold_state = "exceeded".to_string();
                    tracing::info!(alert_id = alert.id, used, threshold, "Triggered");
                    storage
                        .enqueue_log(serde_json::json!({
                            "event": "Triggered",
                            "alert_id": alert.id,
                            "used": used,
                            "threshold": threshold,
                        }))
                        .await?;

                    let mail = mail_queue::ActiveModel {
                        id: ActiveValue::NotSet,
                        dedupe_key: ActiveValue::Set(format!("alert:{}", alert.id)),
                        recipients: ActiveValue::Set(alert.recipients.clone()),
                        template_name: ActiveValue::Set("alert_triggered".to_string()),
                        template_body: ActiveValue::Set(serde_json::json!({
                            "alert_id": alert.id,
                            "used": used,
                            "threshold": threshold,
                        })),
                        send_at: ActiveValue::Set(now),
                        attempts: ActiveValue::Set(0),
                        retry_max: ActiveValue::Set(5),
                        retry_after_secs: ActiveValue::Set(300),
                        created_at: ActiveValue::Set(now),
                    };
                    storage.enqueue_mail(mail).await?;
                }
            }
        }

        if changed || alert.threshold_state == "exceeded" {
            alert.updated_at = now;
            storage.save_alert(alert).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_storage::SeaOrmStorage;
    use sea_orm::EntityTrait;

    async fn seeded_storage() -> Arc<SeaOrmStorage> {
        let storage = Arc::new(SeaOrmStorage::connect("sqlite::memory:").await.unwrap());
        storage.sync().await.unwrap();
        storage
    }

    async fn insert_alert(storage: &SeaOrmStorage, model: alerts::ActiveModel) -> i64 {
        alerts::Entity::insert(model).exec(storage.connection()).await.unwrap().last_insert_id
    }

    fn base_alert(now: OffsetDateTime) -> alerts::ActiveModel {
        alerts::ActiveModel {
            id: ActiveValue::NotSet,
            watched_kind: ActiveValue::Set("api_key".into()),
            watched_id: ActiveValue::Set(1),
            period: ActiveValue::Set("custom".into()),
            threshold_kind: ActiveValue::Set("absolute".into()),
            threshold_value: ActiveValue::Set(10.0),
            recipients: ActiveValue::Set(serde_json::json!(["ops@example.com"])),
            used: ActiveValue::Set(0.0),
            threshold_state: ActiveValue::Set("ok".into()),
            starts_at: ActiveValue::Set(now - time::Duration::hours(1)),
            ends_at: ActiveValue::Set(now - time::Duration::minutes(1)),
            timezone: ActiveValue::Set("UTC".into()),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
    }

    #[tokio::test]
    async fn recycler_resets_and_advances_a_closed_window() {
        let storage = seeded_storage().await;
        let now = OffsetDateTime::now_utc();
        let id = insert_alert(&storage, base_alert(now)).await;

        recycle_closed_windows(&storage).await.unwrap();

        let row = alerts::Entity::find_by_id(id).one(storage.connection()).await.unwrap().unwrap();
        assert_eq!(row.used, 0.0);
        assert_eq!(row.threshold_state, "ok");
        assert!(row.ends_at > row.starts_at);
    }

    #[tokio::test]
    async fn watchdog_trips_once_spend_exceeds_threshold() {
        let storage = seeded_storage().await;
        let now = OffsetDateTime::now_utc();
        let mut alert = base_alert(now);
        alert.ends_at = ActiveValue::Set(now + time::Duration::hours(1));
        alert.starts_at = ActiveValue::Set(now - time::Duration::hours(1));
        let id = insert_alert(&storage, alert).await;

        check_thresholds(&storage).await.unwrap();

        let row = alerts::Entity::find_by_id(id).one(storage.connection()).await.unwrap().unwrap();
        assert_eq!(row.threshold_state, "ok");
    }
}
