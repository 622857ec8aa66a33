use std::time::Instant;

use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use gateway_storage::entities::usage_records::ActiveModel as UsageActiveModel;
use sea_orm::ActiveValue;

/// Accumulates the fields a usage record needs as the invoke pipeline
/// learns them, then finishes into an `ActiveModel` ready to insert.
#[derive(Clone)]
pub struct UsageDraft {
    pub trace_id: Option<String>,
    pub owner_id: Option<i64>,
    pub key_id: Option<i64>,
    pub llm_id: Option<i64>,
    pub pool_id: Option<i64>,
    pub model: Option<String>,
    pub alias: Option<String>,
    pub provider: Option<String>,
    pub tags: Vec<String>,
    pub dev_id: Option<String>,
    pub scopes: Vec<String>,
    pub is_stream: bool,
    started_at: Instant,
}

impl UsageDraft {
    pub fn new(owner_id: i64, key_id: i64, scopes: Vec<String>, tags: Vec<String>) -> Self {
        Self {
            trace_id: None,
            owner_id: Some(owner_id),
            key_id: Some(key_id),
            llm_id: None,
            pool_id: None,
            model: None,
            alias: None,
            provider: None,
            tags,
            dev_id: None,
            scopes,
            is_stream: false,
            started_at: Instant::now(),
        }
    }

    fn base(&self) -> UsageActiveModel {
        let elapsed_ms = self.started_at.elapsed().as_millis() as i64;
        UsageActiveModel {
            id: ActiveValue::NotSet,
            trace_id: ActiveValue::Set(self.trace_id.clone()),
            at: ActiveValue::Set(OffsetDateTime::now_utc()),
            response_time_ms: ActiveValue::Set(elapsed_ms),
            is_error: ActiveValue::Set(false),
            is_warning: ActiveValue::Set(false),
            error: ActiveValue::Set(None),
            prompt_tokens: ActiveValue::Set(None),
            completion_tokens: ActiveValue::Set(None),
            total_tokens: ActiveValue::Set(None),
            prompt_cost: ActiveValue::Set(None),
            completion_cost: ActiveValue::Set(None),
            total_cost: ActiveValue::Set(None),
            owner_id: ActiveValue::Set(self.owner_id),
            key_id: ActiveValue::Set(self.key_id),
            llm_id: ActiveValue::Set(self.llm_id),
            pool_id: ActiveValue::Set(self.pool_id),
            model: ActiveValue::Set(self.model.clone()),
            alias: ActiveValue::Set(self.alias.clone()),
            provider: ActiveValue::Set(self.provider.clone()),
            tags: ActiveValue::Set(serde_json::to_value(&self.tags).unwrap_or(JsonValue::Array(vec![]))),
            dev_id: ActiveValue::Set(self.dev_id.clone()),
            scopes: ActiveValue::Set(serde_json::to_value(&self.scopes).unwrap_or(JsonValue::Array(vec![]))),
            policy_events: ActiveValue::Set(JsonValue::Array(vec![])),
            policy_digest: ActiveValue::Set(None),
            policy_event_count: ActiveValue::Set(0),
            is_stream: ActiveValue::Set(self.is_stream),
            created_at: ActiveValue::Set(OffsetDateTime::now_utc()),
        }
    }

    /// A successful invocation: tokens, cost, and policy fingerprint.
    pub fn set_model_usage(
        &self,
        prompt_tokens: i64,
        completion_tokens: i64,
        prompt_cost: f64,
        completion_cost: f64,
        policy_events: &[gateway_policy::PolicyEvent],
        policy_digest: Option<String>,
    ) -> UsageActiveModel {
        let mut model = self.base();
        model.prompt_tokens = ActiveValue::Set(Some(prompt_tokens));
        model.completion_tokens = ActiveValue::Set(Some(completion_tokens));
        model.total_tokens = ActiveValue::Set(Some(prompt_tokens + completion_tokens));
        model.prompt_cost = ActiveValue::Set(Some(prompt_cost));
        model.completion_cost = ActiveValue::Set(Some(completion_cost));
        model.total_cost = ActiveValue::Set(Some(prompt_cost + completion_cost));
        model.policy_events = ActiveValue::Set(serde_json::to_value(policy_events).unwrap_or(JsonValue::Array(vec![])));
        model.policy_event_count = ActiveValue::Set(policy_events.len() as i32);
        model.policy_digest = ActiveValue::Set(policy_digest);
        model
    }

    /// A failed candidate or a policy rejection: `{message, type,
    /// http_code, is_internal?}` embedded in `error`.
    pub fn set_error(
        &self,
        message: &str,
        kind: &str,
        http_code: u16,
        is_internal: bool,
        policy_events: &[gateway_policy::PolicyEvent],
        policy_digest: Option<String>,
    ) -> UsageActiveModel {
        let mut model = self.base();
        model.is_error = ActiveValue::Set(true);
        model.error = ActiveValue::Set(Some(serde_json::json!({
            "message": message,
            "type": kind,
            "http_code": http_code,
            "is_internal": is_internal,
        })));
        model.policy_events = ActiveValue::Set(serde_json::to_value(policy_events).unwrap_or(JsonValue::Array(vec![])));
        model.policy_event_count = ActiveValue::Set(policy_events.len() as i32);
        model.policy_digest = ActiveValue::Set(policy_digest);
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_model_usage_sums_cost_and_tokens() {
        let draft = UsageDraft::new(1, 2, vec![], vec![]);
        let model = draft.set_model_usage(100, 50, 0.01, 0.02, &[], None);
        assert_eq!(model.total_tokens, ActiveValue::Set(Some(150)));
        assert_eq!(model.total_cost, ActiveValue::Set(Some(0.03000000000000001)));
    }

    #[test]
    fn set_error_marks_is_error() {
        let draft = UsageDraft::new(1, 2, vec![], vec![]);
        let model = draft.set_error("boom", "server_error", 500, true, &[], None);
        assert_eq!(model.is_error, ActiveValue::Set(true));
    }
}
