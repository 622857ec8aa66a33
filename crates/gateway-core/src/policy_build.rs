use std::collections::HashSet;
use std::sync::Arc;

use gateway_policy::hooks::{
    CodeProvenanceHook, CodeProvenanceOptions, InvisibleTextAction, InvisibleTextHook, LanguageAction, LanguagesHook, PiiAction,
    PiiHook, PromptInjectionAction, PromptInjectionHook, TopicAction, TopicDefinition, TopicsHook,
};
use gateway_policy::nlp::{CachedClassifier, DefaultAnonymizer, HeuristicLanguageDetector, HeuristicNerEngine, HeuristicTextClassifier};
use gateway_policy::HookSet;
use gateway_storage::entities::policies;

/// One entry of a policy document's `controls` array: `{control,
/// options}`, where `options`' shape depends on `control`.
#[derive(serde::Deserialize)]
struct ControlDoc {
    control: String,
    #[serde(default)]
    options: serde_json::Value,
}

fn str_field(options: &serde_json::Value, key: &str, default: &str) -> String {
    options.get(key).and_then(|v| v.as_str()).unwrap_or(default).to_string()
}

fn f32_field(options: &serde_json::Value, key: &str, default: f32) -> f32 {
    options.get(key).and_then(|v| v.as_f64()).map(|v| v as f32).unwrap_or(default)
}

fn build_hook(doc: &ControlDoc) -> Option<Arc<dyn gateway_policy::Hook>> {
    match doc.control.as_str() {
        "invisible_text" => {
            let action = match str_field(&doc.options, "action", "sanitization").as_str() {
                "ban" => InvisibleTextAction::Ban,
                _ => InvisibleTextAction::Sanitization,
            };
            Some(Arc::new(InvisibleTextHook { action }))
        }
        "languages" => {
            let action = match str_field(&doc.options, "action", "disabled").as_str() {
                "ban" => LanguageAction::Ban,
                "sanitization" => LanguageAction::Sanitization,
                "custom_response" => LanguageAction::CustomResponse(str_field(&doc.options, "message", "")),
                _ => LanguageAction::Disabled,
            };
            let allow: HashSet<String> = doc
                .options
                .get("allow")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            Some(Arc::new(LanguagesHook { action, allow, detector: Arc::new(HeuristicLanguageDetector) }))
        }
        "prompt_injection" => {
            let action = match str_field(&doc.options, "action", "ban").as_str() {
                "sanitization" => PromptInjectionAction::Sanitization { threshold: f32_field(&doc.options, "threshold", 0.5) },
                _ => PromptInjectionAction::Ban,
            };
            Some(Arc::new(PromptInjectionHook {
                action,
                classifier: Arc::new(CachedClassifier::new(HeuristicTextClassifier, 512)),
            }))
        }
        "topics" => {
            let action = match str_field(&doc.options, "action", "disabled").as_str() {
                "ban" => TopicAction::Ban,
                "custom_response" => TopicAction::CustomResponse(str_field(&doc.options, "message", "")),
                _ => TopicAction::Disabled,
            };
            let topics = doc
                .options
                .get("topics")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|t| {
                            Some(TopicDefinition {
                                label: t.get("label")?.as_str()?.to_string(),
                                threshold: t.get("threshold").and_then(|v| v.as_f64()).unwrap_or(0.5) as f32,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(Arc::new(TopicsHook {
                action,
                topics,
                classifier: Arc::new(CachedClassifier::new(HeuristicTextClassifier, 512)),
            }))
        }
        "pii" => {
            let action = match str_field(&doc.options, "action", "disabled").as_str() {
                "redaction" => PiiAction::Redaction,
                "anonymization" => PiiAction::Anonymization,
                "tokenization" => PiiAction::Tokenization,
                _ => PiiAction::Disabled,
            };
            Some(Arc::new(PiiHook { action, ner: Arc::new(HeuristicNerEngine::default()), anonymizer: Arc::new(DefaultAnonymizer) }))
        }
        "code_provenance" => {
            let options = CodeProvenanceOptions {
                fullscan: doc.options.get("fullscan").and_then(|v| v.as_bool()).unwrap_or(false),
                footnote: doc.options.get("footnote").and_then(|v| v.as_bool()).unwrap_or(true),
                record_metadata: doc.options.get("record_metadata").and_then(|v| v.as_bool()).unwrap_or(true),
            };
            Some(Arc::new(CodeProvenanceHook { options, scanners: Vec::new() }))
        }
        _ => None,
    }
}

/// Compiles a policy document's ordered `controls` list into hooks.
/// Unrecognized control names are skipped rather than rejected, so a
/// newer admin UI can add controls this build doesn't know about yet
/// without breaking every existing key.
pub fn build_hooks(doc: &policies::Model) -> Vec<Arc<dyn gateway_policy::Hook>> {
    let controls: Vec<ControlDoc> = serde_json::from_value(doc.controls.clone()).unwrap_or_default();
    controls.iter().filter_map(build_hook).collect()
}

/// Convenience wrapper for a single policy document.
pub fn build_hookset(doc: &policies::Model) -> HookSet {
    HookSet::new(build_hooks(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn policy_doc(controls: serde_json::Value) -> policies::Model {
        policies::Model {
            id: 1,
            name: "p".into(),
            controls,
            scopes: serde_json::json!([]),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn unrecognized_controls_are_skipped_not_rejected() {
        let doc = policy_doc(serde_json::json!([{"control": "invisible_text", "options": {"action": "ban"}}, {"control": "nonexistent"}]));
        let set = build_hookset(&doc);
        let _ = set;
    }

    #[test]
    fn empty_controls_builds_an_empty_hookset() {
        let doc = policy_doc(serde_json::json!([]));
        let _set = build_hookset(&doc);
    }
}
