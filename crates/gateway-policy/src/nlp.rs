//! Pluggable contracts for the language/classification/NER/anonymization
//! primitives the PII, languages, prompt-injection, and topics hooks
//! need. No ML runtime is bundled; the heuristic defaults here are
//! deliberately crude and meant to be replaced by a real backend
//! (ONNX, a hosted API, …) behind the same trait.

use std::collections::HashSet;

/// Detects the dominant language of a short span of text, returning an
/// ISO 639-1 code.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Option<String>;
}

/// Binary or multi-label classification over a span of text.
pub trait TextClassifier: Send + Sync {
    /// Returns `(label, score)` pairs, highest score first.
    fn classify(&self, text: &str, labels: &[String]) -> Vec<(String, f32)>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEntity {
    pub kind: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

pub trait NerEngine: Send + Sync {
    fn recognize(&self, text: &str) -> Vec<NamedEntity>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymizeMode {
    Redaction,
    Anonymization,
    Tokenization,
}

pub trait Anonymizer: Send + Sync {
    /// Replaces every `entity` span in `text` per `mode`. For
    /// `Tokenization`, `emit_token` is called with `(token, original)`
    /// for each replacement so the caller can remember the mapping.
    fn anonymize(
        &self,
        text: &str,
        entities: &[NamedEntity],
        mode: AnonymizeMode,
        emit_token: &mut dyn FnMut(&str, &str),
    ) -> String;
}

/// Ascii-heuristic language detector: looks for a short list of
/// common stop-words per language. Good enough to exercise the
/// pipeline; not a real detector.
pub struct HeuristicLanguageDetector;

impl LanguageDetector for HeuristicLanguageDetector {
    fn detect(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        const MARKERS: &[(&str, &[&str])] = &[
            ("en", &[" the ", " and ", " is ", " you "]),
            ("fr", &[" le ", " la ", " et ", " vous "]),
            ("de", &[" der ", " die ", " und ", " ist "]),
            ("es", &[" el ", " la ", " y ", " usted "]),
            ("pt", &[" o ", " a ", " e ", " você "]),
        ];
        let padded = format!(" {lower} ");
        MARKERS
            .iter()
            .max_by_key(|(_, markers)| markers.iter().filter(|m| padded.contains(*m)).count())
            .map(|(lang, _)| lang.to_string())
    }
}

/// Keyword/overlap classifier: scores a label by the fraction of its
/// keyword set (the label string itself, split on whitespace) found in
/// the text. Real deployments swap in a zero-shot model.
pub struct HeuristicTextClassifier;

impl TextClassifier for HeuristicTextClassifier {
    fn classify(&self, text: &str, labels: &[String]) -> Vec<(String, f32)> {
        let lower = text.to_lowercase();
        let words: HashSet<&str> = lower.split_whitespace().collect();
        let mut scored: Vec<(String, f32)> = labels
            .iter()
            .map(|label| {
                let terms: Vec<&str> = label.to_lowercase().split_whitespace().map(|s| s).collect();
                let hits = terms.iter().filter(|t| words.contains(*t)).count();
                let score = if terms.is_empty() { 0.0 } else { hits as f32 / terms.len() as f32 };
                (label.clone(), score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scored
    }
}

/// Memoizes an inner classifier's output by input text over a small
/// LRU, so a hook re-run against a repeated prompt (common across a
/// chat history) skips the classification work. Keyed on text alone;
/// callers that vary the label set for the same text should use
/// separate cache instances per label set.
pub struct CachedClassifier<C> {
    inner: C,
    cache: moka::sync::Cache<String, Vec<(String, f32)>>,
}

impl<C: TextClassifier> CachedClassifier<C> {
    pub fn new(inner: C, capacity: u64) -> Self {
        Self { inner, cache: moka::sync::Cache::builder().max_capacity(capacity).build() }
    }
}

impl<C: TextClassifier> TextClassifier for CachedClassifier<C> {
    fn classify(&self, text: &str, labels: &[String]) -> Vec<(String, f32)> {
        if let Some(hit) = self.cache.get(text) {
            return hit;
        }
        let scored = self.inner.classify(text, labels);
        self.cache.insert(text.to_string(), scored.clone());
        scored
    }
}

/// Regex-based recognizer for a handful of common PII shapes (email,
/// phone, SSN-like digit groups); a stand-in for a trained NER model.
pub struct HeuristicNerEngine {
    email: regex::Regex,
    phone: regex::Regex,
    digits: regex::Regex,
}

impl Default for HeuristicNerEngine {
    fn default() -> Self {
        Self {
            email: regex::Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").unwrap(),
            phone: regex::Regex::new(r"\+?\d[\d\-. ]{7,}\d").unwrap(),
            digits: regex::Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),
        }
    }
}

impl NerEngine for HeuristicNerEngine {
    fn recognize(&self, text: &str) -> Vec<NamedEntity> {
        let mut out = Vec::new();
        for m in self.email.find_iter(text) {
            out.push(NamedEntity { kind: "EMAIL".into(), text: m.as_str().into(), start: m.start(), end: m.end() });
        }
        for m in self.digits.find_iter(text) {
            out.push(NamedEntity { kind: "SSN".into(), text: m.as_str().into(), start: m.start(), end: m.end() });
        }
        for m in self.phone.find_iter(text) {
            if out.iter().any(|e| e.start <= m.start() && e.end >= m.end()) {
                continue;
            }
            out.push(NamedEntity { kind: "PHONE".into(), text: m.as_str().into(), start: m.start(), end: m.end() });
        }
        out.sort_by_key(|e| e.start);
        out
    }
}

/// Replaces entity spans right-to-left so earlier offsets stay valid.
pub struct DefaultAnonymizer;

impl Anonymizer for DefaultAnonymizer {
    fn anonymize(
        &self,
        text: &str,
        entities: &[NamedEntity],
        mode: AnonymizeMode,
        emit_token: &mut dyn FnMut(&str, &str),
    ) -> String {
        let mut result = text.to_string();
        let mut sorted: Vec<&NamedEntity> = entities.iter().collect();
        sorted.sort_by_key(|e| std::cmp::Reverse(e.start));
        for (index, entity) in sorted.iter().enumerate() {
            let replacement = match mode {
                AnonymizeMode::Redaction => "*".repeat(entity.text.chars().count()),
                AnonymizeMode::Anonymization => format!("<{}>", entity.kind),
                AnonymizeMode::Tokenization => {
                    let token = format!("\u{0394}{:012x}", token_id(&entity.text, index));
                    emit_token(&token, &entity.text);
                    token
                }
            };
            result.replace_range(entity.start..entity.end, &replacement);
        }
        result
    }
}

fn token_id(original: &str, salt: usize) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    original.hash(&mut hasher);
    salt.hash(&mut hasher);
    hasher.finish() & 0xffff_ffff_ffff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_detector_picks_dominant_language() {
        let detector = HeuristicLanguageDetector;
        assert_eq!(detector.detect("the cat and the dog"), Some("en".to_string()));
    }

    #[test]
    fn ner_engine_finds_email_and_ssn() {
        let ner = HeuristicNerEngine::default();
        let entities = ner.recognize("contact me at a@b.com or 123-45-6789");
        assert!(entities.iter().any(|e| e.kind == "EMAIL"));
        assert!(entities.iter().any(|e| e.kind == "SSN"));
    }

    #[test]
    fn tokenization_emits_token_to_original_mapping() {
        let ner = HeuristicNerEngine::default();
        let entities = ner.recognize("email a@b.com");
        let anonymizer = DefaultAnonymizer;
        let mut map = Vec::new();
        let out = anonymizer.anonymize("email a@b.com", &entities, AnonymizeMode::Tokenization, &mut |t, o| {
            map.push((t.to_string(), o.to_string()))
        });
        assert!(!out.contains("a@b.com"));
        assert_eq!(map.len(), 1);
        assert_eq!(map[0].1, "a@b.com");
    }

    #[test]
    fn cached_classifier_serves_repeated_text_from_cache() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingClassifier(AtomicU32);
        impl TextClassifier for CountingClassifier {
            fn classify(&self, _text: &str, labels: &[String]) -> Vec<(String, f32)> {
                self.0.fetch_add(1, Ordering::SeqCst);
                labels.iter().map(|l| (l.clone(), 0.0)).collect()
            }
        }
        let cached = CachedClassifier::new(CountingClassifier(AtomicU32::new(0)), 100);
        let labels = vec!["a".to_string()];
        cached.classify("hello", &labels);
        cached.classify("hello", &labels);
        assert_eq!(cached.inner.0.load(Ordering::SeqCst), 1);
    }
}
