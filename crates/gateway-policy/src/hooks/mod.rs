pub mod code_provenance;
pub mod invisible_text;
pub mod languages;
pub mod pii;
pub mod prompt_injection;
pub mod topics;

pub use code_provenance::{CodeProvenanceHook, CodeProvenanceOptions};
pub use invisible_text::{InvisibleTextAction, InvisibleTextHook};
pub use languages::{LanguageAction, LanguagesHook};
pub use pii::{PiiAction, PiiHook};
pub use prompt_injection::{PromptInjectionAction, PromptInjectionHook};
pub use topics::{TopicAction, TopicDefinition, TopicsHook};

/// Splits on sentence-ending punctuation followed by whitespace; crude
/// but enough to bound each hook's unit of analysis to roughly a
/// sentence.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?') {
            let next_is_boundary = bytes
                .get(i + ch.len_utf8())
                .map(|b| *b == b' ' || *b == b'\n')
                .unwrap_or(true);
            if next_is_boundary {
                let end = i + ch.len_utf8();
                let candidate = text[start..end].trim();
                if !candidate.is_empty() {
                    sentences.push(candidate);
                }
                start = end;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_sentence_terminators() {
        let out = split_sentences("Hi there. How are you? Fine!");
        assert_eq!(out, vec!["Hi there.", "How are you?", "Fine!"]);
    }
}
