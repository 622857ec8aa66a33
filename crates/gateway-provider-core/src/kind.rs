use std::fmt;

/// The ten provider kinds the registry recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    AzureOpenAi,
    Bedrock,
    Gemini,
    Mistral,
    Anthropic,
    OpenAiCompatible,
    AzureMlChatScore,
    AzureMlPromptScore,
    AzureMlEmbeddingScore,
}

impl ProviderKind {
    /// Canonical lowercase tag used in `providers.kind` documents and in
    /// the `provider_name/alias` prefix lookup.
    pub fn tag(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::AzureOpenAi => "azure_openai",
            ProviderKind::Bedrock => "bedrock",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAiCompatible => "openai_compatible",
            ProviderKind::AzureMlChatScore => "azure_ml_chat_score",
            ProviderKind::AzureMlPromptScore => "azure_ml_prompt_score",
            ProviderKind::AzureMlEmbeddingScore => "azure_ml_embedding_score",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        let lower = tag.to_ascii_lowercase();
        Some(match lower.as_str() {
            "openai" => ProviderKind::OpenAi,
            "azure_openai" => ProviderKind::AzureOpenAi,
            "bedrock" => ProviderKind::Bedrock,
            "gemini" => ProviderKind::Gemini,
            "mistral" => ProviderKind::Mistral,
            "anthropic" => ProviderKind::Anthropic,
            "openai_compatible" => ProviderKind::OpenAiCompatible,
            "azure_ml_chat_score" => ProviderKind::AzureMlChatScore,
            "azure_ml_prompt_score" => ProviderKind::AzureMlPromptScore,
            "azure_ml_embedding_score" => ProviderKind::AzureMlEmbeddingScore,
            _ => return None,
        })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ProviderKind::parse("OPENAI"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse("openai"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse("not_a_kind"), None);
    }

    #[test]
    fn round_trips_through_tag() {
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::AzureOpenAi,
            ProviderKind::Bedrock,
            ProviderKind::Gemini,
            ProviderKind::Mistral,
            ProviderKind::Anthropic,
            ProviderKind::OpenAiCompatible,
            ProviderKind::AzureMlChatScore,
            ProviderKind::AzureMlPromptScore,
            ProviderKind::AzureMlEmbeddingScore,
        ] {
            assert_eq!(ProviderKind::parse(kind.tag()), Some(kind));
        }
    }
}
