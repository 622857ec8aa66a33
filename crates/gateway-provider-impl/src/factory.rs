use std::sync::Arc;

use gateway_provider_core::{Provider, ProviderError, ProviderKind};
use gateway_storage::entities::providers::Model as ProviderDoc;

use crate::anthropic::AnthropicProvider;
use crate::azure_ml::AzureMlProvider;
use crate::bedrock::BedrockProvider;
use crate::credentials::RestCredentials;
use crate::gemini::GeminiProvider;
use crate::openai_compatible::OpenAiCompatibleProvider;

/// Builds the concrete `Provider` for a `providers` document, dispatched
/// on its `kind` tag. Intended as the `builder` closure passed to
/// `gateway_provider_core::ProviderRegistry::new`.
pub fn build_provider(doc: &ProviderDoc) -> Result<Arc<dyn Provider>, ProviderError> {
    let kind = ProviderKind::parse(&doc.kind)
        .ok_or_else(|| ProviderError::new(format!("unknown provider kind: {}", doc.kind), 500, "internal_error"))?;
    let creds = RestCredentials::parse(&doc.credentials)?;

    Ok(match kind {
        ProviderKind::OpenAi | ProviderKind::AzureOpenAi | ProviderKind::Mistral | ProviderKind::OpenAiCompatible => {
            Arc::new(OpenAiCompatibleProvider::new(kind, creds)) as Arc<dyn Provider>
        }
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(creds)) as Arc<dyn Provider>,
        ProviderKind::Bedrock => Arc::new(BedrockProvider::new(creds)) as Arc<dyn Provider>,
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(creds)) as Arc<dyn Provider>,
        ProviderKind::AzureMlChatScore | ProviderKind::AzureMlPromptScore | ProviderKind::AzureMlEmbeddingScore => {
            Arc::new(AzureMlProvider::new(kind, creds)) as Arc<dyn Provider>
        }
    })
}
