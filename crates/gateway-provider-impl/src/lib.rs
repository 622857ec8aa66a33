pub mod anthropic;
pub mod azure_ml;
pub mod bedrock;
pub mod credentials;
pub mod factory;
pub mod gemini;
pub mod http;
pub mod openai_compatible;
pub mod sigv4;

pub use anthropic::AnthropicProvider;
pub use azure_ml::AzureMlProvider;
pub use bedrock::BedrockProvider;
pub use factory::build_provider;
pub use gemini::GeminiProvider;
pub use openai_compatible::OpenAiCompatibleProvider;
