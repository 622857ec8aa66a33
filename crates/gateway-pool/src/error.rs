use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("model '{requested}' is not listed in this pool; known aliases: {known:?}")]
    UnlistedModel { requested: String, known: Vec<String> },
    #[error("no entry in this pool supports the requested features: {features:?}")]
    UnsupportedFeatures { features: Vec<gateway_provider_core::Feature> },
    #[error("unknown provider '{provider}'")]
    UnknownProvider { provider: String },
}
