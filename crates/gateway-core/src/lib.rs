pub mod auth;
pub mod budget;
pub mod context;
pub mod error;
pub mod invoke;
pub mod policy_build;
pub mod pool_source;
pub mod stream;
pub mod usage;

pub use auth::{hash_api_key, AuthGate, RateLimiter};
pub use budget::{pick_spend_summary, BudgetCache, BudgetCacheEntry, BudgetCacheError};
pub use context::{GatewayDeps, RequestContext};
pub use error::GatewayError;
pub use invoke::{invoke_completion, invoke_embedding, CompletionOutcome, EmbeddingOutcome};
pub use policy_build::{build_hooks, build_hookset};
pub use pool_source::StorageBackedPoolSource;
pub use stream::{TrackingStream, UntokenizingStream};
pub use usage::UsageDraft;
