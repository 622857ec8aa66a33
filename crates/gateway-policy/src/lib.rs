pub mod error;
pub mod event;
pub mod hook;
pub mod hooks;
pub mod nlp;
pub mod set;

pub use error::HookError;
pub use event::{PolicyDigest, PolicyEvent};
pub use hook::{CompletionTail, EmbeddingTail, Hook, HookOutcome, TokenMap};
pub use set::{HookSet, PolicyOutcome};
