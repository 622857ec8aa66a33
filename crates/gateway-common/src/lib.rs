//! Process-wide configuration merge layer and small shared types used
//! across every other crate in the workspace.

mod config;
mod scope;

pub use config::{GlobalConfig, GlobalConfigError, GlobalConfigPatch};
pub use scope::{ScopePath, is_visible};
