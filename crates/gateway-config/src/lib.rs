pub mod scope;
pub mod store;

pub use scope::ScopeContext;
pub use store::ConfigStore;
