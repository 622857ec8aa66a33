pub mod error;
pub mod merge;
pub mod pool;

pub use error::PoolError;
pub use merge::{build_from_apikey, PoolSource};
pub use pool::{ModelInfo, ModelPool, ModelPoolBuilder};
