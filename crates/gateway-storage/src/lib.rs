pub mod db;
pub mod entities;
pub mod seaorm;
pub mod storage;

pub use seaorm::SeaOrmStorage;
pub use storage::{Storage, StorageError, StorageResult, WatchedKind};
