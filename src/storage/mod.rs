pub mod memory;
pub mod namespaced;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use memory::MemoryBackend;
pub use namespaced::{NamespacedVisitStore, NAMESPACE};
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;
pub use trait_def::{KeyValueBackend, StorageError, StorageResult, VisitLogs, VisitStore};
