pub mod memory;
pub mod sqlite;

pub use memory::InMemoryRepository;
pub use snip_core::repository::{Repository, Result, UrlRecord};
pub use snip_core::StorageError;
pub use sqlite::SqliteRepository;
