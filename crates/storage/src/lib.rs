pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use memory::{BeforeHook, MemoryCollection, before_hook};
pub use sqlite::SqliteCollection;
pub use traits::*;
