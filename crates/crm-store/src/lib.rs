pub mod error;
pub mod file_store;
pub mod identity_store;
pub mod sqlite_store;

pub use error::{Result, StoreError};
pub use file_store::FileIdentityStore;
pub use identity_store::LocalIdentityStore;
pub use sqlite_store::SqliteIdentityStore;
