pub mod error;
pub mod identity_manager;
pub mod logger;
pub mod remote_client;
pub mod retry;
pub mod sync_coordinator;

pub use error::{Result, SyncError};
pub use identity_manager::IdentityManager;
pub use remote_client::{RemoteError, RemoteIdentityClient};
pub use retry::{IsRetryable, with_retry};
pub use sync_coordinator::{SyncCoordinator, SyncSnapshot, SyncTicket};
