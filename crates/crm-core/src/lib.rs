pub mod error;
pub mod models;

pub use error::{CoreError, Result};
pub use models::custom_value::CustomValue;
pub use models::fingerprint::Fingerprint;
pub use models::identity_profile::{IdentityProfile, IdentityProfileBuilder};
pub use models::identity_stamp::IdentityStamp;
pub use models::sync_outcome::{FailureKind, OutcomeSource, SyncFailure, SyncOutcome, SyncReport};

pub use error_location::ErrorLocation;
