pub mod custom_value;
pub mod fingerprint;
pub mod identity_profile;
pub mod identity_stamp;
pub mod sync_outcome;
