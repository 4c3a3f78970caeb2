//! Google Cloud credentials shared by the GCS storage backend and the Secret
//! Manager loader.
//!
//! - **auth**: credential sources and access tokens
//! - **error**: error type for Google REST calls

pub mod auth;
pub mod error;

pub use auth::{CredentialSource, GoogleAuthClient, TokenProvider};
pub use error::GoogleError;

#[cfg(test)]
pub use auth::MockTokenProvider;

/// Scope covering object writes and ACL changes.
pub const DEVSTORAGE_FULL_CONTROL_SCOPE: &str =
    "https://www.googleapis.com/auth/devstorage.full_control";

/// Broad scope used for Secret Manager access.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
