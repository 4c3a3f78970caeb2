//! Provider infrastructure for external cloud services.

pub mod google;

pub use google::{
    CLOUD_PLATFORM_SCOPE, CredentialSource, DEVSTORAGE_FULL_CONTROL_SCOPE, GoogleAuthClient,
    GoogleError, TokenProvider,
};
