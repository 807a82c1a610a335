//! Credential model and secret wrapper.

pub mod credential;
pub mod secret;

pub use credential::*;
pub use secret::*;
