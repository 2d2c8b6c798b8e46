//! Business logic layer.

pub mod directory_authenticator;
pub mod token_service;

pub use directory_authenticator::{
    AttemptError, DirectoryAuthenticator, Verification, VerificationStrategy,
};
pub use token_service::TokenMinter;
