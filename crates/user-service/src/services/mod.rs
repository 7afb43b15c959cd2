//! Business logic for the user service.

pub mod token_service;

pub use token_service::{IssuedToken, TokenIssuer, UserIdentity};
