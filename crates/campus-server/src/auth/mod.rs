//! Authentication for Campus accounts.
//!
//! Provides JWT token management and password hashing.

pub mod claims;
pub mod jwt;
pub mod password;

pub use claims::{Claims, TokenType};
pub use jwt::JwtManager;
