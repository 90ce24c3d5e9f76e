//! Campus Core Library
//!
//! Shared functionality for Campus components:
//! - Roles and the central permission check
//! - Status lifecycles for bootcamps, registrations, invoices and tickets
//! - OTP issuance policy and code generation
//! - Configuration resolution and hierarchy
//! - Common error and database types

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod otp;
pub mod roles;
pub mod tracing_init;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use roles::{Action, Actor, Ownership, Role};
