//! Campus Server Library
//!
//! Core functionality for the bootcamp platform:
//! - SQLite storage for users, bootcamps, invoices, tickets and the blog
//! - JWT authentication and password hashing
//! - OTP login with SMS delivery
//! - Workflow services that enforce roles and status lifecycles

pub mod auth;
pub mod notifications;
pub mod service;
pub mod storage;
