//! `SQLite` storage for the Campus server.
//!
//! Provides persistence for users and tokens, the bootcamp catalog and
//! registrations, invoices and their ledger, support tickets, and the blog.
//! Status writes are compare-and-set on the previous status so concurrent
//! requests cannot both perform the same transition.

mod db;
mod models;
mod queries_billing;
mod queries_blog;
mod queries_catalog;
mod queries_tickets;
mod queries_users;


pub use db::{CampusDatabase, DatabaseError};
pub use models::*;
pub use queries_billing::{OfflineReceipt, OnlineReceipt, PaymentRecord};
pub use queries_blog::{NewPost, PostFilter};
pub use queries_catalog::NewBootcamp;
pub use queries_users::{NewUser, OtpWrite};
