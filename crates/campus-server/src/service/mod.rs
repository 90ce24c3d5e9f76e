//! Application workflows.
//!
//! Each service owns one module of the platform and takes the calling
//! [`Actor`] explicitly; permission checks go through
//! [`campus_core::roles::authorize`]. [`Services`] wires them all from a
//! [`Config`].

pub mod account;
pub mod billing;
pub mod blog;
pub mod catalog;
pub mod otp;
pub mod tickets;
mod validate;

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod test_helpers;

use std::sync::Arc;

use campus_core::otp::CodeSource;
use campus_core::{Clock, Config};

pub use account::{AccountService, NewAccount, Session, TokenPair};
pub use billing::{BillingService, PaymentGateway, PaymentSummary, SimulatedGateway};
pub use blog::{BlogService, CommentThread, PostView};
pub use campus_core::Actor;
pub use catalog::CatalogService;
pub use otp::{OtpIssued, OtpService};
pub use tickets::{TicketService, TicketThread};

use crate::auth::JwtManager;
use crate::notifications::NotificationDispatcher;
use crate::storage::CampusDatabase;

/// External collaborators the workflows depend on.
#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub codes: Arc<dyn CodeSource>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub gateway: Arc<dyn PaymentGateway>,
}

/// Every workflow, sharing one database and one set of collaborators.
pub struct Services {
    pub accounts: AccountService,
    pub otp: OtpService,
    pub catalog: CatalogService,
    pub billing: BillingService,
    pub tickets: TicketService,
    pub blog: BlogService,
}

impl Services {
    pub fn new(db: &CampusDatabase, config: &Config, deps: Collaborators) -> Self {
        let jwt = Arc::new(JwtManager::new(
            config.auth.jwt_secret.as_bytes(),
            config.auth.access_ttl_secs,
            config.auth.refresh_ttl_secs,
        ));

        Self {
            accounts: AccountService::new(db.clone(), Arc::clone(&jwt)),
            otp: OtpService::new(
                db.clone(),
                jwt,
                Arc::clone(&deps.clock),
                deps.codes,
                Arc::clone(&deps.dispatcher),
                config.otp.clone(),
            ),
            catalog: CatalogService::new(
                db.clone(),
                Arc::clone(&deps.clock),
                Arc::clone(&deps.dispatcher),
            ),
            billing: BillingService::new(
                db.clone(),
                deps.gateway,
                Arc::clone(&deps.clock),
                config.billing.min_invoice_amount,
            ),
            tickets: TicketService::new(
                db.clone(),
                deps.clock,
                deps.dispatcher,
                config.notifications.support_recipient.clone(),
            ),
            blog: BlogService::new(db.clone()),
        }
    }
}
