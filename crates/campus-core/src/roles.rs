//! Roles and the single permission decision.
//!
//! Every workflow asks [`authorize`] before touching an entity it does not
//! obviously own. The decision depends only on the actor's role, the action
//! and whether the actor owns the target.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Normal,
    Support,
    Admin,
}

impl Role {
    /// Support staff and admins act on behalf of the platform.
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Support | Self::Admin)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Support => "support",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normal" => Ok(Self::Normal),
            "support" => Ok(Self::Support),
            "admin" => Ok(Self::Admin),
            other => Err(Error::Validation(format!("unknown role '{other}'"))),
        }
    }
}

/// The authenticated caller of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub const fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Ownership of a resource held by `owner_id`.
    pub const fn ownership_of(&self, owner_id: i64) -> Ownership {
        if self.user_id == owner_id {
            Ownership::Owner
        } else {
            Ownership::Other
        }
    }

    pub fn authorize(&self, action: Action, owner_id: Option<i64>) -> Result<()> {
        let ownership = owner_id.map_or(Ownership::Other, |id| self.ownership_of(id));
        authorize(self.role, action, ownership)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owner,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create or edit bootcamps and categories, change bootcamp status.
    ManageCatalog,
    /// Activate or deactivate accounts.
    ManageUsers,
    /// Approve, reject or review a bootcamp registration.
    DecideRegistration,
    /// Read an owned resource (invoice, ticket, registration).
    ViewResource,
    PayInvoice,
    CreateInvoiceForOthers,
    /// Cancel or fail a pending invoice.
    SettleInvoice,
    PostTicketMessage,
    CloseTicket,
    /// Publish posts, approve comments, manage blog taxonomy.
    ModerateBlog,
    EditPost,
}

/// Decide whether `role` may perform `action` given its `ownership` of the target.
pub fn authorize(role: Role, action: Action, ownership: Ownership) -> Result<()> {
    let owner = ownership == Ownership::Owner;
    let allowed = match action {
        Action::ManageCatalog | Action::ManageUsers => role == Role::Admin,
        Action::DecideRegistration
        | Action::CreateInvoiceForOthers
        | Action::SettleInvoice
        | Action::ModerateBlog => role.is_privileged(),
        Action::ViewResource
        | Action::PostTicketMessage
        | Action::CloseTicket
        | Action::EditPost => owner || role.is_privileged(),
        // Nobody pays someone else's invoice, staff included.
        Action::PayInvoice => owner,
    };

    if allowed {
        Ok(())
    } else {
        Err(Error::Forbidden(format!("{role} may not {action:?}")))
    }
}
