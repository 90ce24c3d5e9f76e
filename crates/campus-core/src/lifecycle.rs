//! Status lifecycles for bootcamps, registrations, invoices and tickets.
//!
//! ```text
//! Bootcamp:      draft ─▶ registration ─▶ ongoing ─▶ completed
//!                  └──────────┴──────────────┴──▶ canceled
//!
//! Registration:  pending ─▶ reviewing ─▶ approved | rejected
//!                   └────────────────▶ approved | rejected
//!
//! Invoice:       pending ─▶ paid | failed | canceled
//!
//! Ticket:        under_review ─▶ answered ⇄ unanswered
//!                      └────────────┴──────────┴──▶ closed (absorbing)
//! ```
//!
//! Each machine is an enum whose `apply`/`transition_to` returns the next
//! state or an error; storage writes the result with a compare-and-set on
//! the previous state.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

macro_rules! status_text {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(Error::Validation(format!(
                        concat!("unknown ", stringify!($ty), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

fn invalid(entity: &'static str, from: impl ToString, event: impl std::fmt::Debug) -> Error {
    Error::InvalidTransition {
        entity,
        from: from.to_string(),
        event: format!("{event:?}"),
    }
}

// ─── Bootcamp ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BootcampStatus {
    Draft,
    Registration,
    Ongoing,
    Completed,
    Canceled,
}

status_text!(BootcampStatus {
    Draft => "draft",
    Registration => "registration",
    Ongoing => "ongoing",
    Completed => "completed",
    Canceled => "canceled",
});

impl BootcampStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }

    pub const fn accepts_registrations(self) -> bool {
        matches!(self, Self::Registration)
    }

    /// Move forward one stage, or cancel from any non-terminal stage.
    pub fn transition_to(self, next: Self) -> Result<Self> {
        let allowed = matches!(
            (self, next),
            (Self::Draft, Self::Registration)
                | (Self::Registration, Self::Ongoing)
                | (Self::Ongoing, Self::Completed)
        ) || (next == Self::Canceled && !self.is_terminal());

        if allowed {
            Ok(next)
        } else {
            Err(invalid("bootcamp", self, next))
        }
    }
}

// ─── Bootcamp registration ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Reviewing,
    Approved,
    Rejected,
}

status_text!(RegistrationStatus {
    Pending => "pending",
    Reviewing => "reviewing",
    Approved => "approved",
    Rejected => "rejected",
});

/// Privileged decisions on a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationDecision {
    Review,
    Approve,
    Reject,
}

impl RegistrationStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    pub fn apply(self, decision: RegistrationDecision) -> Result<Self> {
        match (self, decision) {
            (Self::Pending, RegistrationDecision::Review) => Ok(Self::Reviewing),
            (Self::Pending | Self::Reviewing, RegistrationDecision::Approve) => Ok(Self::Approved),
            (Self::Pending | Self::Reviewing, RegistrationDecision::Reject) => Ok(Self::Rejected),
            (from, decision) => Err(invalid("registration", from, decision)),
        }
    }
}

// ─── Invoice ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Failed,
    Canceled,
}

status_text!(InvoiceStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Canceled => "canceled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentMethod {
    Online,
    Offline,
    Wallet,
}

status_text!(PaymentMethod {
    Online => "online",
    Offline => "offline",
    Wallet => "wallet",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceEvent {
    Pay,
    Fail,
    Cancel,
}

impl InvoiceStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Re-paying a paid invoice is rejected with [`Error::AlreadyPaid`].
    pub fn apply(self, event: InvoiceEvent) -> Result<Self> {
        match (self, event) {
            (Self::Pending, InvoiceEvent::Pay) => Ok(Self::Paid),
            (Self::Pending, InvoiceEvent::Fail) => Ok(Self::Failed),
            (Self::Pending, InvoiceEvent::Cancel) => Ok(Self::Canceled),
            (Self::Paid, InvoiceEvent::Pay) => Err(Error::AlreadyPaid),
            (from, event) => Err(invalid("invoice", from, event)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TransactionKind {
    Payment,
    Charge,
    Refund,
}

status_text!(TransactionKind {
    Payment => "payment",
    Charge => "charge",
    Refund => "refund",
});

// ─── Ticket ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TicketStatus {
    UnderReview,
    Answered,
    Unanswered,
    Closed,
}

status_text!(TicketStatus {
    UnderReview => "under_review",
    Answered => "answered",
    Unanswered => "unanswered",
    Closed => "closed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketEvent {
    SupportMessage,
    OwnerMessage,
    Close,
}

impl TicketEvent {
    /// The event a new message produces, from the sender's support flag.
    pub const fn for_message(is_from_support: bool) -> Self {
        if is_from_support {
            Self::SupportMessage
        } else {
            Self::OwnerMessage
        }
    }
}

impl TicketStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Closed absorbs every event, including a repeated close.
    pub const fn apply(self, event: TicketEvent) -> Self {
        match (self, event) {
            (Self::Closed, _) | (_, TicketEvent::Close) => Self::Closed,
            (_, TicketEvent::SupportMessage) => Self::Answered,
            (_, TicketEvent::OwnerMessage) => Self::Unanswered,
        }
    }
}

// ─── Blog post ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Published,
}

status_text!(PostStatus {
    Draft => "draft",
    Published => "published",
});

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bootcamp_moves_forward_only() {
        let s = BootcampStatus::Draft;
        let s = s.transition_to(BootcampStatus::Registration).unwrap();
        assert!(s.accepts_registrations());
        let s = s.transition_to(BootcampStatus::Ongoing).unwrap();
        assert!(s.transition_to(BootcampStatus::Registration).is_err());
        let s = s.transition_to(BootcampStatus::Completed).unwrap();
        assert!(s.transition_to(BootcampStatus::Canceled).is_err());
    }

    #[test]
    fn bootcamp_can_be_canceled_before_completion() {
        for from in [
            BootcampStatus::Draft,
            BootcampStatus::Registration,
            BootcampStatus::Ongoing,
        ] {
            assert_eq!(
                from.transition_to(BootcampStatus::Canceled).unwrap(),
                BootcampStatus::Canceled
            );
        }
        assert!(BootcampStatus::Draft.transition_to(BootcampStatus::Ongoing).is_err());
    }

    #[test]
    fn registration_decisions_from_pending() {
        let p = RegistrationStatus::Pending;
        assert_eq!(p.apply(RegistrationDecision::Approve).unwrap(), RegistrationStatus::Approved);
        assert_eq!(p.apply(RegistrationDecision::Reject).unwrap(), RegistrationStatus::Rejected);
        assert_eq!(p.apply(RegistrationDecision::Review).unwrap(), RegistrationStatus::Reviewing);
    }

    #[test]
    fn registration_never_moves_backward() {
        let r = RegistrationStatus::Reviewing;
        assert!(r.apply(RegistrationDecision::Review).is_err());
        assert_eq!(r.apply(RegistrationDecision::Approve).unwrap(), RegistrationStatus::Approved);

        for terminal in [RegistrationStatus::Approved, RegistrationStatus::Rejected] {
            assert!(terminal.is_terminal());
            for d in [
                RegistrationDecision::Review,
                RegistrationDecision::Approve,
                RegistrationDecision::Reject,
            ] {
                let err = terminal.apply(d).unwrap_err();
                assert!(matches!(err, Error::InvalidTransition { entity: "registration", .. }));
            }
        }
    }

    #[test]
    fn invoice_pays_once() {
        let paid = InvoiceStatus::Pending.apply(InvoiceEvent::Pay).unwrap();
        assert_eq!(paid, InvoiceStatus::Paid);
        assert!(matches!(paid.apply(InvoiceEvent::Pay), Err(Error::AlreadyPaid)));
        assert!(matches!(
            paid.apply(InvoiceEvent::Cancel),
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[test]
    fn failed_and_canceled_invoices_are_terminal() {
        let failed = InvoiceStatus::Pending.apply(InvoiceEvent::Fail).unwrap();
        let canceled = InvoiceStatus::Pending.apply(InvoiceEvent::Cancel).unwrap();
        for s in [failed, canceled] {
            assert!(s.is_terminal());
            assert!(matches!(
                s.apply(InvoiceEvent::Pay),
                Err(Error::InvalidTransition { entity: "invoice", .. })
            ));
        }
    }

    #[test]
    fn ticket_flips_between_answered_and_unanswered() {
        let s = TicketStatus::UnderReview;
        let s = s.apply(TicketEvent::for_message(true));
        assert_eq!(s, TicketStatus::Answered);
        let s = s.apply(TicketEvent::for_message(false));
        assert_eq!(s, TicketStatus::Unanswered);
        let s = s.apply(TicketEvent::Close);
        assert_eq!(s, TicketStatus::Closed);
    }

    #[test]
    fn closed_ticket_absorbs_everything() {
        let closed = TicketStatus::Closed;
        assert_eq!(closed.apply(TicketEvent::SupportMessage), TicketStatus::Closed);
        assert_eq!(closed.apply(TicketEvent::OwnerMessage), TicketStatus::Closed);
        assert_eq!(closed.apply(TicketEvent::Close), TicketStatus::Closed);
    }

    #[test]
    fn status_text_round_trips() {
        assert_eq!(TicketStatus::UnderReview.to_string(), "under_review");
        assert_eq!("under_review".parse::<TicketStatus>().unwrap(), TicketStatus::UnderReview);
        assert_eq!("registration".parse::<BootcampStatus>().unwrap(), BootcampStatus::Registration);
        assert!("shipped".parse::<InvoiceStatus>().is_err());
    }
}
