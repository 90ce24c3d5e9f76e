//! Support tickets.
//!
//! Message persistence and the status flip it causes commit together.
//! Notifications go out only after the commit and never fail the request.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use campus_core::lifecycle::{TicketEvent, TicketStatus};
use campus_core::{Action, Actor, Clock, Error, Result};

use super::validate;
use crate::notifications::{Channel, Notification, NotificationDispatcher};
use crate::storage::{CampusDatabase, Ticket, TicketMessage};

/// A ticket with its conversation.
#[derive(Debug, Clone, Serialize)]
pub struct TicketThread {
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
}

pub struct TicketService {
    db: CampusDatabase,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    support_recipient: String,
}

impl TicketService {
    pub fn new(
        db: CampusDatabase,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        support_recipient: impl Into<String>,
    ) -> Self {
        Self {
            db,
            clock,
            dispatcher,
            support_recipient: support_recipient.into(),
        }
    }

    /// Open a ticket, optionally about a bootcamp the actor is registered for.
    #[instrument(skip(self, subject), fields(op = "open_ticket"))]
    pub async fn open_ticket(
        &self,
        actor: &Actor,
        subject: &str,
        bootcamp_id: Option<i64>,
    ) -> Result<Ticket> {
        validate::non_empty("subject", subject)?;
        if let Some(bootcamp_id) = bootcamp_id {
            if self
                .db
                .find_registration(actor.user_id, bootcamp_id)
                .await?
                .is_none()
            {
                return Err(Error::Validation(
                    "you are not registered for this bootcamp".into(),
                ));
            }
        }

        let ticket = self
            .db
            .create_ticket(actor.user_id, bootcamp_id, subject, self.clock.now())
            .await?;
        info!(ticket_id = ticket.id, user_id = actor.user_id, "Ticket opened");

        let notification = Notification::message(
            format!("New ticket #{}", ticket.id),
            format!("New ticket from user {}: {}", actor.user_id, ticket.subject),
        );
        let outcome = self
            .dispatcher
            .send(&self.support_recipient, Channel::Email, &notification)
            .await;
        if !outcome.delivered {
            warn!(ticket_id = ticket.id, "Support notification failed");
        }

        Ok(ticket)
    }

    /// Post a message. The sender's role decides `is_from_support` and the
    /// resulting status; a closed ticket stays closed.
    #[instrument(skip(self, content, attachment), fields(op = "post_message"))]
    pub async fn post_message(
        &self,
        actor: &Actor,
        ticket_id: i64,
        content: &str,
        attachment: Option<&str>,
    ) -> Result<TicketMessage> {
        validate::non_empty("content", content)?;
        let ticket = self.db.get_ticket(ticket_id).await?;
        actor.authorize(Action::PostTicketMessage, Some(ticket.user_id))?;

        let is_from_support = actor.role.is_privileged();
        let next = ticket.status.apply(TicketEvent::for_message(is_from_support));

        let message = self
            .db
            .add_ticket_message(
                ticket_id,
                actor.user_id,
                content,
                attachment,
                is_from_support,
                next,
                self.clock.now(),
            )
            .await?;
        info!(
            ticket_id,
            message_id = message.id,
            is_from_support,
            "Ticket message posted"
        );

        if is_from_support && ticket.user_id != actor.user_id {
            self.notify_owner(&ticket).await;
        }
        Ok(message)
    }

    async fn notify_owner(&self, ticket: &Ticket) {
        let owner = match self.db.get_user(ticket.user_id).await {
            Ok(owner) => owner,
            Err(e) => {
                warn!(ticket_id = ticket.id, error = %e, "Ticket owner lookup failed");
                return;
            }
        };
        let notification = Notification::message(
            format!("Reply on ticket #{}", ticket.id),
            format!("Support replied to your ticket \"{}\".", ticket.subject),
        );
        let outcome = self
            .dispatcher
            .send(&owner.phone, Channel::Sms, &notification)
            .await;
        if !outcome.delivered {
            warn!(ticket_id = ticket.id, "Reply notification failed");
        }
    }

    /// Close a ticket. Closing a closed ticket is a no-op.
    #[instrument(skip(self), fields(op = "close_ticket"))]
    pub async fn close_ticket(&self, actor: &Actor, id: i64) -> Result<Ticket> {
        let ticket = self.db.get_ticket(id).await?;
        actor.authorize(Action::CloseTicket, Some(ticket.user_id))?;

        if self.db.close_ticket(id, self.clock.now()).await? {
            info!(ticket_id = id, by = actor.user_id, "Ticket closed");
        }
        let ticket = self.db.get_ticket(id).await?;
        debug_assert_eq!(ticket.status, TicketStatus::Closed);
        Ok(ticket)
    }

    /// Own tickets; privileged actors see everyone's.
    pub async fn list_tickets(&self, actor: &Actor) -> Result<Vec<Ticket>> {
        let scope = (!actor.role.is_privileged()).then_some(actor.user_id);
        Ok(self.db.list_tickets(scope).await?)
    }

    pub async fn get_ticket(&self, actor: &Actor, id: i64) -> Result<TicketThread> {
        let ticket = self.db.get_ticket(id).await?;
        actor.authorize(Action::ViewResource, Some(ticket.user_id))?;
        let messages = self.db.list_ticket_messages(id).await?;
        Ok(TicketThread { ticket, messages })
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
#[path = "tickets_tests.rs"]
mod tests;
