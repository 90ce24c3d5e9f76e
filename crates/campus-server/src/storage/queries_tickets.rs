//! Support ticket queries.

use campus_core::lifecycle::TicketStatus;

use super::db::{CampusDatabase, DatabaseError};
use super::models::{Ticket, TicketMessage};

impl CampusDatabase {
    pub async fn create_ticket(
        &self,
        user_id: i64,
        bootcamp_id: Option<i64>,
        subject: &str,
        now: i64,
    ) -> Result<Ticket, DatabaseError> {
        let id = sqlx::query(
            "INSERT INTO tickets (user_id, bootcamp_id, subject, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(bootcamp_id)
        .bind(subject)
        .bind(TicketStatus::UnderReview)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_ticket(id).await
    }

    pub async fn get_ticket(&self, id: i64) -> Result<Ticket, DatabaseError> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Ticket {id}")))
    }

    /// Tickets of one user, or of everyone when `user_id` is `None`.
    /// Most recently active first.
    pub async fn list_tickets(&self, user_id: Option<i64>) -> Result<Vec<Ticket>, DatabaseError> {
        let rows = if let Some(uid) = user_id {
            sqlx::query_as::<_, Ticket>(
                "SELECT * FROM tickets WHERE user_id = ? ORDER BY updated_at DESC, id DESC",
            )
            .bind(uid)
            .fetch_all(self.pool())
            .await?
        } else {
            sqlx::query_as::<_, Ticket>("SELECT * FROM tickets ORDER BY updated_at DESC, id DESC")
                .fetch_all(self.pool())
                .await?
        };
        Ok(rows)
    }

    /// Append a message and move the ticket to `next` in one transaction.
    /// A closed ticket keeps its status; the message is still stored.
    pub async fn add_ticket_message(
        &self,
        ticket_id: i64,
        sender_id: i64,
        content: &str,
        attachment: Option<&str>,
        is_from_support: bool,
        next: TicketStatus,
        now: i64,
    ) -> Result<TicketMessage, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let id = sqlx::query(
            "INSERT INTO ticket_messages (ticket_id, sender_id, content, attachment, is_from_support, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(ticket_id)
        .bind(sender_id)
        .bind(content)
        .bind(attachment)
        .bind(is_from_support)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("UPDATE tickets SET status = ?, updated_at = ? WHERE id = ? AND status != ?")
            .bind(next)
            .bind(now)
            .bind(ticket_id)
            .bind(TicketStatus::Closed)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        sqlx::query_as::<_, TicketMessage>("SELECT * FROM ticket_messages WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(Into::into)
    }

    pub async fn list_ticket_messages(
        &self,
        ticket_id: i64,
    ) -> Result<Vec<TicketMessage>, DatabaseError> {
        let rows = sqlx::query_as::<_, TicketMessage>(
            "SELECT * FROM ticket_messages WHERE ticket_id = ? ORDER BY created_at, id",
        )
        .bind(ticket_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Close a ticket. Returns `false` if it was already closed.
    pub async fn close_ticket(&self, id: i64, now: i64) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("UPDATE tickets SET status = ?, updated_at = ? WHERE id = ? AND status != ?")
                .bind(TicketStatus::Closed)
                .bind(now)
                .bind(id)
                .bind(TicketStatus::Closed)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected() == 1)
    }
}
