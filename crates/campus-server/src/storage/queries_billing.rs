//! Invoice and transaction queries.

use campus_core::lifecycle::{InvoiceStatus, PaymentMethod, TransactionKind};

use super::db::{CampusDatabase, DatabaseError};
use super::models::{Invoice, Transaction};

/// Evidence returned by the online gateway.
#[derive(Debug, Clone)]
pub struct OnlineReceipt {
    pub gateway: String,
    pub tracking_code: String,
}

/// Evidence submitted by the payer for an offline transfer.
#[derive(Debug, Clone)]
pub struct OfflineReceipt {
    pub receipt_code: String,
    /// ISO date (`YYYY-MM-DD`).
    pub payment_date: String,
    pub receipt_image: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PaymentRecord {
    Online(OnlineReceipt),
    Offline(OfflineReceipt),
}

impl PaymentRecord {
    pub const fn method(&self) -> PaymentMethod {
        match self {
            Self::Online(_) => PaymentMethod::Online,
            Self::Offline(_) => PaymentMethod::Offline,
        }
    }
}

impl CampusDatabase {
    // =========================================================================
    // Invoice queries
    // =========================================================================

    pub async fn create_invoice(
        &self,
        user_id: i64,
        created_by: Option<i64>,
        title: &str,
        description: &str,
        amount: i64,
        now: i64,
    ) -> Result<Invoice, DatabaseError> {
        let id = sqlx::query(
            "INSERT INTO invoices (user_id, created_by, title, description, amount, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(created_by)
        .bind(title)
        .bind(description)
        .bind(amount)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_invoice(id).await
    }

    pub async fn get_invoice(&self, id: i64) -> Result<Invoice, DatabaseError> {
        sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Invoice {id}")))
    }

    /// Invoices of one user, or of everyone when `user_id` is `None`. Newest first.
    pub async fn list_invoices(&self, user_id: Option<i64>) -> Result<Vec<Invoice>, DatabaseError> {
        let rows = if let Some(uid) = user_id {
            sqlx::query_as::<_, Invoice>(
                "SELECT * FROM invoices WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            )
            .bind(uid)
            .fetch_all(self.pool())
            .await?
        } else {
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices ORDER BY created_at DESC, id DESC")
                .fetch_all(self.pool())
                .await?
        };
        Ok(rows)
    }

    /// Mark a pending invoice paid and append its payment transaction, as one
    /// unit of work. Returns `None` (and writes nothing) when the invoice is
    /// no longer pending.
    pub async fn record_payment(
        &self,
        invoice_id: i64,
        record: &PaymentRecord,
        description: &str,
        now: i64,
    ) -> Result<Option<(Invoice, Transaction)>, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let updated = match record {
            PaymentRecord::Online(r) => {
                sqlx::query(
                    "UPDATE invoices SET status = ?, payment_method = ?, payment_gateway = ?, payment_tracking_code = ?, updated_at = ? \
                     WHERE id = ? AND status = ?",
                )
                .bind(InvoiceStatus::Paid)
                .bind(PaymentMethod::Online)
                .bind(&r.gateway)
                .bind(&r.tracking_code)
                .bind(now)
                .bind(invoice_id)
                .bind(InvoiceStatus::Pending)
                .execute(&mut *tx)
                .await?
            }
            PaymentRecord::Offline(r) => {
                sqlx::query(
                    "UPDATE invoices SET status = ?, payment_method = ?, offline_receipt_code = ?, offline_payment_date = ?, offline_receipt_image = ?, updated_at = ? \
                     WHERE id = ? AND status = ?",
                )
                .bind(InvoiceStatus::Paid)
                .bind(PaymentMethod::Offline)
                .bind(&r.receipt_code)
                .bind(&r.payment_date)
                .bind(r.receipt_image.as_deref())
                .bind(now)
                .bind(invoice_id)
                .bind(InvoiceStatus::Pending)
                .execute(&mut *tx)
                .await?
            }
        };

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let txn_id = sqlx::query(
            "INSERT INTO transactions (user_id, invoice_id, amount, kind, description, created_at) \
             SELECT user_id, id, amount, ?, ?, ? FROM invoices WHERE id = ?",
        )
        .bind(TransactionKind::Payment)
        .bind(description)
        .bind(now)
        .bind(invoice_id)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        let invoice = self.get_invoice(invoice_id).await?;
        let transaction = self.get_transaction(txn_id).await?;
        Ok(Some((invoice, transaction)))
    }

    /// Compare-and-set an invoice status without touching payment fields.
    pub async fn update_invoice_status(
        &self,
        id: i64,
        from: InvoiceStatus,
        to: InvoiceStatus,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("UPDATE invoices SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                .bind(to)
                .bind(now)
                .bind(id)
                .bind(from)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Transaction queries
    // =========================================================================

    pub async fn get_transaction(&self, id: i64) -> Result<Transaction, DatabaseError> {
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Transaction {id}")))
    }

    /// Transactions of one user (or everyone), newest first, optionally capped.
    pub async fn list_transactions(
        &self,
        user_id: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        // SQLite treats LIMIT -1 as unbounded.
        let limit = limit.map_or(-1, i64::from);
        let rows = if let Some(uid) = user_id {
            sqlx::query_as::<_, Transaction>(
                "SELECT * FROM transactions WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
            )
            .bind(uid)
            .bind(limit)
            .fetch_all(self.pool())
            .await?
        } else {
            sqlx::query_as::<_, Transaction>(
                "SELECT * FROM transactions ORDER BY created_at DESC, id DESC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(self.pool())
            .await?
        };
        Ok(rows)
    }

    pub async fn transactions_for_invoice(
        &self,
        invoice_id: i64,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE invoice_id = ? ORDER BY id",
        )
        .bind(invoice_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Sum of a user's transactions of the given kind.
    pub async fn transaction_total(
        &self,
        user_id: i64,
        kind: TransactionKind,
    ) -> Result<i64, DatabaseError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE user_id = ? AND kind = ?",
        )
        .bind(user_id)
        .bind(kind)
        .fetch_one(self.pool())
        .await?;
        Ok(total)
    }
}
