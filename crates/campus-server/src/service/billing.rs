//! Invoices, payments and the transaction ledger.
//!
//! Paying moves an invoice from `pending` to `paid` and appends exactly one
//! `payment` transaction in the same database transaction. A second payment
//! of a paid invoice is rejected with [`Error::AlreadyPaid`] and writes
//! nothing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};

use campus_core::lifecycle::{InvoiceEvent, InvoiceStatus, TransactionKind};
use campus_core::{Action, Actor, Clock, Error, Result};

use super::validate;
use crate::storage::{
    CampusDatabase, Invoice, OfflineReceipt, OnlineReceipt, PaymentRecord, Transaction,
};

/// How many transactions [`BillingService::summary`] returns.
const RECENT_TRANSACTIONS: u32 = 5;

/// Online payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Collect the invoice amount and return the provider's receipt.
    /// Called at most once at a time per invoice.
    async fn charge(&self, invoice: &Invoice) -> Result<OnlineReceipt>;
}

/// Gateway stand-in that accepts every charge.
pub struct SimulatedGateway {
    name: String,
    clock: Arc<dyn Clock>,
}

impl SimulatedGateway {
    pub fn new(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            clock,
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, invoice: &Invoice) -> Result<OnlineReceipt> {
        Ok(OnlineReceipt {
            gateway: self.name.clone(),
            tracking_code: format!("PAY{}-{}", self.clock.now(), invoice.id),
        })
    }
}

/// Paid total and latest ledger entries of one user.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSummary {
    pub total_paid: i64,
    pub recent: Vec<Transaction>,
}

/// Invoices with a payment or settlement underway in this process.
#[derive(Default)]
struct InFlight(Mutex<HashSet<i64>>);

impl InFlight {
    fn claim(&self, id: i64) -> Result<Claim<'_>> {
        let mut ids = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(id) {
            return Err(Error::Conflict(format!("invoice {id} has a payment in progress")));
        }
        Ok(Claim { set: self, id })
    }
}

/// Releases its invoice when dropped.
struct Claim<'a> {
    set: &'a InFlight,
    id: i64,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.set
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

pub struct BillingService {
    db: CampusDatabase,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    min_amount: i64,
    in_flight: InFlight,
}

impl BillingService {
    pub fn new(
        db: CampusDatabase,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        min_amount: i64,
    ) -> Self {
        Self {
            db,
            gateway,
            clock,
            min_amount,
            in_flight: InFlight::default(),
        }
    }

    /// Create a pending invoice. Normal users may only bill themselves;
    /// `user_id = None` means the actor.
    #[instrument(skip(self, title, description), fields(op = "create_invoice"))]
    pub async fn create_invoice(
        &self,
        actor: &Actor,
        user_id: Option<i64>,
        title: &str,
        description: &str,
        amount: i64,
    ) -> Result<Invoice> {
        let target = user_id.unwrap_or(actor.user_id);
        if target != actor.user_id {
            actor.authorize(Action::CreateInvoiceForOthers, None)?;
        }
        validate::non_empty("title", title)?;
        if amount < self.min_amount {
            return Err(Error::Validation(format!(
                "amount must be at least {}",
                self.min_amount
            )));
        }
        // Surface an unknown user as NotFound rather than a foreign key failure.
        self.db.get_user(target).await?;

        let invoice = self
            .db
            .create_invoice(
                target,
                Some(actor.user_id),
                title,
                description,
                amount,
                self.clock.now(),
            )
            .await?;
        info!(invoice_id = invoice.id, user_id = target, amount, "Invoice created");
        Ok(invoice)
    }

    /// Own invoices; privileged actors see everyone's.
    pub async fn list_invoices(&self, actor: &Actor) -> Result<Vec<Invoice>> {
        let scope = (!actor.role.is_privileged()).then_some(actor.user_id);
        Ok(self.db.list_invoices(scope).await?)
    }

    pub async fn get_invoice(&self, actor: &Actor, id: i64) -> Result<Invoice> {
        let invoice = self.db.get_invoice(id).await?;
        actor.authorize(Action::ViewResource, Some(invoice.user_id))?;
        Ok(invoice)
    }

    /// Pay through the online gateway. While the charge is underway every
    /// other payment or settlement of the invoice fails with `Conflict`, so
    /// the gateway is never charged for an invoice that cannot be recorded.
    #[instrument(skip(self), fields(op = "pay_online"))]
    pub async fn pay_online(&self, actor: &Actor, id: i64) -> Result<(Invoice, Transaction)> {
        let _claim = self.in_flight.claim(id)?;
        let invoice = self.payable(actor, id).await?;
        let receipt = self.gateway.charge(&invoice).await?;
        self.settle_payment(&invoice, PaymentRecord::Online(receipt)).await
    }

    /// Pay by bank transfer, recorded from the payer's receipt.
    /// `payment_date` is `YYYY-MM-DD`.
    #[instrument(skip(self, receipt_image), fields(op = "pay_offline"))]
    pub async fn pay_offline(
        &self,
        actor: &Actor,
        id: i64,
        receipt_code: &str,
        payment_date: &str,
        receipt_image: Option<&str>,
    ) -> Result<(Invoice, Transaction)> {
        validate::non_empty("receipt code", receipt_code)?;
        let date = NaiveDate::parse_from_str(payment_date, "%Y-%m-%d").map_err(|_| {
            Error::Validation(format!("payment date must be YYYY-MM-DD, got '{payment_date}'"))
        })?;

        let _claim = self.in_flight.claim(id)?;
        let invoice = self.payable(actor, id).await?;
        let record = PaymentRecord::Offline(OfflineReceipt {
            receipt_code: receipt_code.trim().to_string(),
            payment_date: date.format("%Y-%m-%d").to_string(),
            receipt_image: receipt_image.map(str::to_string),
        });
        self.settle_payment(&invoice, record).await
    }

    /// Load an invoice the actor may pay right now.
    async fn payable(&self, actor: &Actor, id: i64) -> Result<Invoice> {
        let invoice = self.db.get_invoice(id).await?;
        actor.authorize(Action::PayInvoice, Some(invoice.user_id))?;
        invoice.status.apply(InvoiceEvent::Pay)?;
        Ok(invoice)
    }

    async fn settle_payment(
        &self,
        invoice: &Invoice,
        record: PaymentRecord,
    ) -> Result<(Invoice, Transaction)> {
        let method = record.method();
        let description = format!("Payment of invoice #{}: {}", invoice.id, invoice.title);

        let Some((paid, txn)) = self
            .db
            .record_payment(invoice.id, &record, &description, self.clock.now())
            .await?
        else {
            // Lost to a concurrent payment or settlement.
            let current = self.db.get_invoice(invoice.id).await?;
            return Err(current.status.apply(InvoiceEvent::Pay).err().unwrap_or_else(|| {
                Error::Conflict(format!("invoice {} changed concurrently", invoice.id))
            }));
        };

        info!(
            invoice_id = paid.id,
            transaction_id = txn.id,
            amount = txn.amount,
            method = %method,
            "Invoice paid"
        );
        Ok((paid, txn))
    }

    pub async fn cancel_invoice(&self, actor: &Actor, id: i64) -> Result<Invoice> {
        self.settle(actor, id, InvoiceEvent::Cancel).await
    }

    pub async fn mark_failed(&self, actor: &Actor, id: i64) -> Result<Invoice> {
        self.settle(actor, id, InvoiceEvent::Fail).await
    }

    #[instrument(skip(self), fields(op = "settle_invoice"))]
    async fn settle(&self, actor: &Actor, id: i64, event: InvoiceEvent) -> Result<Invoice> {
        actor.authorize(Action::SettleInvoice, None)?;
        let _claim = self.in_flight.claim(id)?;
        let invoice = self.db.get_invoice(id).await?;
        let next = invoice.status.apply(event)?;

        if !self
            .db
            .update_invoice_status(id, InvoiceStatus::Pending, next, self.clock.now())
            .await?
        {
            let current = self.db.get_invoice(id).await?;
            return Err(current.status.apply(event).err().unwrap_or_else(|| {
                Error::Conflict(format!("invoice {id} changed concurrently"))
            }));
        }

        info!(invoice_id = id, to = %next, by = actor.user_id, "Invoice settled");
        Ok(self.db.get_invoice(id).await?)
    }

    /// Own ledger entries, newest first; privileged actors see everyone's.
    pub async fn list_transactions(&self, actor: &Actor) -> Result<Vec<Transaction>> {
        let scope = (!actor.role.is_privileged()).then_some(actor.user_id);
        Ok(self.db.list_transactions(scope, None).await?)
    }

    pub async fn summary(&self, actor: &Actor) -> Result<PaymentSummary> {
        let total_paid = self
            .db
            .transaction_total(actor.user_id, TransactionKind::Payment)
            .await?;
        let recent = self
            .db
            .list_transactions(Some(actor.user_id), Some(RECENT_TRANSACTIONS))
            .await?;
        Ok(PaymentSummary { total_paid, recent })
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
#[path = "billing_tests.rs"]
mod tests;
