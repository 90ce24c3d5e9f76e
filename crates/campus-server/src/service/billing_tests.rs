//! Tests for `BillingService`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use campus_core::lifecycle::{InvoiceStatus, PaymentMethod, TransactionKind};
use campus_core::{Error, Result, Role};

use super::{BillingService, PaymentGateway};
use crate::service::test_helpers::{T0, harness, user};
use crate::storage::{Invoice, OnlineReceipt};

/// Gateway that counts charges and holds each one until released.
#[derive(Default)]
struct HeldGateway {
    charges: AtomicU32,
    started: Notify,
    release: Notify,
}

#[async_trait]
impl PaymentGateway for HeldGateway {
    async fn charge(&self, invoice: &Invoice) -> Result<OnlineReceipt> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(OnlineReceipt {
            gateway: "held".into(),
            tracking_code: format!("HELD-{}", invoice.id),
        })
    }
}

#[tokio::test]
async fn offline_payment_settles_invoice_once() {
    let h = harness().await;
    let member = user(&h, 1, Role::Normal).await;
    let invoice = h
        .services
        .billing
        .create_invoice(&member, None, "Tuition", "", 50_000)
        .await
        .unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);

    let (paid, txn) = h
        .services
        .billing
        .pay_offline(&member, invoice.id, "R123", "2024-01-01", None)
        .await
        .unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert_eq!(paid.payment_method, Some(PaymentMethod::Offline));
    assert_eq!(paid.offline_receipt_code, "R123");
    assert_eq!(paid.offline_payment_date.as_deref(), Some("2024-01-01"));
    assert_eq!(txn.kind, TransactionKind::Payment);
    assert_eq!(txn.amount, 50_000);
    assert_eq!(txn.invoice_id, Some(invoice.id));
    assert_eq!(txn.user_id, member.user_id);

    assert!(matches!(
        h.services
            .billing
            .pay_offline(&member, invoice.id, "R124", "2024-01-02", None)
            .await,
        Err(Error::AlreadyPaid)
    ));
    assert!(matches!(
        h.services.billing.pay_online(&member, invoice.id).await,
        Err(Error::AlreadyPaid)
    ));

    let ledger = h.db.transactions_for_invoice(invoice.id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    let unchanged = h.db.get_invoice(invoice.id).await.unwrap();
    assert_eq!(unchanged.offline_receipt_code, "R123");
}

#[tokio::test]
async fn online_payment_records_gateway_receipt() {
    let h = harness().await;
    let member = user(&h, 1, Role::Normal).await;
    let invoice = h
        .services
        .billing
        .create_invoice(&member, None, "Tuition", "", 10_000)
        .await
        .unwrap();

    let (paid, _) = h
        .services
        .billing
        .pay_online(&member, invoice.id)
        .await
        .unwrap();
    assert_eq!(paid.payment_method, Some(PaymentMethod::Online));
    assert_eq!(paid.payment_gateway, "zarinpal");
    assert_eq!(paid.payment_tracking_code, format!("PAY{T0}-{}", invoice.id));
}

#[tokio::test]
async fn offline_payment_validates_receipt() {
    let h = harness().await;
    let member = user(&h, 1, Role::Normal).await;
    let invoice = h
        .services
        .billing
        .create_invoice(&member, None, "Tuition", "", 10_000)
        .await
        .unwrap();

    assert!(matches!(
        h.services
            .billing
            .pay_offline(&member, invoice.id, "", "2024-01-01", None)
            .await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        h.services
            .billing
            .pay_offline(&member, invoice.id, "R1", "2024-13-01", None)
            .await,
        Err(Error::Validation(_))
    ));
    assert_eq!(
        h.db.get_invoice(invoice.id).await.unwrap().status,
        InvoiceStatus::Pending
    );
}

#[tokio::test]
async fn only_owner_pays() {
    let h = harness().await;
    let owner = user(&h, 1, Role::Normal).await;
    let other = user(&h, 2, Role::Normal).await;
    let admin = user(&h, 3, Role::Admin).await;
    let invoice = h
        .services
        .billing
        .create_invoice(&owner, None, "Tuition", "", 10_000)
        .await
        .unwrap();

    assert!(matches!(
        h.services.billing.pay_online(&other, invoice.id).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        h.services.billing.pay_online(&admin, invoice.id).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        h.services.billing.get_invoice(&other, invoice.id).await,
        Err(Error::Forbidden(_))
    ));
    h.services.billing.get_invoice(&admin, invoice.id).await.unwrap();
}

#[tokio::test]
async fn invoice_creation_rules() {
    let h = harness().await;
    let member = user(&h, 1, Role::Normal).await;
    let other = user(&h, 2, Role::Normal).await;
    let support = user(&h, 3, Role::Support).await;

    assert!(matches!(
        h.services
            .billing
            .create_invoice(&member, None, "Tuition", "", 999)
            .await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        h.services
            .billing
            .create_invoice(&member, Some(other.user_id), "Tuition", "", 10_000)
            .await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        h.services
            .billing
            .create_invoice(&support, Some(9999), "Tuition", "", 10_000)
            .await,
        Err(Error::NotFound(_))
    ));

    let billed = h
        .services
        .billing
        .create_invoice(&support, Some(other.user_id), "Tuition", "", 1_000)
        .await
        .unwrap();
    assert_eq!(billed.user_id, other.user_id);
    assert_eq!(billed.created_by, Some(support.user_id));
}

#[tokio::test]
async fn canceled_or_failed_invoice_cannot_be_paid() {
    let h = harness().await;
    let member = user(&h, 1, Role::Normal).await;
    let support = user(&h, 2, Role::Support).await;
    let billing = &h.services.billing;

    let first = billing
        .create_invoice(&member, None, "Tuition", "", 10_000)
        .await
        .unwrap();
    let second = billing
        .create_invoice(&member, None, "Books", "", 10_000)
        .await
        .unwrap();

    assert!(matches!(
        billing.cancel_invoice(&member, first.id).await,
        Err(Error::Forbidden(_))
    ));
    let canceled = billing.cancel_invoice(&support, first.id).await.unwrap();
    assert_eq!(canceled.status, InvoiceStatus::Canceled);
    let failed = billing.mark_failed(&support, second.id).await.unwrap();
    assert_eq!(failed.status, InvoiceStatus::Failed);

    for id in [first.id, second.id] {
        assert!(matches!(
            billing.pay_online(&member, id).await,
            Err(Error::InvalidTransition { .. })
        ));
    }
    assert!(matches!(
        billing.cancel_invoice(&support, first.id).await,
        Err(Error::InvalidTransition { .. })
    ));
    assert!(h.db.transactions_for_invoice(first.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn summary_totals_payments() {
    let h = harness().await;
    let member = user(&h, 1, Role::Normal).await;
    let other = user(&h, 2, Role::Normal).await;
    let billing = &h.services.billing;

    for amount in [10_000, 25_000] {
        let invoice = billing
            .create_invoice(&member, None, "Tuition", "", amount)
            .await
            .unwrap();
        billing.pay_online(&member, invoice.id).await.unwrap();
    }
    let unpaid = billing
        .create_invoice(&member, None, "Later", "", 5_000)
        .await
        .unwrap();
    assert_eq!(unpaid.status, InvoiceStatus::Pending);

    let summary = billing.summary(&member).await.unwrap();
    assert_eq!(summary.total_paid, 35_000);
    assert_eq!(summary.recent.len(), 2);

    assert_eq!(billing.list_transactions(&member).await.unwrap().len(), 2);
    assert!(billing.list_transactions(&other).await.unwrap().is_empty());
    assert_eq!(billing.list_invoices(&member).await.unwrap().len(), 3);
    assert!(billing.list_invoices(&other).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_payments_settle_once() {
    let h = harness().await;
    let member = user(&h, 1, Role::Normal).await;
    let invoice = h
        .services
        .billing
        .create_invoice(&member, None, "Tuition", "", 10_000)
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        h.services.billing.pay_online(&member, invoice.id),
        h.services
            .billing
            .pay_offline(&member, invoice.id, "R1", "2024-01-01", None)
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let loser = if a.is_ok() { b.err() } else { a.err() };
    assert!(matches!(loser, Some(Error::AlreadyPaid | Error::Conflict(_))));
    assert_eq!(h.db.transactions_for_invoice(invoice.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn payment_times_follow_the_clock() {
    let h = harness().await;
    let member = user(&h, 1, Role::Normal).await;
    let invoice = h
        .services
        .billing
        .create_invoice(&member, None, "Tuition", "", 10_000)
        .await
        .unwrap();
    assert_eq!(invoice.created_at, T0);

    h.clock.advance(90);
    let (paid, txn) = h
        .services
        .billing
        .pay_online(&member, invoice.id)
        .await
        .unwrap();
    assert_eq!(paid.created_at, T0);
    assert_eq!(paid.updated_at, T0 + 90);
    assert_eq!(txn.created_at, T0 + 90);
}

#[tokio::test]
async fn charge_in_progress_blocks_other_payments() {
    let h = harness().await;
    let member = user(&h, 1, Role::Normal).await;
    let admin = user(&h, 2, Role::Admin).await;
    let gateway = Arc::new(HeldGateway::default());
    let billing = BillingService::new(h.db.clone(), gateway.clone(), h.clock.clone(), 1_000);
    let invoice = billing
        .create_invoice(&member, None, "Tuition", "", 10_000)
        .await
        .unwrap();

    let first = billing.pay_online(&member, invoice.id);
    let others = async {
        gateway.started.notified().await;
        let online = billing.pay_online(&member, invoice.id).await;
        let offline = billing
            .pay_offline(&member, invoice.id, "R1", "2024-01-01", None)
            .await;
        let cancel = billing.cancel_invoice(&admin, invoice.id).await;
        gateway.release.notify_one();
        (online, offline, cancel)
    };
    let (first, (online, offline, cancel)) = tokio::join!(first, others);

    let (paid, _) = first.unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert!(matches!(online, Err(Error::Conflict(_))));
    assert!(matches!(offline, Err(Error::Conflict(_))));
    assert!(matches!(cancel, Err(Error::Conflict(_))));
    assert_eq!(gateway.charges.load(Ordering::SeqCst), 1);

    // Once settled, a retry is refused before reaching the gateway.
    assert!(matches!(
        billing.pay_online(&member, invoice.id).await,
        Err(Error::AlreadyPaid)
    ));
    assert_eq!(gateway.charges.load(Ordering::SeqCst), 1);
    assert_eq!(h.db.transactions_for_invoice(invoice.id).await.unwrap().len(), 1);
}
