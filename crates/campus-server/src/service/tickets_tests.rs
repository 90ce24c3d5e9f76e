//! Tests for `TicketService`.

use campus_core::lifecycle::TicketStatus;
use campus_core::{Error, Role};

use crate::notifications::Channel;
use crate::service::test_helpers::{T0, harness, open_bootcamp, user};

#[tokio::test]
async fn replies_flip_status_until_closed() {
    let h = harness().await;
    let owner = user(&h, 1, Role::Normal).await;
    let support = user(&h, 2, Role::Support).await;
    let tickets = &h.services.tickets;

    let ticket = tickets.open_ticket(&owner, "Cannot log in", None).await.unwrap();
    assert_eq!(ticket.status, TicketStatus::UnderReview);

    let reply = tickets
        .post_message(&support, ticket.id, "Try resetting", None)
        .await
        .unwrap();
    assert!(reply.is_from_support);
    assert_eq!(
        h.db.get_ticket(ticket.id).await.unwrap().status,
        TicketStatus::Answered
    );

    let follow_up = tickets
        .post_message(&owner, ticket.id, "Still broken", Some("screen.png"))
        .await
        .unwrap();
    assert!(!follow_up.is_from_support);
    assert_eq!(follow_up.attachment.as_deref(), Some("screen.png"));
    assert_eq!(
        h.db.get_ticket(ticket.id).await.unwrap().status,
        TicketStatus::Unanswered
    );

    let closed = tickets.close_ticket(&owner, ticket.id).await.unwrap();
    assert_eq!(closed.status, TicketStatus::Closed);

    // Messages on a closed ticket are kept; the status is not.
    tickets
        .post_message(&support, ticket.id, "Any update?", None)
        .await
        .unwrap();
    let thread = tickets.get_ticket(&owner, ticket.id).await.unwrap();
    assert_eq!(thread.ticket.status, TicketStatus::Closed);
    assert_eq!(thread.messages.len(), 3);

    // Closing again is a no-op.
    let again = tickets.close_ticket(&support, ticket.id).await.unwrap();
    assert_eq!(again.status, TicketStatus::Closed);
}

#[tokio::test]
async fn ticket_times_follow_the_clock() {
    let h = harness().await;
    let owner = user(&h, 1, Role::Normal).await;
    let support = user(&h, 2, Role::Support).await;
    let tickets = &h.services.tickets;

    let ticket = tickets.open_ticket(&owner, "Cannot log in", None).await.unwrap();
    assert_eq!(ticket.created_at, T0);

    h.clock.advance(30);
    let reply = tickets
        .post_message(&support, ticket.id, "Try resetting", None)
        .await
        .unwrap();
    assert_eq!(reply.created_at, T0 + 30);
    assert_eq!(h.db.get_ticket(ticket.id).await.unwrap().updated_at, T0 + 30);

    h.clock.advance(30);
    let closed = tickets.close_ticket(&owner, ticket.id).await.unwrap();
    assert_eq!(closed.created_at, T0);
    assert_eq!(closed.updated_at, T0 + 60);
}

#[tokio::test]
async fn opening_notifies_support_by_email() {
    let h = harness().await;
    let owner = user(&h, 1, Role::Normal).await;
    let ticket = h
        .services
        .tickets
        .open_ticket(&owner, "Refund", None)
        .await
        .unwrap();

    let sent = h.dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel, Channel::Email);
    assert_eq!(
        sent[0].recipient,
        campus_core::Config::default().notifications.support_recipient
    );
    assert_eq!(ticket.subject, "Refund");
}

#[tokio::test]
async fn support_reply_notifies_owner_by_sms() {
    let h = harness().await;
    let owner = user(&h, 1, Role::Normal).await;
    let support = user(&h, 2, Role::Support).await;
    let phone = h.db.get_user(owner.user_id).await.unwrap().phone;
    let ticket = h
        .services
        .tickets
        .open_ticket(&owner, "Refund", None)
        .await
        .unwrap();

    h.services
        .tickets
        .post_message(&owner, ticket.id, "Hello?", None)
        .await
        .unwrap();
    assert_eq!(h.dispatcher.sent().len(), 1);

    h.services
        .tickets
        .post_message(&support, ticket.id, "On it", None)
        .await
        .unwrap();
    let sent = h.dispatcher.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].recipient, phone);
    assert_eq!(sent[1].channel, Channel::Sms);
}

#[tokio::test]
async fn notification_failure_does_not_fail_ticket() {
    let h = harness().await;
    let owner = user(&h, 1, Role::Normal).await;
    h.dispatcher.set_failing(true);

    let ticket = h
        .services
        .tickets
        .open_ticket(&owner, "Refund", None)
        .await
        .unwrap();
    assert!(h.db.get_ticket(ticket.id).await.is_ok());
}

#[tokio::test]
async fn bootcamp_ticket_requires_registration() {
    let h = harness().await;
    let admin = user(&h, 1, Role::Admin).await;
    let member = user(&h, 2, Role::Normal).await;
    let bootcamp_id = open_bootcamp(&h, &admin).await;

    assert!(matches!(
        h.services
            .tickets
            .open_ticket(&member, "Schedule", Some(bootcamp_id))
            .await,
        Err(Error::Validation(_))
    ));

    h.services
        .catalog
        .register(&member, bootcamp_id, None)
        .await
        .unwrap();
    let ticket = h
        .services
        .tickets
        .open_ticket(&member, "Schedule", Some(bootcamp_id))
        .await
        .unwrap();
    assert_eq!(ticket.bootcamp_id, Some(bootcamp_id));
}

#[tokio::test]
async fn strangers_cannot_touch_tickets() {
    let h = harness().await;
    let owner = user(&h, 1, Role::Normal).await;
    let stranger = user(&h, 2, Role::Normal).await;
    let support = user(&h, 3, Role::Support).await;
    let ticket = h
        .services
        .tickets
        .open_ticket(&owner, "Refund", None)
        .await
        .unwrap();

    assert!(matches!(
        h.services
            .tickets
            .post_message(&stranger, ticket.id, "hi", None)
            .await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        h.services.tickets.close_ticket(&stranger, ticket.id).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        h.services.tickets.get_ticket(&stranger, ticket.id).await,
        Err(Error::Forbidden(_))
    ));

    assert!(h.services.tickets.list_tickets(&stranger).await.unwrap().is_empty());
    assert_eq!(h.services.tickets.list_tickets(&support).await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let h = harness().await;
    let owner = user(&h, 1, Role::Normal).await;
    let ticket = h
        .services
        .tickets
        .open_ticket(&owner, "Refund", None)
        .await
        .unwrap();

    assert!(matches!(
        h.services.tickets.post_message(&owner, ticket.id, "  ", None).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        h.services.tickets.open_ticket(&owner, "", None).await,
        Err(Error::Validation(_))
    ));
}
