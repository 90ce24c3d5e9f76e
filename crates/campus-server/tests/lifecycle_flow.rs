//! End-to-end flow through the public service API: an admin opens a
//! bootcamp, a student logs in by OTP, registers, pays and asks support.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use campus_core::lifecycle::{BootcampStatus, InvoiceStatus, RegistrationStatus, TicketStatus};
use campus_core::otp::CodeSource;
use campus_core::{Actor, Config, Error, ManualClock, Role};

use campus_server::notifications::{Channel, MemoryDispatcher};
use campus_server::service::{Collaborators, NewAccount, Services, SimulatedGateway};
use campus_server::storage::{CampusDatabase, Gender, NewBootcamp};

struct FixedCode;

impl CodeSource for FixedCode {
    fn generate(&self, _length: u32) -> String {
        "424242".to_string()
    }
}

#[tokio::test]
async fn student_journey() {
    let db = CampusDatabase::open_in_memory().await.unwrap();
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let dispatcher = Arc::new(MemoryDispatcher::new());
    let services = Services::new(
        &db,
        &Config::default(),
        Collaborators {
            clock: clock.clone(),
            codes: Arc::new(FixedCode),
            dispatcher: dispatcher.clone(),
            gateway: Arc::new(SimulatedGateway::new("zarinpal", clock.clone())),
        },
    );

    // Operator creates an admin and a support agent.
    let account = |phone: &'static str, national_id: &'static str| NewAccount {
        phone,
        password: "correct-horse",
        first_name: "Staff",
        last_name: "Member",
        national_id,
        gender: Gender::Male,
    };
    let admin = services
        .accounts
        .create_user_with_role(&account("09120000001", "1000000001"), Role::Admin)
        .await
        .unwrap();
    let admin = Actor::new(admin.id, admin.role);
    let support = services
        .accounts
        .create_user_with_role(&account("09120000002", "1000000002"), Role::Support)
        .await
        .unwrap();
    let support = Actor::new(support.id, support.role);

    // Admin publishes a bootcamp.
    let category = services
        .catalog
        .create_category(&admin, "Backend", "Server-side tracks")
        .await
        .unwrap();
    let bootcamp = services
        .catalog
        .create_bootcamp(
            &admin,
            &NewBootcamp {
                title: "Rust Backend",
                description: "Twelve weeks",
                category_id: category.id,
                start_date: "2024-02-01",
                end_date: "2024-05-01",
                schedule_days: "sat,mon",
                schedule_time: "18:00",
                capacity: 25,
                is_advanced: true,
                price: 50_000,
            },
        )
        .await
        .unwrap();
    services
        .catalog
        .set_bootcamp_status(&admin, bootcamp.id, BootcampStatus::Registration)
        .await
        .unwrap();

    // Student signs up, then logs in by OTP.
    let signup = services
        .accounts
        .register(&NewAccount {
            phone: "09121112233",
            password: "student-pass",
            first_name: "Leila",
            last_name: "Rahimi",
            national_id: "2000000001",
            gender: Gender::Female,
        })
        .await
        .unwrap();
    services.otp.issue("09121112233").await.unwrap();
    assert_eq!(
        dispatcher.last_code_for("09121112233").as_deref(),
        Some("424242")
    );
    let session = services.otp.verify("09121112233", "424242").await.unwrap();
    assert_eq!(session.user.id, signup.user.id);
    let student = services
        .accounts
        .authenticate(&session.tokens.access_token)
        .await
        .unwrap();

    // Register and get approved.
    let registration = services
        .catalog
        .register(&student, bootcamp.id, None)
        .await
        .unwrap();
    assert!(matches!(
        services.catalog.register(&student, bootcamp.id, None).await,
        Err(Error::AlreadyRegistered)
    ));
    let approved = services
        .catalog
        .approve(&support, registration.id)
        .await
        .unwrap();
    assert_eq!(approved.status, RegistrationStatus::Approved);

    // Support bills the tuition; the student pays by bank transfer.
    let invoice = services
        .billing
        .create_invoice(&support, Some(student.user_id), "Tuition", "Rust Backend", 50_000)
        .await
        .unwrap();
    let (paid, txn) = services
        .billing
        .pay_offline(&student, invoice.id, "R123", "2024-01-01", None)
        .await
        .unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert_eq!(txn.amount, 50_000);
    assert!(matches!(
        services
            .billing
            .pay_offline(&student, invoice.id, "R123", "2024-01-01", None)
            .await,
        Err(Error::AlreadyPaid)
    ));
    assert_eq!(services.billing.summary(&student).await.unwrap().total_paid, 50_000);

    // A question about the course.
    let ticket = services
        .tickets
        .open_ticket(&student, "Laptop requirements", Some(bootcamp.id))
        .await
        .unwrap();
    services
        .tickets
        .post_message(&support, ticket.id, "Any laptop with 8GB RAM works.", None)
        .await
        .unwrap();
    let closed = services.tickets.close_ticket(&student, ticket.id).await.unwrap();
    assert_eq!(closed.status, TicketStatus::Closed);

    // OTP, approval, new-ticket alert and support reply all went out.
    let channels: Vec<Channel> = dispatcher.sent().iter().map(|s| s.channel).collect();
    assert_eq!(
        channels,
        [Channel::Sms, Channel::Sms, Channel::Email, Channel::Sms]
    );

    // The bootcamp starts; registration is closed.
    services
        .catalog
        .set_bootcamp_status(&admin, bootcamp.id, BootcampStatus::Ongoing)
        .await
        .unwrap();
    let late = services
        .accounts
        .register(&NewAccount {
            phone: "09124445566",
            password: "late-student",
            first_name: "Omid",
            last_name: "Jafari",
            national_id: "2000000002",
            gender: Gender::Male,
        })
        .await
        .unwrap();
    let late = Actor::new(late.user.id, late.user.role);
    assert!(matches!(
        services.catalog.register(&late, bootcamp.id, None).await,
        Err(Error::NotOpenForRegistration)
    ));
}
