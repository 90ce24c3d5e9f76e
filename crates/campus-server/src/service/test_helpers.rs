//! Shared setup for the service test modules.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use campus_core::otp::CodeSource;
use campus_core::{Actor, Config, ManualClock, Role};

use super::account::NewAccount;
use super::{Collaborators, Services, SimulatedGateway};
use crate::notifications::MemoryDispatcher;
use crate::storage::{CampusDatabase, Gender, NewBootcamp};

pub const T0: i64 = 1_700_000_000;
pub const PASSWORD: &str = "password123";

/// Codes `000001`, `000002`, ... so tests can tell issuances apart.
#[derive(Debug, Default)]
pub struct SequentialCodes(AtomicU32);

impl CodeSource for SequentialCodes {
    fn generate(&self, length: u32) -> String {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{n:0width$}", width = length as usize)
    }
}

pub struct Harness {
    pub db: CampusDatabase,
    pub services: Services,
    pub clock: Arc<ManualClock>,
    pub dispatcher: Arc<MemoryDispatcher>,
}

pub async fn harness() -> Harness {
    let db = CampusDatabase::open_in_memory().await.unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    let dispatcher = Arc::new(MemoryDispatcher::new());
    let config = Config::default();

    let services = Services::new(
        &db,
        &config,
        Collaborators {
            clock: clock.clone(),
            codes: Arc::new(SequentialCodes::default()),
            dispatcher: dispatcher.clone(),
            gateway: Arc::new(SimulatedGateway::new("zarinpal", clock.clone())),
        },
    );

    Harness {
        db,
        services,
        clock,
        dispatcher,
    }
}

/// Create a user through the account service. `n` keeps phone and
/// national id unique.
pub async fn user(h: &Harness, n: u32, role: Role) -> Actor {
    let phone = format!("0912000{n:04}");
    let national_id = format!("00000{n:05}");
    let user = h
        .services
        .accounts
        .create_user_with_role(
            &NewAccount {
                phone: &phone,
                password: PASSWORD,
                first_name: "Test",
                last_name: "User",
                national_id: &national_id,
                gender: Gender::Female,
            },
            role,
        )
        .await
        .unwrap();
    Actor::new(user.id, user.role)
}

pub async fn open_bootcamp(h: &Harness, admin: &Actor) -> i64 {
    let category = h
        .services
        .catalog
        .create_category(admin, "Backend", "")
        .await
        .unwrap();
    let bootcamp = h
        .services
        .catalog
        .create_bootcamp(
            admin,
            &NewBootcamp {
                title: "Rust Backend",
                description: "",
                category_id: category.id,
                start_date: "2024-02-01",
                end_date: "2024-05-01",
                schedule_days: "sat,mon",
                schedule_time: "18:00",
                capacity: 30,
                is_advanced: false,
                price: 50_000,
            },
        )
        .await
        .unwrap();
    h.services
        .catalog
        .set_bootcamp_status(admin, bootcamp.id, campus_core::lifecycle::BootcampStatus::Registration)
        .await
        .unwrap();
    bootcamp.id
}
