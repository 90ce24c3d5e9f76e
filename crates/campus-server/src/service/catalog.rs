//! Bootcamp catalog and registration workflows.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use campus_core::lifecycle::{BootcampStatus, RegistrationDecision, RegistrationStatus};
use campus_core::{Action, Actor, Clock, Error, Result};

use super::validate;
use crate::notifications::{Channel, Notification, NotificationDispatcher};
use crate::storage::{
    Bootcamp, BootcampCategory, BootcampRegistration, CampusDatabase, DatabaseError, NewBootcamp,
};

pub struct CatalogService {
    db: CampusDatabase,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl CatalogService {
    pub fn new(
        db: CampusDatabase,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            db,
            clock,
            dispatcher,
        }
    }

    // ─── Categories ──────────────────────────────────────────────────

    pub async fn create_category(
        &self,
        actor: &Actor,
        name: &str,
        description: &str,
    ) -> Result<BootcampCategory> {
        actor.authorize(Action::ManageCatalog, None)?;
        validate::non_empty("category name", name)?;
        Ok(self.db.create_category(name, description).await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<BootcampCategory>> {
        Ok(self.db.list_categories().await?)
    }

    // ─── Bootcamps ───────────────────────────────────────────────────

    /// Create a bootcamp in `draft`. Dates are ISO `YYYY-MM-DD`.
    #[instrument(skip(self, new), fields(op = "create_bootcamp"))]
    pub async fn create_bootcamp(&self, actor: &Actor, new: &NewBootcamp<'_>) -> Result<Bootcamp> {
        actor.authorize(Action::ManageCatalog, None)?;
        validate::non_empty("title", new.title)?;
        if new.capacity < 1 {
            return Err(Error::Validation("capacity must be at least 1".into()));
        }
        if new.price < 0 {
            return Err(Error::Validation("price must not be negative".into()));
        }
        let start = parse_date("start date", new.start_date)?;
        let end = parse_date("end date", new.end_date)?;
        if end < start {
            return Err(Error::Validation("end date is before start date".into()));
        }

        let bootcamp = self.db.create_bootcamp(new).await?;
        info!(bootcamp_id = bootcamp.id, title = %bootcamp.title, "Bootcamp created");
        Ok(bootcamp)
    }

    pub async fn get_bootcamp(&self, id: i64) -> Result<Bootcamp> {
        Ok(self.db.get_bootcamp(id).await?)
    }

    pub async fn list_bootcamps(&self, status: Option<BootcampStatus>) -> Result<Vec<Bootcamp>> {
        Ok(self.db.list_bootcamps(status).await?)
    }

    /// Move a bootcamp along its lifecycle.
    #[instrument(skip(self), fields(op = "set_bootcamp_status"))]
    pub async fn set_bootcamp_status(
        &self,
        actor: &Actor,
        id: i64,
        next: BootcampStatus,
    ) -> Result<Bootcamp> {
        actor.authorize(Action::ManageCatalog, None)?;
        let bootcamp = self.db.get_bootcamp(id).await?;
        let next = bootcamp.status.transition_to(next)?;

        if !self.db.update_bootcamp_status(id, bootcamp.status, next).await? {
            // Someone else moved it first; report against the status they left.
            let current = self.db.get_bootcamp(id).await?;
            return Err(current.status.transition_to(next).err().unwrap_or_else(|| {
                Error::Conflict(format!("bootcamp {id} changed concurrently"))
            }));
        }

        info!(bootcamp_id = id, from = %bootcamp.status, to = %next, "Bootcamp status changed");
        Ok(self.db.get_bootcamp(id).await?)
    }

    // ─── Registrations ───────────────────────────────────────────────

    /// Register the actor for a bootcamp that is open for registration.
    #[instrument(skip(self, payment_receipt), fields(op = "register_bootcamp"))]
    pub async fn register(
        &self,
        actor: &Actor,
        bootcamp_id: i64,
        payment_receipt: Option<&str>,
    ) -> Result<BootcampRegistration> {
        let bootcamp = self.db.get_bootcamp(bootcamp_id).await?;
        if !bootcamp.status.accepts_registrations() {
            return Err(Error::NotOpenForRegistration);
        }

        let created = match self
            .db
            .create_registration(
                actor.user_id,
                bootcamp_id,
                payment_receipt,
                self.clock.now(),
            )
            .await
        {
            Ok(created) => created,
            Err(DatabaseError::Conflict(_)) => return Err(Error::AlreadyRegistered),
            Err(e) => return Err(e.into()),
        };
        // The status may have moved between the read and the insert.
        let registration = created.ok_or(Error::NotOpenForRegistration)?;

        info!(
            registration_id = registration.id,
            user_id = actor.user_id,
            bootcamp_id,
            "Bootcamp registration created"
        );
        Ok(registration)
    }

    /// Own registrations; privileged actors see everyone's.
    pub async fn list_registrations(&self, actor: &Actor) -> Result<Vec<BootcampRegistration>> {
        let scope = (!actor.role.is_privileged()).then_some(actor.user_id);
        Ok(self.db.list_registrations(scope).await?)
    }

    pub async fn get_registration(&self, actor: &Actor, id: i64) -> Result<BootcampRegistration> {
        let registration = self.db.get_registration(id).await?;
        actor.authorize(Action::ViewResource, Some(registration.user_id))?;
        Ok(registration)
    }

    pub async fn approve(&self, actor: &Actor, id: i64) -> Result<BootcampRegistration> {
        self.decide(actor, id, RegistrationDecision::Approve).await
    }

    pub async fn reject(&self, actor: &Actor, id: i64) -> Result<BootcampRegistration> {
        self.decide(actor, id, RegistrationDecision::Reject).await
    }

    pub async fn mark_reviewing(&self, actor: &Actor, id: i64) -> Result<BootcampRegistration> {
        self.decide(actor, id, RegistrationDecision::Review).await
    }

    #[instrument(skip(self), fields(op = "decide_registration"))]
    async fn decide(
        &self,
        actor: &Actor,
        id: i64,
        decision: RegistrationDecision,
    ) -> Result<BootcampRegistration> {
        actor.authorize(Action::DecideRegistration, None)?;
        let registration = self.db.get_registration(id).await?;
        let next = registration.status.apply(decision)?;

        if !self
            .db
            .update_registration_status(id, registration.status, next, self.clock.now())
            .await?
        {
            let current = self.db.get_registration(id).await?;
            return Err(current.status.apply(decision).err().unwrap_or_else(|| {
                Error::Conflict(format!("registration {id} changed concurrently"))
            }));
        }

        info!(
            registration_id = id,
            from = %registration.status,
            to = %next,
            decided_by = actor.user_id,
            "Registration decided"
        );

        let updated = self.db.get_registration(id).await?;
        if next != RegistrationStatus::Reviewing {
            self.notify_registrant(&updated, next).await;
        }
        Ok(updated)
    }

    /// Tell the registrant about a final decision. Failures are logged only.
    async fn notify_registrant(&self, registration: &BootcampRegistration, status: RegistrationStatus) {
        let (user, bootcamp) = match (
            self.db.get_user(registration.user_id).await,
            self.db.get_bootcamp(registration.bootcamp_id).await,
        ) {
            (Ok(user), Ok(bootcamp)) => (user, bootcamp),
            (Err(e), _) | (_, Err(e)) => {
                warn!(registration_id = registration.id, error = %e, "Registrant lookup failed");
                return;
            }
        };

        let notification = Notification::message(
            "Bootcamp registration",
            format!("Your registration for \"{}\" was {status}.", bootcamp.title),
        );
        let outcome = self
            .dispatcher
            .send(&user.phone, Channel::Sms, &notification)
            .await;
        if !outcome.delivered {
            warn!(registration_id = registration.id, "Registration notification failed");
        }
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| Error::Validation(format!("{field} must be YYYY-MM-DD, got '{value}'")))
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
#[path = "catalog_tests.rs"]
mod tests;
