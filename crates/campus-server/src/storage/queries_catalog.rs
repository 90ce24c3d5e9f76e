//! Bootcamp catalog and registration queries.

use campus_core::lifecycle::{BootcampStatus, RegistrationStatus};

use super::db::{CampusDatabase, DatabaseError};
use super::models::{Bootcamp, BootcampCategory, BootcampRegistration};

#[derive(Debug, Clone)]
pub struct NewBootcamp<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub category_id: i64,
    pub start_date: &'a str,
    pub end_date: &'a str,
    pub schedule_days: &'a str,
    pub schedule_time: &'a str,
    pub capacity: i64,
    pub is_advanced: bool,
    pub price: i64,
}

impl CampusDatabase {
    // =========================================================================
    // Category queries
    // =========================================================================

    pub async fn create_category(
        &self,
        name: &str,
        description: &str,
    ) -> Result<BootcampCategory, DatabaseError> {
        let id = sqlx::query("INSERT INTO bootcamp_categories (name, description) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(self.pool())
            .await?
            .last_insert_rowid();

        sqlx::query_as::<_, BootcampCategory>("SELECT * FROM bootcamp_categories WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(Into::into)
    }

    pub async fn list_categories(&self) -> Result<Vec<BootcampCategory>, DatabaseError> {
        let rows = sqlx::query_as::<_, BootcampCategory>(
            "SELECT * FROM bootcamp_categories ORDER BY name",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Bootcamp queries
    // =========================================================================

    /// Insert a bootcamp. New bootcamps start as drafts.
    pub async fn create_bootcamp(&self, new: &NewBootcamp<'_>) -> Result<Bootcamp, DatabaseError> {
        let id = sqlx::query(
            "INSERT INTO bootcamps (title, description, category_id, start_date, end_date, schedule_days, schedule_time, capacity, is_advanced, price) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.title)
        .bind(new.description)
        .bind(new.category_id)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.schedule_days)
        .bind(new.schedule_time)
        .bind(new.capacity)
        .bind(new.is_advanced)
        .bind(new.price)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_bootcamp(id).await
    }

    pub async fn get_bootcamp(&self, id: i64) -> Result<Bootcamp, DatabaseError> {
        sqlx::query_as::<_, Bootcamp>("SELECT * FROM bootcamps WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Bootcamp {id}")))
    }

    pub async fn list_bootcamps(
        &self,
        status_filter: Option<BootcampStatus>,
    ) -> Result<Vec<Bootcamp>, DatabaseError> {
        let rows = if let Some(status) = status_filter {
            sqlx::query_as::<_, Bootcamp>("SELECT * FROM bootcamps WHERE status = ? ORDER BY start_date")
                .bind(status)
                .fetch_all(self.pool())
                .await?
        } else {
            sqlx::query_as::<_, Bootcamp>("SELECT * FROM bootcamps ORDER BY start_date")
                .fetch_all(self.pool())
                .await?
        };
        Ok(rows)
    }

    /// Compare-and-set the bootcamp status.
    pub async fn update_bootcamp_status(
        &self,
        id: i64,
        from: BootcampStatus,
        to: BootcampStatus,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE bootcamps SET status = ? WHERE id = ? AND status = ?")
            .bind(to)
            .bind(id)
            .bind(from)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Registration queries
    // =========================================================================

    /// Insert a pending registration, guarded on the bootcamp accepting
    /// registrations at insert time. Returns `None` when the guard fails and
    /// `DatabaseError::Conflict` on a duplicate (user, bootcamp) pair.
    pub async fn create_registration(
        &self,
        user_id: i64,
        bootcamp_id: i64,
        payment_receipt: Option<&str>,
        now: i64,
    ) -> Result<Option<BootcampRegistration>, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO bootcamp_registrations (user_id, bootcamp_id, status, payment_receipt, created_at, updated_at) \
             SELECT ?, ?, ?, ?, ?, ? WHERE EXISTS (SELECT 1 FROM bootcamps WHERE id = ? AND status = ?)",
        )
        .bind(user_id)
        .bind(bootcamp_id)
        .bind(RegistrationStatus::Pending)
        .bind(payment_receipt)
        .bind(now)
        .bind(now)
        .bind(bootcamp_id)
        .bind(BootcampStatus::Registration)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_registration(result.last_insert_rowid()).await.map(Some)
    }

    pub async fn get_registration(&self, id: i64) -> Result<BootcampRegistration, DatabaseError> {
        sqlx::query_as::<_, BootcampRegistration>("SELECT * FROM bootcamp_registrations WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Registration {id}")))
    }

    pub async fn find_registration(
        &self,
        user_id: i64,
        bootcamp_id: i64,
    ) -> Result<Option<BootcampRegistration>, DatabaseError> {
        let row = sqlx::query_as::<_, BootcampRegistration>(
            "SELECT * FROM bootcamp_registrations WHERE user_id = ? AND bootcamp_id = ?",
        )
        .bind(user_id)
        .bind(bootcamp_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Registrations of one user, or of everyone when `user_id` is `None`.
    pub async fn list_registrations(
        &self,
        user_id: Option<i64>,
    ) -> Result<Vec<BootcampRegistration>, DatabaseError> {
        let rows = if let Some(uid) = user_id {
            sqlx::query_as::<_, BootcampRegistration>(
                "SELECT * FROM bootcamp_registrations WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            )
            .bind(uid)
            .fetch_all(self.pool())
            .await?
        } else {
            sqlx::query_as::<_, BootcampRegistration>(
                "SELECT * FROM bootcamp_registrations ORDER BY created_at DESC, id DESC",
            )
            .fetch_all(self.pool())
            .await?
        };
        Ok(rows)
    }

    /// Compare-and-set the registration status.
    pub async fn update_registration_status(
        &self,
        id: i64,
        from: RegistrationStatus,
        to: RegistrationStatus,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE bootcamp_registrations SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to)
        .bind(now)
        .bind(id)
        .bind(from)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
