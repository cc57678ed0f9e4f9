use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::user::{UserProfile, UserRepoTrait},
};

fn row_to_profile(row: &sqlx::postgres::PgRow) -> UserProfile {
    UserProfile {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        stripe_customer_id: row.get("stripe_customer_id"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = "id, email, name, stripe_customer_id, created_at";

#[async_trait]
impl UserRepoTrait for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn get_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE stripe_customer_id = $1",
            SELECT_COLS
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn set_stripe_customer_id(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> AppResult<UserProfile> {
        // Assigned once: an existing id is kept.
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET stripe_customer_id = COALESCE(stripe_customer_id, $2)
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(user_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_profile).ok_or(AppError::NotFound)
    }

    async fn list_event_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT event_id FROM event_registrations WHERE user_id = $1 ORDER BY registered_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(|row| row.get("event_id")).collect())
    }
}
