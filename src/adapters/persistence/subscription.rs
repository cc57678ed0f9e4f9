use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{SubscriptionProfile, SubscriptionRepoTrait},
    domain::entities::subscription_status::SubscriptionStatus,
};

pub(super) fn row_to_profile(row: &sqlx::postgres::PgRow) -> SubscriptionProfile {
    SubscriptionProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(super) const SELECT_COLS: &str =
    "id, user_id, start_date, end_date, status, created_at, updated_at";

pub(super) async fn get_in(
    conn: &mut PgConnection,
    id: Uuid,
) -> AppResult<Option<SubscriptionProfile>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM subscriptions WHERE id = $1",
        SELECT_COLS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(AppError::from)?;
    Ok(row.as_ref().map(row_to_profile))
}

pub(super) async fn insert_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: SubscriptionStatus,
) -> AppResult<SubscriptionProfile> {
    let id = Uuid::new_v4();
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO subscriptions (id, user_id, start_date, end_date, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        SELECT_COLS
    ))
    .bind(id)
    .bind(user_id)
    .bind(start_date)
    .bind(end_date)
    .bind(status)
    .fetch_one(&mut *conn)
    .await
    .map_err(AppError::from)?;
    Ok(row_to_profile(&row))
}

/// PENDING -> ACTIVE. Rows in any other state are returned unchanged.
pub(super) async fn activate_in(
    conn: &mut PgConnection,
    id: Uuid,
) -> AppResult<SubscriptionProfile> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE subscriptions
        SET status = 'active', updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING {}
        "#,
        SELECT_COLS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(AppError::from)?;

    match row {
        Some(row) => Ok(row_to_profile(&row)),
        None => get_in(conn, id).await?.ok_or(AppError::NotFound),
    }
}

#[async_trait]
impl SubscriptionRepoTrait for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        let mut conn = self.pool.acquire().await.map_err(AppError::from)?;
        get_in(&mut conn, id).await
    }

    async fn get_latest_by_user(&self, user_id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn get_open_by_user(&self, user_id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 AND status IN ('pending', 'active')",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn create(
        &self,
        user_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        status: SubscriptionStatus,
    ) -> AppResult<SubscriptionProfile> {
        let mut conn = self.pool.acquire().await.map_err(AppError::from)?;
        // The partial unique index on open subscriptions turns a racing second open
        // into a unique violation, which maps to Conflict.
        insert_in(&mut conn, user_id, start_date, end_date, status).await
    }

    async fn activate(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        let mut conn = self.pool.acquire().await.map_err(AppError::from)?;
        activate_in(&mut conn, id).await
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> AppResult<SubscriptionProfile> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_profile).ok_or(AppError::NotFound)
    }
}
