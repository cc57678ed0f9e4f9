use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, subscription},
    app_error::{AppError, AppResult},
    application::use_cases::payment::{PaymentProfile, PaymentRepoTrait, PaymentStatusChange},
    domain::entities::{payment_method::PaymentMethod, payment_status::PaymentStatus},
};

fn row_to_profile(row: &sqlx::postgres::PgRow) -> PaymentProfile {
    PaymentProfile {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        method: row.get("method"),
        status: row.get("status"),
        provider_reference: row.get("provider_reference"),
        paid_at: row.get("paid_at"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, subscription_id, amount_cents, currency, method, status,
    provider_reference, paid_at, created_at
"#;

pub(super) struct NewPayment<'a> {
    pub subscription_id: Uuid,
    pub amount_cents: i64,
    pub currency: &'a str,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub provider_reference: Option<&'a str>,
    pub paid_at: Option<DateTime<Utc>>,
}

pub(super) async fn insert_in(
    conn: &mut PgConnection,
    payment: &NewPayment<'_>,
) -> AppResult<PaymentProfile> {
    let id = Uuid::new_v4();
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO payments (
            id, subscription_id, amount_cents, currency, method, status,
            provider_reference, paid_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        SELECT_COLS
    ))
    .bind(id)
    .bind(payment.subscription_id)
    .bind(payment.amount_cents)
    .bind(payment.currency)
    .bind(payment.method)
    .bind(payment.status)
    .bind(payment.provider_reference)
    .bind(payment.paid_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(AppError::from)?;
    Ok(row_to_profile(&row))
}

#[async_trait]
impl PaymentRepoTrait for PostgresPersistence {
    async fn create(
        &self,
        subscription_id: Uuid,
        amount_cents: i64,
        currency: &str,
        method: PaymentMethod,
    ) -> AppResult<PaymentProfile> {
        let mut conn = self.pool.acquire().await.map_err(AppError::from)?;
        insert_in(
            &mut conn,
            &NewPayment {
                subscription_id,
                amount_cents,
                currency,
                method,
                status: PaymentStatus::Pending,
                provider_reference: None,
                paid_at: None,
            },
        )
        .await
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentProfile>> {
        let row = sqlx::query(&format!("SELECT {} FROM payments WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<PaymentProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE subscription_id = $1 ORDER BY created_at",
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> AppResult<PaymentStatusChange> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let current = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE id = $1 FOR UPDATE",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?
        .as_ref()
        .map(row_to_profile)
        .ok_or(AppError::NotFound)?;

        if !current.status.can_transition_to(status) {
            return Err(AppError::Conflict(format!(
                "Payment is {} and cannot become {}",
                current.status, status
            )));
        }

        let paid_at = if status.is_successful() {
            current.paid_at.or_else(|| Some(Utc::now()))
        } else {
            current.paid_at
        };
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = $2, paid_at = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(status)
        .bind(paid_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;
        let payment = row_to_profile(&row);

        let subscription = if status.is_successful() {
            subscription::activate_in(&mut tx, payment.subscription_id).await?
        } else {
            subscription::get_in(&mut tx, payment.subscription_id)
                .await?
                .ok_or(AppError::NotFound)?
        };

        tx.commit().await.map_err(AppError::from)?;
        Ok(PaymentStatusChange {
            payment,
            subscription,
        })
    }
}
