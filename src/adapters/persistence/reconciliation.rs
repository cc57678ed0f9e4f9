use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::{
        PostgresPersistence,
        payment::{self, NewPayment},
        subscription,
    },
    app_error::{AppError, AppResult},
    application::use_cases::payment_webhook::{
        CheckoutReconciliation, ReconciledCheckout, ReconciliationRepoTrait,
    },
    application::use_cases::subscription::{CheckoutPlacement, place_checkout},
    domain::entities::{
        payment_method::PaymentMethod, payment_status::PaymentStatus,
        subscription_status::SubscriptionStatus,
    },
};

#[async_trait]
impl ReconciliationRepoTrait for PostgresPersistence {
    async fn is_event_processed(&self, provider_event_id: &str) -> AppResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM processed_webhook_events WHERE provider_event_id = $1) AS processed",
        )
        .bind(provider_event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.get("processed"))
    }

    async fn apply_checkout(
        &self,
        input: &CheckoutReconciliation,
    ) -> AppResult<Option<ReconciledCheckout>> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // A concurrent delivery of the same event blocks here until the first commits,
        // then gets no row back.
        let claimed = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (provider_event_id, event_type, outcome)
            VALUES ($1, $2, 'applied')
            ON CONFLICT (provider_event_id) DO NOTHING
            RETURNING provider_event_id
            "#,
        )
        .bind(&input.provider_event_id)
        .bind(&input.event_type)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;
        if claimed.is_none() {
            return Ok(None);
        }

        // Serializes reconciliations for one user, so two different checkouts cannot
        // both decide to open a subscription.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(input.user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::from)?
            .ok_or(AppError::NotFound)?;

        let open = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM subscriptions
            WHERE user_id = $1 AND status IN ('pending', 'active')
            FOR UPDATE
            "#,
            subscription::SELECT_COLS
        ))
        .bind(input.user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?
        .as_ref()
        .map(subscription::row_to_profile);

        let placed = match place_checkout(open.as_ref(), input.now) {
            CheckoutPlacement::Open {
                start_date,
                end_date,
            } => {
                subscription::insert_in(
                    &mut tx,
                    input.user_id,
                    start_date,
                    end_date,
                    SubscriptionStatus::Active,
                )
                .await?
            }
            CheckoutPlacement::Activate {
                id,
                start_date,
                end_date,
            } => {
                let row = sqlx::query(&format!(
                    r#"
                    UPDATE subscriptions
                    SET status = 'active', start_date = $2, end_date = $3, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    subscription::SELECT_COLS
                ))
                .bind(id)
                .bind(start_date)
                .bind(end_date)
                .fetch_one(&mut *tx)
                .await
                .map_err(AppError::from)?;
                subscription::row_to_profile(&row)
            }
            CheckoutPlacement::Extend { id, end_date } => {
                let row = sqlx::query(&format!(
                    r#"
                    UPDATE subscriptions
                    SET end_date = $2, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    subscription::SELECT_COLS
                ))
                .bind(id)
                .bind(end_date)
                .fetch_one(&mut *tx)
                .await
                .map_err(AppError::from)?;
                subscription::row_to_profile(&row)
            }
        };

        let paid = payment::insert_in(
            &mut tx,
            &NewPayment {
                subscription_id: placed.id,
                amount_cents: input.amount_cents,
                currency: &input.currency,
                method: PaymentMethod::Card,
                status: PaymentStatus::Paid,
                provider_reference: Some(&input.session_id),
                paid_at: Some(input.now),
            },
        )
        .await?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(Some(ReconciledCheckout {
            subscription: placed,
            payment: paid,
        }))
    }
}
