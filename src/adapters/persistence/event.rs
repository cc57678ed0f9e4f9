use async_trait::async_trait;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::event::{EventInput, EventProfile, EventRepoTrait},
    domain::entities::event::EventSeats,
};

fn row_to_profile(row: &sqlx::postgres::PgRow) -> EventProfile {
    EventProfile {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        starts_at: row.get("starts_at"),
        seats_left: row.get("seats_left"),
        is_full: row.get("is_full"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, title, description, image_url, starts_at, seats_left, is_full,
    created_at, updated_at
"#;

async fn event_exists(conn: &mut PgConnection, id: Uuid) -> AppResult<bool> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1) AS found")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .map_err(AppError::from)?;
    Ok(row.get("found"))
}

/// Decrement-if-available as one conditional write. The row lock taken by the UPDATE
/// serializes concurrent callers on the same event.
async fn take_seat(conn: &mut PgConnection, id: Uuid) -> AppResult<EventProfile> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE events
        SET seats_left = seats_left - 1,
            is_full = (seats_left - 1 = 0),
            updated_at = NOW()
        WHERE id = $1 AND seats_left > 0 AND NOT is_full
        RETURNING {}
        "#,
        SELECT_COLS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(AppError::from)?;

    let Some(row) = row else {
        if event_exists(conn, id).await? {
            return Err(AppError::Conflict("event full".into()));
        }
        return Err(AppError::NotFound);
    };
    let event = row_to_profile(&row);
    event.ensure_consistent()?;
    Ok(event)
}

async fn give_back_seat(conn: &mut PgConnection, id: Uuid) -> AppResult<EventProfile> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE events
        SET seats_left = seats_left + 1,
            is_full = FALSE,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        SELECT_COLS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(AppError::from)?;

    let event = row.as_ref().map(row_to_profile).ok_or(AppError::NotFound)?;
    event.ensure_consistent()?;
    Ok(event)
}

#[async_trait]
impl EventRepoTrait for PostgresPersistence {
    async fn list(&self) -> AppResult<Vec<EventProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM events ORDER BY starts_at, created_at",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<EventProfile>> {
        let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn create(&self, input: &EventInput, seats: EventSeats) -> AppResult<EventProfile> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO events (id, title, description, image_url, starts_at, seats_left, is_full)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.starts_at)
        .bind(seats.seats_left)
        .bind(seats.is_full)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn update(
        &self,
        id: Uuid,
        input: &EventInput,
        seats: EventSeats,
    ) -> AppResult<EventProfile> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE events
            SET title = $2, description = $3, image_url = $4, starts_at = $5,
                seats_left = $6, is_full = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.starts_at)
        .bind(seats.seats_left)
        .bind(seats.is_full)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_profile).ok_or(AppError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let detached = sqlx::query("DELETE FROM event_registrations WHERE event_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;

        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        tx.commit().await.map_err(AppError::from)?;
        tracing::debug!(event_id = %id, members = detached.rows_affected(), "Event members detached");
        Ok(())
    }

    async fn register_seat(&self, id: Uuid) -> AppResult<EventProfile> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        let event = take_seat(&mut tx, id).await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(event)
    }

    async fn release_seat(&self, id: Uuid) -> AppResult<EventProfile> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        let event = give_back_seat(&mut tx, id).await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(event)
    }

    async fn add_member(&self, event_id: Uuid, user_id: Uuid) -> AppResult<EventProfile> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // Seat first: the row lock orders concurrent registrations for this event.
        let event = take_seat(&mut tx, event_id).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO event_registrations (event_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (event_id, user_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;
        if inserted.rows_affected() == 0 {
            // Dropping the transaction rolls the seat back.
            return Err(AppError::Conflict(
                "User already registered for this event".into(),
            ));
        }

        tx.commit().await.map_err(AppError::from)?;
        Ok(event)
    }

    async fn remove_member(&self, event_id: Uuid, user_id: Uuid) -> AppResult<EventProfile> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let removed =
            sqlx::query("DELETE FROM event_registrations WHERE event_id = $1 AND user_id = $2")
                .bind(event_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(AppError::from)?;
        if removed.rows_affected() == 0 {
            if !event_exists(&mut tx, event_id).await? {
                return Err(AppError::NotFound);
            }
            return Err(AppError::Conflict(
                "User is not registered for this event".into(),
            ));
        }

        let event = give_back_seat(&mut tx, event_id).await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(event)
    }

    async fn list_member_ids(&self, event_id: Uuid) -> AppResult<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT user_id FROM event_registrations WHERE event_id = $1 ORDER BY registered_at",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(|row| row.get("user_id")).collect())
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<EventProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM events
            WHERE id IN (SELECT event_id FROM event_registrations WHERE user_id = $1)
            ORDER BY starts_at
            "#,
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }
}
