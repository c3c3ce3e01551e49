use crate::domain::event::Event;
use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct EventsRepo {
    pub pool: PgPool,
}

impl EventsRepo {
    pub async fn get(&self, event_id: Uuid) -> Result<Option<Event>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, location, starts_at, ends_at, max_tickets_per_account, participant_count
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_event))
    }

    /// Shifts the participant counter inside the caller's transaction.
    /// Clamped at zero so counter drift never blocks a stock release.
    pub async fn adjust_participants_tx(
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
        delta: i32,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE events SET participant_count = GREATEST(participant_count + $2, 0) WHERE id = $1",
        )
        .bind(event_id)
        .bind(delta)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }
}

fn map_event(r: PgRow) -> Event {
    Event {
        event_id: r.get("id"),
        name: r.get("name"),
        location: r.get("location"),
        starts_at: r.get("starts_at"),
        ends_at: r.get("ends_at"),
        max_tickets_per_account: r.get("max_tickets_per_account"),
        participant_count: r.get("participant_count"),
    }
}
