use crate::domain::ticket_type::{TicketType, TicketTypeStatus};
use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct TicketTypesRepo {
    pub pool: PgPool,
}

impl TicketTypesRepo {
    pub async fn list_for_event(&self, event_id: Uuid, ids: &[Uuid]) -> Result<Vec<TicketType>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_id, name, price, capacity, registered_count, status
            FROM ticket_types
            WHERE event_id = $1 AND id = ANY($2)
            "#,
        )
        .bind(event_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_ticket_type).collect())
    }

    pub async fn list_by_ids(&self, ids: &[Uuid]) -> Result<Vec<TicketType>> {
        let rows = sqlx::query(
            "SELECT id, event_id, name, price, capacity, registered_count, status FROM ticket_types WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_ticket_type).collect())
    }

    /// Current row as seen inside the reservation transaction.
    pub async fn get_tx(tx: &mut Transaction<'_, Postgres>, ticket_type_id: Uuid) -> Result<Option<TicketType>> {
        let row = sqlx::query(
            "SELECT id, event_id, name, price, capacity, registered_count, status FROM ticket_types WHERE id = $1",
        )
        .bind(ticket_type_id)
        .fetch_optional(tx.as_mut())
        .await?;

        Ok(row.map(map_ticket_type))
    }

    /// Conditional increment evaluated entirely by Postgres. Returns false
    /// when the ticket type is inactive or would go over capacity; the row
    /// lock taken by the UPDATE serializes racing reservations.
    pub async fn reserve_tx(
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE ticket_types
            SET registered_count = registered_count + $3, updated_at = now()
            WHERE id = $2
              AND event_id = $1
              AND status = 'active'
              AND (capacity IS NULL OR registered_count + $3 <= capacity)
            "#,
        )
        .bind(event_id)
        .bind(ticket_type_id)
        .bind(quantity)
        .execute(tx.as_mut())
        .await?;

        Ok(res.rows_affected() == 1)
    }

    /// Returns reserved stock. False means the counter was already lower
    /// than `quantity`, which only happens after manual tampering.
    pub async fn release_tx(
        tx: &mut Transaction<'_, Postgres>,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE ticket_types
            SET registered_count = registered_count - $2, updated_at = now()
            WHERE id = $1 AND registered_count >= $2
            "#,
        )
        .bind(ticket_type_id)
        .bind(quantity)
        .execute(tx.as_mut())
        .await?;

        Ok(res.rows_affected() == 1)
    }
}

fn map_ticket_type(r: PgRow) -> TicketType {
    let status: String = r.get("status");
    TicketType {
        ticket_type_id: r.get("id"),
        event_id: r.get("event_id"),
        name: r.get("name"),
        price: r.get("price"),
        capacity: r.get("capacity"),
        registered_count: r.get("registered_count"),
        status: TicketTypeStatus::parse(&status),
    }
}
