use crate::domain::ticket::{Ticket, TicketStatus};
use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct TicketsRepo {
    pub pool: PgPool,
}

impl TicketsRepo {
    pub async fn list_by_registration(&self, registration_id: Uuid, status: TicketStatus) -> Result<Vec<Ticket>> {
        let mut conn = self.pool.acquire().await?;
        list_by_registration(&mut *conn, registration_id, status).await
    }

    pub async fn list_by_registration_tx(
        tx: &mut Transaction<'_, Postgres>,
        registration_id: Uuid,
        status: TicketStatus,
    ) -> Result<Vec<Ticket>> {
        list_by_registration(tx.as_mut(), registration_id, status).await
    }

    pub async fn insert_many_tx(tx: &mut Transaction<'_, Postgres>, tickets: &[Ticket]) -> Result<()> {
        for t in tickets {
            sqlx::query(
                r#"
                INSERT INTO tickets (id, event_id, ticket_type_id, registration_id, account_id, code, status, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(t.ticket_id)
            .bind(t.event_id)
            .bind(t.ticket_type_id)
            .bind(t.registration_id)
            .bind(t.account_id)
            .bind(&t.code)
            .bind(t.status.as_str())
            .bind(t.created_at)
            .execute(tx.as_mut())
            .await?;
        }

        Ok(())
    }
}

async fn list_by_registration(
    conn: &mut PgConnection,
    registration_id: Uuid,
    status: TicketStatus,
) -> Result<Vec<Ticket>> {
    let rows = sqlx::query(
        r#"
        SELECT id, event_id, ticket_type_id, registration_id, account_id, code, status, created_at
        FROM tickets
        WHERE registration_id = $1 AND status = $2
        ORDER BY created_at ASC, code ASC
        "#,
    )
    .bind(registration_id)
    .bind(status.as_str())
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(map_ticket).collect())
}

fn map_ticket(r: PgRow) -> Ticket {
    let status: String = r.get("status");
    Ticket {
        ticket_id: r.get("id"),
        event_id: r.get("event_id"),
        ticket_type_id: r.get("ticket_type_id"),
        registration_id: r.get("registration_id"),
        account_id: r.get("account_id"),
        code: r.get("code"),
        status: TicketStatus::parse(&status),
        created_at: r.get("created_at"),
    }
}
