use crate::domain::registration::{Registration, RegistrationItem, RegistrationStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

const REGISTRATION_COLUMNS: &str = "id, event_id, account_id, items, total_quantity, total_price, status, \
     created_at, paid_at, cancelled_at, email_sent_at, invoice_id, transaction_ref";

#[derive(Clone)]
pub struct RegistrationsRepo {
    pub pool: PgPool,
}

impl RegistrationsRepo {
    pub async fn insert_tx(tx: &mut Transaction<'_, Postgres>, reg: &Registration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO registrations (
                id, event_id, account_id, items, total_quantity, total_price, status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(reg.registration_id)
        .bind(reg.event_id)
        .bind(reg.account_id)
        .bind(Json(&reg.items))
        .bind(reg.total_quantity)
        .bind(reg.total_price)
        .bind(reg.status.as_str())
        .bind(reg.created_at)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }

    pub async fn get(&self, registration_id: Uuid) -> Result<Option<Registration>> {
        let row = sqlx::query(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1"
        ))
        .bind(registration_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_registration).transpose()?)
    }

    /// Row-locks the registration for the rest of the transaction.
    pub async fn get_for_update_tx(
        tx: &mut Transaction<'_, Postgres>,
        registration_id: Uuid,
    ) -> Result<Option<Registration>> {
        let row = sqlx::query(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1 FOR UPDATE"
        ))
        .bind(registration_id)
        .fetch_optional(tx.as_mut())
        .await?;

        Ok(row.map(map_registration).transpose()?)
    }

    /// Pending and paid registrations of one account for one event.
    pub async fn active_for_account_tx(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        event_id: Uuid,
    ) -> Result<Vec<Registration>> {
        let rows = sqlx::query(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations \
             WHERE account_id = $1 AND event_id = $2 AND status IN ('pending', 'paid')"
        ))
        .bind(account_id)
        .bind(event_id)
        .fetch_all(tx.as_mut())
        .await?;

        Ok(rows
            .into_iter()
            .map(map_registration)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Serializes concurrent reservations of one account for one event
    /// until the transaction ends.
    pub async fn lock_account_event_tx(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        event_id: Uuid,
    ) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("registration:{account_id}:{event_id}"))
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }

    /// pending -> paid. False when the registration already left pending.
    pub async fn mark_paid_tx(
        tx: &mut Transaction<'_, Postgres>,
        registration_id: Uuid,
        invoice_id: Uuid,
        transaction_ref: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE registrations
            SET status = 'paid', paid_at = $2, invoice_id = $3, transaction_ref = $4
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(registration_id)
        .bind(paid_at)
        .bind(invoice_id)
        .bind(transaction_ref)
        .execute(tx.as_mut())
        .await?;

        Ok(res.rows_affected() == 1)
    }

    /// pending -> cancelled. `None` when the registration already left
    /// pending, e.g. a payment confirmation got there first.
    pub async fn cancel_tx(
        tx: &mut Transaction<'_, Postgres>,
        registration_id: Uuid,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Option<Registration>> {
        let row = sqlx::query(&format!(
            "UPDATE registrations SET status = 'cancelled', cancelled_at = $2 \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(registration_id)
        .bind(cancelled_at)
        .fetch_optional(tx.as_mut())
        .await?;

        Ok(row.map(map_registration).transpose()?)
    }

    pub async fn list_expired(&self, created_before: DateTime<Utc>, limit: i64) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM registrations
            WHERE status = 'pending' AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(created_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.get("id")).collect())
    }

    pub async fn mark_email_sent(&self, registration_id: Uuid, sent_at: DateTime<Utc>) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE registrations SET email_sent_at = $2 WHERE id = $1 AND status = 'paid' AND email_sent_at IS NULL",
        )
        .bind(registration_id)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    pub async fn mark_enqueued(&self, registration_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE registrations
            SET fulfillment_enqueued_at = now(), fulfillment_enqueue_count = fulfillment_enqueue_count + 1
            WHERE id = $1
            "#,
        )
        .bind(registration_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Claims paid registrations whose ticket email never went out and whose
    /// last enqueue (if any) is older than `stale_before`. Claiming stamps the
    /// enqueue columns, so concurrent sweepers never pick the same row.
    pub async fn claim_unfulfilled(
        &self,
        stale_before: DateTime<Utc>,
        max_enqueues: i32,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            WITH claimable AS (
                SELECT id
                FROM registrations
                WHERE status = 'paid'
                  AND email_sent_at IS NULL
                  AND paid_at < $1
                  AND (fulfillment_enqueued_at IS NULL OR fulfillment_enqueued_at < $1)
                  AND fulfillment_enqueue_count < $2
                ORDER BY paid_at ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            UPDATE registrations
            SET fulfillment_enqueued_at = now(), fulfillment_enqueue_count = fulfillment_enqueue_count + 1
            WHERE id IN (SELECT id FROM claimable)
            RETURNING id
            "#,
        )
        .bind(stale_before)
        .bind(max_enqueues)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.get("id")).collect())
    }
}

fn map_registration(r: PgRow) -> Result<Registration, sqlx::Error> {
    let status: String = r.try_get("status")?;
    let status = RegistrationStatus::parse(&status)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown registration status {status}").into()))?;
    let items: Json<Vec<RegistrationItem>> = r.try_get("items")?;

    Ok(Registration {
        registration_id: r.try_get("id")?,
        event_id: r.try_get("event_id")?,
        account_id: r.try_get("account_id")?,
        items: items.0,
        total_quantity: r.try_get("total_quantity")?,
        total_price: r.try_get("total_price")?,
        status,
        created_at: r.try_get("created_at")?,
        paid_at: r.try_get("paid_at")?,
        cancelled_at: r.try_get("cancelled_at")?,
        email_sent_at: r.try_get("email_sent_at")?,
        invoice_id: r.try_get("invoice_id")?,
        transaction_ref: r.try_get("transaction_ref")?,
    })
}
