use crate::domain::invoice::{CustomerSnapshot, EventSnapshot, Invoice, InvoiceLine};
use anyhow::Result;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct InvoicesRepo {
    pub pool: PgPool,
}

impl InvoicesRepo {
    /// At most one invoice per registration; a second insert is a no-op
    /// and returns false.
    pub async fn insert_tx(tx: &mut Transaction<'_, Postgres>, invoice: &Invoice) -> Result<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO invoices (
                id, registration_id, payment_method, transaction_ref, bank_code, amount,
                customer, event_snapshot, items, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (registration_id) DO NOTHING
            "#,
        )
        .bind(invoice.invoice_id)
        .bind(invoice.registration_id)
        .bind(&invoice.payment_method)
        .bind(&invoice.transaction_ref)
        .bind(&invoice.bank_code)
        .bind(invoice.amount)
        .bind(Json(&invoice.customer))
        .bind(Json(&invoice.event))
        .bind(Json(&invoice.items))
        .bind(invoice.created_at)
        .execute(tx.as_mut())
        .await?;

        Ok(res.rows_affected() == 1)
    }

    pub async fn get_by_registration(&self, registration_id: Uuid) -> Result<Option<Invoice>> {
        let row = sqlx::query(
            r#"
            SELECT id, registration_id, payment_method, transaction_ref, bank_code, amount,
                   customer, event_snapshot, items, created_at
            FROM invoices
            WHERE registration_id = $1
            "#,
        )
        .bind(registration_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };

        let customer: Json<CustomerSnapshot> = r.try_get("customer")?;
        let event: Json<EventSnapshot> = r.try_get("event_snapshot")?;
        let items: Json<Vec<InvoiceLine>> = r.try_get("items")?;
        Ok(Some(Invoice {
            invoice_id: r.try_get("id")?,
            registration_id: r.try_get("registration_id")?,
            payment_method: r.try_get("payment_method")?,
            transaction_ref: r.try_get("transaction_ref")?,
            bank_code: r.try_get("bank_code")?,
            amount: r.try_get("amount")?,
            customer: customer.0,
            event: event.0,
            items: items.0,
            created_at: r.try_get("created_at")?,
        }))
    }
}
