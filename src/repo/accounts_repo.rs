use crate::domain::account::Account;
use anyhow::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Read-only view of the account subsystem.
#[derive(Clone)]
pub struct AccountsRepo {
    pub pool: PgPool,
}

impl AccountsRepo {
    pub async fn get(&self, account_id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT id, email, full_name, phone FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Account {
            account_id: r.get("id"),
            email: r.get("email"),
            full_name: r.get("full_name"),
            phone: r.get("phone"),
        }))
    }
}
