// src/db/ledger_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::ledger::{GlAccount, LedgerConnection, ProviderAccount},
};

#[derive(Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn list_accounts<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<GlAccount>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let accounts = sqlx::query_as::<_, GlAccount>(
            r#"
            SELECT * FROM gl_accounts
            WHERE company_id = $1
            ORDER BY code ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(company_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(accounts)
    }

    /// Cache completo da empresa, para o diff da sincronização.
    pub async fn list_all_accounts<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
    ) -> Result<Vec<GlAccount>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let accounts = sqlx::query_as::<_, GlAccount>(
            "SELECT * FROM gl_accounts WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_all(executor)
        .await?;

        Ok(accounts)
    }

    pub async fn insert_account<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        account: &ProviderAccount,
    ) -> Result<GlAccount, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let inserted = sqlx::query_as::<_, GlAccount>(
            r#"
            INSERT INTO gl_accounts (company_id, provider_key, code, name, account_type, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(account.provider_key)
        .bind(&account.code)
        .bind(&account.name)
        .bind(&account.account_type)
        .bind(account.is_active)
        .fetch_one(executor)
        .await?;

        Ok(inserted)
    }

    pub async fn update_account<'e, E>(
        &self,
        executor: E,
        account_id: Uuid,
        account: &ProviderAccount,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE gl_accounts SET
                code = $2,
                name = $3,
                account_type = $4,
                is_active = $5,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .bind(&account.code)
        .bind(&account.name)
        .bind(&account.account_type)
        .bind(account.is_active)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn get_connection<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
    ) -> Result<Option<LedgerConnection>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let connection = sqlx::query_as::<_, LedgerConnection>(
            "SELECT * FROM ledger_connections WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_optional(executor)
        .await?;

        Ok(connection)
    }

    pub async fn touch_synced<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO ledger_connections (company_id, last_synced_at)
            VALUES ($1, now())
            ON CONFLICT (company_id) DO UPDATE SET last_synced_at = now()
            "#,
        )
        .bind(company_id)
        .execute(executor)
        .await?;

        Ok(())
    }
}
