use async_trait::async_trait;
use kiln_core::{Error, Result};
use sqlx::{QueryBuilder, Sqlite};

use crate::models::{Invocation, InvocationUpdate, NewInvocation};
use crate::traits::{InvocationFilter, InvocationRepository};
use crate::Database;

#[async_trait]
impl InvocationRepository for Database {
    async fn list(&self, filter: InvocationFilter) -> Result<Vec<Invocation>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM invocations");
        if let Some(id) = filter.deployment_id {
            query.push(" WHERE deployment_id = ").push_bind(id);
        }
        query.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let entries = query
            .build_query_as::<Invocation>()
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Invocation>> {
        let entry = sqlx::query_as::<_, Invocation>("SELECT * FROM invocations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    async fn create(&self, entry: &NewInvocation) -> Result<Invocation> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO invocations (deployment_id, wallet_id, function_name, function_signature,
                                     input_params, call_type, status)
            VALUES (?, ?, ?, ?, ?, ?, 'pending')
            RETURNING id
            "#,
        )
        .bind(entry.deployment_id)
        .bind(entry.wallet_id)
        .bind(&entry.function_name)
        .bind(&entry.function_signature)
        .bind(&entry.input_params)
        .bind(entry.call_type)
        .fetch_one(&self.pool)
        .await?;

        InvocationRepository::get_by_id(self, id)
            .await?
            .ok_or(Error::Database(sqlx::Error::RowNotFound))
    }

    async fn update(&self, id: i64, update: &InvocationUpdate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE invocations SET
                result = ?,
                tx_hash = ?,
                block_number = ?,
                status = ?,
                error_message = ?,
                confirmed_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(&update.result)
        .bind(&update.tx_hash)
        .bind(update.block_number)
        .bind(update.status)
        .bind(&update.error_message)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
