use async_trait::async_trait;
use kiln_core::{Error, Result};
use tracing::debug;

use crate::models::{NewWallet, Wallet, WalletWithKey};
use crate::traits::WalletRepository;
use crate::Database;

#[async_trait]
impl WalletRepository for Database {
    async fn list(&self) -> Result<Vec<Wallet>> {
        let wallets = sqlx::query_as::<_, Wallet>(
            "SELECT id, name, address, created_at FROM wallets ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(wallets)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(
            "SELECT id, name, address, created_at FROM wallets WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(wallet)
    }

    async fn get_with_key(&self, name: &str) -> Result<Option<WalletWithKey>> {
        let wallet = sqlx::query_as::<_, WalletWithKey>(
            "SELECT id, name, address, encrypted_key, created_at FROM wallets WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(wallet)
    }

    async fn create(&self, wallet: &NewWallet) -> Result<Wallet> {
        // checksummed and lowercase forms of one address are the same wallet
        let clash = sqlx::query_as::<_, Wallet>(
            "SELECT id, name, address, created_at FROM wallets \
             WHERE name = ? OR address = ? COLLATE NOCASE LIMIT 1",
        )
        .bind(&wallet.name)
        .bind(&wallet.address)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(existing) = clash {
            return Err(Error::WalletExists(if existing.name == wallet.name {
                format!("'{}'", existing.name)
            } else {
                format!("'{}' with address {}", existing.name, existing.address)
            }));
        }

        let created = sqlx::query_as::<_, Wallet>(
            "INSERT INTO wallets (name, address, encrypted_key) VALUES (?, ?, ?) \
             RETURNING id, name, address, created_at",
        )
        .bind(&wallet.name)
        .bind(&wallet.address)
        .bind(&wallet.encrypted_key)
        .fetch_one(&self.pool)
        .await?;
        debug!(name = %created.name, address = %created.address, "wallet stored");
        Ok(created)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM wallets WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected() > 0;
        if removed {
            debug!(name, "wallet removed");
        }
        Ok(removed)
    }
}
