use async_trait::async_trait;
use kiln_core::{DeploymentId, Error, Result};
use sqlx::{QueryBuilder, Sqlite};

use crate::models::{Deployment, NewDeployment};
use crate::traits::{DeploymentFilter, DeploymentRepository};
use crate::Database;

const SELECT_DEPLOYMENT: &str = r#"
    SELECT id, contract_name, network, address, code_hash, deployer, tx_hash,
           block_number, constructor_args, metadata, deployed_at
    FROM deployments
"#;

#[async_trait]
impl DeploymentRepository for Database {
    async fn list(&self, filter: DeploymentFilter) -> Result<Vec<Deployment>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_DEPLOYMENT);
        query.push(" WHERE 1 = 1");
        if let Some(network) = &filter.network {
            query.push(" AND network = ").push_bind(network);
        }
        if let Some(contract) = &filter.contract {
            query.push(" AND contract_name = ").push_bind(contract);
        }
        query.push(" ORDER BY deployed_at DESC, id DESC");

        let deployments = query
            .build_query_as::<Deployment>()
            .fetch_all(&self.pool)
            .await?;
        Ok(deployments)
    }

    async fn get_by_id(&self, id: DeploymentId) -> Result<Option<Deployment>> {
        let deployment =
            sqlx::query_as::<_, Deployment>(&format!("{SELECT_DEPLOYMENT} WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(deployment)
    }

    async fn get_latest(&self, contract: &str, network: &str) -> Result<Option<Deployment>> {
        let deployment = sqlx::query_as::<_, Deployment>(&format!(
            "{SELECT_DEPLOYMENT} WHERE contract_name = ? AND network = ? \
             ORDER BY deployed_at DESC, id DESC LIMIT 1"
        ))
        .bind(contract)
        .bind(network)
        .fetch_optional(&self.pool)
        .await?;
        Ok(deployment)
    }

    async fn exists_by_tx_hash(&self, tx_hash: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM deployments WHERE tx_hash = ?)")
                .bind(tx_hash)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn create(&self, deployment: &NewDeployment) -> Result<Deployment> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO deployments (contract_name, network, address, code_hash, deployer,
                                     tx_hash, block_number, constructor_args, metadata, deployed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&deployment.contract_name)
        .bind(&deployment.network)
        .bind(&deployment.address)
        .bind(&deployment.code_hash)
        .bind(&deployment.deployer)
        .bind(&deployment.tx_hash)
        .bind(deployment.block_number)
        .bind(&deployment.constructor_args)
        .bind(&deployment.metadata)
        .bind(&deployment.deployed_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id, contract = %deployment.contract_name, "recorded deployment");

        DeploymentRepository::get_by_id(self, DeploymentId(id))
            .await?
            .ok_or_else(|| Error::DeploymentNotFound(id.to_string()))
    }
}
