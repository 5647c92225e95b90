//! Repository trait implementations for SQLite

mod deployment;
mod invocation;
mod wallet;

use crate::traits::{DeploymentRepository, InvocationRepository, Repositories, WalletRepository};
use crate::Database;

impl Repositories for Database {
    fn wallets(&self) -> &dyn WalletRepository {
        self
    }

    fn deployments(&self) -> &dyn DeploymentRepository {
        self
    }

    fn invocations(&self) -> &dyn InvocationRepository {
        self
    }
}
