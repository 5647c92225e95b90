//! Wallet provider backed by the encrypted keys in the registry

use std::sync::Arc;

use alloy::network::EthereumWallet;
use async_trait::async_trait;
use kiln_core::{unseal_signer, Account, Error, Result, Signer, WalletProvider};
use kiln_db::WalletRepository;

pub struct KeystoreWallet {
    wallets: Arc<dyn WalletRepository>,
    /// Only offer this wallet when set
    only: Option<String>,
}

impl KeystoreWallet {
    pub fn new(wallets: Arc<dyn WalletRepository>, only: Option<String>) -> Self {
        Self { wallets, only }
    }
}

#[async_trait]
impl WalletProvider for KeystoreWallet {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let stored = self.wallets.list().await?;

        stored
            .into_iter()
            .filter(|w| self.only.as_deref().is_none_or(|name| name == w.name))
            .map(|w| {
                let address = w.address.parse().map_err(|e| {
                    Error::Keyring(format!("wallet '{}' has a bad address: {}", w.name, e))
                })?;
                Ok(Account {
                    address,
                    label: w.name,
                })
            })
            .collect()
    }

    async fn signer(&self, account: &Account) -> Result<Signer> {
        let stored = self
            .wallets
            .get_with_key(&account.label)
            .await?
            .ok_or_else(|| Error::WalletNotFound(account.label.clone()))?;

        let key = unseal_signer(&stored.encrypted_key, account.address)?;

        Ok(Signer {
            account: account.clone(),
            wallet: EthereumWallet::from(key),
        })
    }
}
