use kiln_core::Result;
use sqlx::SqlitePool;

/// SQL schema for initializing the registry
pub const SCHEMA: &str = r#"
-- Wallets with encrypted private keys
CREATE TABLE IF NOT EXISTS wallets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL,
    address TEXT UNIQUE NOT NULL,
    encrypted_key BLOB NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- Finalized deployments, one row per contract instance
CREATE TABLE IF NOT EXISTS deployments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    contract_name TEXT NOT NULL,
    network TEXT NOT NULL,
    address TEXT NOT NULL,
    code_hash TEXT NOT NULL,
    deployer TEXT NOT NULL,
    tx_hash TEXT UNIQUE NOT NULL,
    block_number INTEGER NOT NULL,
    constructor_args JSON NOT NULL,
    metadata JSON NOT NULL,
    deployed_at TEXT NOT NULL,
    UNIQUE(network, address)
);

CREATE INDEX IF NOT EXISTS idx_deployments_network ON deployments(network);
CREATE INDEX IF NOT EXISTS idx_deployments_contract ON deployments(contract_name, network);

-- Messages sent to deployed contracts
CREATE TABLE IF NOT EXISTS invocations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    deployment_id INTEGER NOT NULL REFERENCES deployments(id) ON DELETE CASCADE,
    wallet_id INTEGER REFERENCES wallets(id) ON DELETE SET NULL,
    function_name TEXT NOT NULL,
    function_signature TEXT NOT NULL,
    input_params JSON NOT NULL,
    call_type TEXT NOT NULL CHECK (call_type IN ('read', 'write')),
    result JSON,
    tx_hash TEXT,
    block_number INTEGER,
    status TEXT CHECK (status IN ('pending', 'success', 'failed', 'unknown')),
    error_message TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    confirmed_at DATETIME
);

CREATE INDEX IF NOT EXISTS idx_invocations_deployment ON invocations(deployment_id);
"#;

pub(crate) async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}
