pub mod abi;
pub mod build;
pub mod bytecode;
pub mod chain;
pub mod coerce;
pub mod deploy;
pub mod dir;
pub mod error;
pub mod invoke;
pub mod keyring;
pub mod timeouts;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use abi::{sol_value_to_json, ContractMetadata, FunctionInfo, ParamInfo, ParsedFunctions};
pub use build::{
    BuildChannel, BuildErrorBody, BuildMessage, BuildOrchestrator, BuildOutputEvent, BuildResult,
    BuildService, BuildState, BuildStream, CompileRequest,
};
pub use bytecode::Bytecode;
pub use chain::{
    Account, ChainConnection, ChainConnector, ChainStatus, ConnectionPool, Endpoint, Signer,
    Submission, TransactionWatch, WalletProvider,
};
pub use coerce::{coerce, encode_args, CoercionPolicy};
pub use deploy::DeploymentManager;
pub use dir::KilnDir;
pub use error::{Error, Result, Stage};
pub use invoke::{ExecuteOptions, InvocationGateway, DEFAULT_GAS_LIMIT};
pub use keyring::{parse_signing_key, seal_signer, unseal_signer};
pub use timeouts::Timeouts;
pub use types::*;
