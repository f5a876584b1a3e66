//! Contract deployment from a compiled Hardhat artifact.

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use alloy_primitives::Address;
use serde::Deserialize;
use serde_json::Value;
use shared::domain::TxHash;
use thiserror::Error;
use tracing::info;

use crate::{
    abi::{self, AbiError},
    contract::{ConfirmationPolicy, ContractError, ContractInterface, PendingTransaction, Signer},
    provider::{request_accounts, AccountQuery, ProviderError, WalletProvider},
};

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to read artifact {path}: {source}")]
    ReadArtifact {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse artifact {path}: {source}")]
    ParseArtifact {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("artifact for {0} has no deployable bytecode")]
    EmptyBytecode(String),
    #[error("artifact bytecode is not valid hex: {0}")]
    Bytecode(#[from] AbiError),
    #[error("wallet has no account to deploy from")]
    NoDeployer,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error("receipt for {0} carries no contract address")]
    MissingContractAddress(TxHash),
    #[error("receipt reported invalid contract address {0}")]
    InvalidContractAddress(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    #[serde(default)]
    pub abi: Vec<Value>,
    pub bytecode: String,
}

impl ContractArtifact {
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let raw = fs::read_to_string(path).map_err(|source| DeployError::ReadArtifact {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| DeployError::ParseArtifact {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn bytecode(&self) -> Result<Vec<u8>, DeployError> {
        let code = abi::from_hex(&self.bytecode)?;
        if code.is_empty() {
            return Err(DeployError::EmptyBytecode(self.contract_name.clone()));
        }
        Ok(code)
    }

    /// Functions the voting client needs that this artifact does not expose.
    pub fn missing_functions(&self, interface: &ContractInterface) -> Vec<String> {
        interface.missing_from_abi(&self.abi)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedContract {
    pub name: String,
    pub address: Address,
    pub tx: TxHash,
}

pub struct ContractFactory {
    artifact: ContractArtifact,
    provider: Arc<dyn WalletProvider>,
}

impl ContractFactory {
    pub fn new(artifact: ContractArtifact, provider: Arc<dyn WalletProvider>) -> Self {
        Self { artifact, provider }
    }

    /// Deploys with no constructor arguments from the wallet's first account
    /// and waits for the creation transaction to be mined.
    pub async fn deploy(&self, policy: ConfirmationPolicy) -> Result<DeployedContract, DeployError> {
        let bytecode = self.artifact.bytecode()?;
        let deployer = request_accounts(self.provider.as_ref(), AccountQuery::Silent)
            .await?
            .into_iter()
            .next()
            .ok_or(DeployError::NoDeployer)?;

        info!(contract = %self.artifact.contract_name, deployer = %deployer, "deploying contract");
        let signer = Signer::new(Arc::clone(&self.provider), deployer)?;
        let tx = signer.send_transaction(None, &bytecode).await?;
        let receipt = PendingTransaction::new(Arc::clone(&self.provider), tx.clone())
            .wait(policy)
            .await?;

        let raw_address = receipt
            .contract_address
            .ok_or_else(|| DeployError::MissingContractAddress(tx.clone()))?;
        let address = Address::from_str(&raw_address)
            .map_err(|_| DeployError::InvalidContractAddress(raw_address.clone()))?;

        Ok(DeployedContract {
            name: self.artifact.contract_name.clone(),
            address,
            tx,
        })
    }
}

#[cfg(test)]
#[path = "tests/deploy_tests.rs"]
mod tests;
