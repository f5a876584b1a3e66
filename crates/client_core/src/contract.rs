//! Contract binding: signer, interface descriptor, contract handle and pending transactions.

use std::{
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use alloy_primitives::{Address, U256};
use serde_json::{json, Value};
use shared::{
    domain::{Account, ContestantRecord, TxHash},
    protocol::{
        TransactionReceipt, TransactionRequest, ETH_CALL, ETH_GET_TRANSACTION_RECEIPT,
        ETH_SEND_TRANSACTION,
    },
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    abi::{self, AbiError},
    provider::{ProviderError, WalletProvider},
};

pub const LIST_CONTESTANTS_SIGNATURE: &str = "getContestants()";
pub const LIKE_CONTESTANT_SIGNATURE: &str = "likeContestant(uint256)";

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("cannot derive a signer without a connected account")]
    MissingAccount,
    #[error("invalid contract address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("failed to decode contract response: {0}")]
    Decode(#[from] AbiError),
    #[error("transaction {0} reverted")]
    Reverted(TxHash),
    #[error("transaction {hash} not mined within {waited:?}")]
    ConfirmationTimeout { hash: TxHash, waited: Duration },
}

/// Signs and sends transactions through the wallet on behalf of one account.
#[derive(Clone)]
pub struct Signer {
    provider: Arc<dyn WalletProvider>,
    account: Account,
}

impl Signer {
    pub fn new(provider: Arc<dyn WalletProvider>, account: Account) -> Result<Self, ContractError> {
        if account.as_str().trim().is_empty() {
            return Err(ContractError::MissingAccount);
        }
        Ok(Self { provider, account })
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn provider(&self) -> &Arc<dyn WalletProvider> {
        &self.provider
    }

    pub async fn call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, ContractError> {
        let request = self.transaction(Some(to), data);
        let value = self
            .provider
            .request(ETH_CALL, json!([request, "latest"]))
            .await?;
        let payload = hex_string(ETH_CALL, &value)?;
        Ok(abi::from_hex(payload)?)
    }

    pub async fn send_transaction(
        &self,
        to: Option<Address>,
        data: &[u8],
    ) -> Result<TxHash, ContractError> {
        let request = self.transaction(to, data);
        let value = self
            .provider
            .request(ETH_SEND_TRANSACTION, json!([request]))
            .await?;
        Ok(TxHash(hex_string(ETH_SEND_TRANSACTION, &value)?.to_string()))
    }

    fn transaction(&self, to: Option<Address>, data: &[u8]) -> TransactionRequest {
        TransactionRequest {
            from: self.account.0.clone(),
            to: to.map(|address| address.to_string()),
            data: abi::to_hex(data),
        }
    }
}

fn hex_string<'a>(method: &str, value: &'a Value) -> Result<&'a str, ProviderError> {
    value
        .as_str()
        .ok_or_else(|| ProviderError::unexpected(method, format!("expected hex string, got {value}")))
}

/// Names the contract functions this client calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInterface {
    pub name: String,
    pub list_contestants: String,
    pub like_contestant: String,
}

impl ContractInterface {
    pub fn big_brother_voting() -> Self {
        Self {
            name: "BigBrotherVoting".to_string(),
            list_contestants: LIST_CONTESTANTS_SIGNATURE.to_string(),
            like_contestant: LIKE_CONTESTANT_SIGNATURE.to_string(),
        }
    }

    /// Signatures of this interface missing from a compiled artifact's ABI.
    pub fn missing_from_abi(&self, abi: &[Value]) -> Vec<String> {
        let available: Vec<String> = abi.iter().filter_map(abi_function_signature).collect();
        [&self.list_contestants, &self.like_contestant]
            .into_iter()
            .filter(|signature| !available.contains(*signature))
            .cloned()
            .collect()
    }
}

fn abi_function_signature(entry: &Value) -> Option<String> {
    if entry.get("type")?.as_str()? != "function" {
        return None;
    }
    let name = entry.get("name")?.as_str()?;
    let inputs = entry
        .get("inputs")?
        .as_array()?
        .iter()
        .map(|input| input.get("type").and_then(Value::as_str))
        .collect::<Option<Vec<_>>>()?;
    Some(format!("{name}({})", inputs.join(",")))
}

/// A deployed contract bound to the signer of the connected account.
#[derive(Clone)]
pub struct ContractHandle {
    address: Address,
    interface: ContractInterface,
    signer: Signer,
}

impl ContractHandle {
    pub fn bind(
        address: &str,
        interface: ContractInterface,
        signer: Signer,
    ) -> Result<Self, ContractError> {
        let address = Address::from_str(address).map_err(|err| ContractError::InvalidAddress {
            address: address.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            address,
            interface,
            signer,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn account(&self) -> &Account {
        self.signer.account()
    }

    pub async fn get_contestants(&self) -> Result<Vec<ContestantRecord>, ContractError> {
        let calldata = abi::encode_call(&self.interface.list_contestants, &[]);
        let output = self.signer.call(self.address, &calldata).await?;
        Ok(abi::decode_contestants(&output)?)
    }

    pub async fn like_contestant(&self, index: usize) -> Result<PendingTransaction, ContractError> {
        let calldata = abi::encode_call(&self.interface.like_contestant, &[U256::from(index)]);
        let hash = self
            .signer
            .send_transaction(Some(self.address), &calldata)
            .await?;
        info!(tx = %hash, contestant = index, "vote transaction submitted");
        Ok(PendingTransaction::new(Arc::clone(self.signer.provider()), hash))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            timeout: None,
        }
    }
}

pub struct PendingTransaction {
    provider: Arc<dyn WalletProvider>,
    hash: TxHash,
}

impl PendingTransaction {
    pub fn new(provider: Arc<dyn WalletProvider>, hash: TxHash) -> Self {
        Self { provider, hash }
    }

    pub fn hash(&self) -> &TxHash {
        &self.hash
    }

    /// Waits until the transaction is mined. Without a timeout in `policy`
    /// this waits for as long as the transaction stays pending.
    pub async fn wait(self, policy: ConfirmationPolicy) -> Result<TransactionReceipt, ContractError> {
        let started = Instant::now();
        loop {
            let value = self
                .provider
                .request(ETH_GET_TRANSACTION_RECEIPT, json!([self.hash]))
                .await?;

            if !value.is_null() {
                let receipt: TransactionReceipt = serde_json::from_value(value).map_err(|err| {
                    ProviderError::unexpected(ETH_GET_TRANSACTION_RECEIPT, err.to_string())
                })?;
                if !receipt.succeeded() {
                    return Err(ContractError::Reverted(self.hash));
                }
                debug!(tx = %self.hash, block = ?receipt.block_number, "transaction mined");
                return Ok(receipt);
            }

            if let Some(timeout) = policy.timeout {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(ContractError::ConfirmationTimeout {
                        hash: self.hash,
                        waited,
                    });
                }
            }

            tokio::time::sleep(policy.poll_interval).await;
        }
    }
}

#[cfg(test)]
#[path = "tests/contract_tests.rs"]
mod tests;
