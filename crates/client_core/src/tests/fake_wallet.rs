//! In-memory wallet that fronts a simulated voting contract.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use alloy_primitives::U256;
use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{
    error::RpcError,
    protocol::{
        ETH_ACCOUNTS, ETH_CALL, ETH_GET_TRANSACTION_RECEIPT, ETH_REQUEST_ACCOUNTS,
        ETH_SEND_TRANSACTION,
    },
};
use tokio::sync::oneshot;

use crate::{
    abi,
    contract::{LIKE_CONTESTANT_SIGNATURE, LIST_CONTESTANTS_SIGNATURE},
    provider::{ProviderError, WalletProvider},
};

pub(crate) const DEPLOYED_ADDRESS: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

pub(crate) struct FakeWallet {
    state: Mutex<FakeWalletState>,
}

struct FakeWalletState {
    authorized: Vec<String>,
    grantable: Vec<String>,
    reject_authorization: bool,
    contestants: Vec<(String, u64)>,
    fail_reads: bool,
    reject_votes: bool,
    revert_votes: bool,
    pending_polls: usize,
    receipts: HashMap<String, Value>,
    next_tx: u64,
    methods: Vec<String>,
    deployments: Vec<(String, String)>,
    read_gate: Option<ReadGate>,
}

/// Holds a contract read's result until released.
struct ReadGate {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

impl FakeWallet {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(FakeWalletState {
                authorized: Vec::new(),
                grantable: vec!["0xABC".to_string()],
                reject_authorization: false,
                contestants: vec![
                    ("Fyang".to_string(), 0),
                    ("Alyssa".to_string(), 0),
                    ("Hong Lao Shi".to_string(), 0),
                ],
                fail_reads: false,
                reject_votes: false,
                revert_votes: false,
                pending_polls: 0,
                receipts: HashMap::new(),
                next_tx: 1,
                methods: Vec::new(),
                deployments: Vec::new(),
                read_gate: None,
            }),
        }
    }

    pub(crate) fn with_authorized(self, accounts: &[&str]) -> Self {
        self.update(|state| state.authorized = accounts.iter().map(|a| a.to_string()).collect());
        self
    }

    pub(crate) fn with_grantable(self, accounts: &[&str]) -> Self {
        self.update(|state| state.grantable = accounts.iter().map(|a| a.to_string()).collect());
        self
    }

    pub(crate) fn with_contestants(self, contestants: &[(&str, u64)]) -> Self {
        self.update(|state| {
            state.contestants = contestants
                .iter()
                .map(|(name, likes)| (name.to_string(), *likes))
                .collect()
        });
        self
    }

    pub(crate) fn rejecting_authorization(self) -> Self {
        self.update(|state| state.reject_authorization = true);
        self
    }

    pub(crate) fn rejecting_votes(self) -> Self {
        self.update(|state| state.reject_votes = true);
        self
    }

    pub(crate) fn reverting_votes(self) -> Self {
        self.update(|state| state.revert_votes = true);
        self
    }

    pub(crate) fn with_pending_polls(self, polls: usize) -> Self {
        self.update(|state| state.pending_polls = polls);
        self
    }

    pub(crate) fn set_fail_reads(&self, fail: bool) {
        self.update(|state| state.fail_reads = fail);
    }

    /// A vote cast by some other account.
    pub(crate) fn external_vote(&self, index: usize) {
        self.update(|state| state.contestants[index].1 += 1);
    }

    /// The next `eth_call` reads state immediately but answers only once the
    /// returned sender fires. The receiver fires when that read has happened.
    pub(crate) fn hold_next_read(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.update(|state| {
            state.read_gate = Some(ReadGate {
                entered: entered_tx,
                release: release_rx,
            })
        });
        (entered_rx, release_tx)
    }

    pub(crate) fn tallies(&self) -> Vec<u64> {
        let state = self.state.lock().expect("fake wallet lock");
        state.contestants.iter().map(|(_, likes)| *likes).collect()
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.state.lock().expect("fake wallet lock").methods.clone()
    }

    pub(crate) fn count(&self, method: &str) -> usize {
        self.methods().iter().filter(|m| m.as_str() == method).count()
    }

    pub(crate) fn deployments(&self) -> Vec<(String, String)> {
        self.state.lock().expect("fake wallet lock").deployments.clone()
    }

    pub(crate) fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn update(&self, f: impl FnOnce(&mut FakeWalletState)) {
        let mut state = self.state.lock().expect("fake wallet lock");
        f(&mut state);
    }
}

impl FakeWalletState {
    fn dispatch(&mut self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        match method {
            ETH_ACCOUNTS => Ok(json!(self.authorized)),
            ETH_REQUEST_ACCOUNTS => {
                if self.reject_authorization {
                    return Err(RpcError::new(4001, "User rejected the request.").into());
                }
                self.authorized = self.grantable.clone();
                Ok(json!(self.authorized))
            }
            ETH_CALL => self.call(&params[0]),
            ETH_SEND_TRANSACTION => self.send_transaction(&params[0]),
            ETH_GET_TRANSACTION_RECEIPT => {
                let hash = params[0].as_str().unwrap_or_default().to_string();
                Ok(self.receipt(&hash))
            }
            other => Err(RpcError::new(-32601, format!("method {other} not found")).into()),
        }
    }

    fn call(&self, tx: &Value) -> Result<Value, ProviderError> {
        let data = calldata(tx)?;
        if data.len() < 4 || data[..4] != abi::selector(LIST_CONTESTANTS_SIGNATURE) {
            return Err(RpcError::new(-32000, "execution reverted").into());
        }
        if self.fail_reads {
            return Err(RpcError::new(-32603, "header not found").into());
        }
        let records: Vec<(&str, u64)> = self
            .contestants
            .iter()
            .map(|(name, likes)| (name.as_str(), *likes))
            .collect();
        Ok(json!(abi::to_hex(&abi::encode_contestants(&records))))
    }

    fn send_transaction(&mut self, tx: &Value) -> Result<Value, ProviderError> {
        let data = calldata(tx)?;
        let from = tx["from"].as_str().unwrap_or_default().to_string();
        let hash = format!("0x{:064x}", self.next_tx);
        self.next_tx += 1;

        if tx.get("to").map_or(true, Value::is_null) {
            self.deployments.push((from, abi::to_hex(&data)));
            self.receipts.insert(
                hash.clone(),
                receipt(&hash, "0x1", Some(DEPLOYED_ADDRESS)),
            );
            return Ok(json!(hash));
        }

        if data.len() != 36 || data[..4] != abi::selector(LIKE_CONTESTANT_SIGNATURE) {
            return Err(RpcError::new(-32000, "execution reverted").into());
        }
        if self.reject_votes {
            return Err(RpcError::new(4001, "User denied transaction signature.").into());
        }

        let index = U256::from_be_slice(&data[4..]);
        let in_range = index < U256::from(self.contestants.len());
        if self.revert_votes || !in_range {
            self.receipts.insert(hash.clone(), receipt(&hash, "0x0", None));
        } else {
            self.contestants[index.as_limbs()[0] as usize].1 += 1;
            self.receipts.insert(hash.clone(), receipt(&hash, "0x1", None));
        }
        Ok(json!(hash))
    }

    fn receipt(&mut self, hash: &str) -> Value {
        if self.pending_polls > 0 {
            self.pending_polls -= 1;
            return Value::Null;
        }
        self.receipts.get(hash).cloned().unwrap_or(Value::Null)
    }
}

fn receipt(hash: &str, status: &str, contract_address: Option<&str>) -> Value {
    json!({
        "transactionHash": hash,
        "blockNumber": "0x1",
        "status": status,
        "contractAddress": contract_address,
    })
}

fn calldata(tx: &Value) -> Result<Vec<u8>, ProviderError> {
    let data = tx["data"].as_str().unwrap_or("0x");
    abi::from_hex(data).map_err(|err| RpcError::new(-32602, err.to_string()).into())
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let (result, gate) = {
            let mut state = self.state.lock().expect("fake wallet lock");
            state.methods.push(method.to_string());
            let result = state.dispatch(method, &params);
            let gate = if method == ETH_CALL {
                state.read_gate.take()
            } else {
                None
            };
            (result, gate)
        };

        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.await;
        }
        result
    }
}
