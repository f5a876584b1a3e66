//! Wallet provider seam: EIP-1193 style `request` calls and wallet detection.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use shared::{
    domain::Account,
    error::{ErrorCode, RpcError},
    protocol::{JsonRpcRequest, JsonRpcResponse, ETH_ACCOUNTS, ETH_REQUEST_ACCOUNTS},
};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0}")]
    Rpc(#[from] RpcError),
    #[error("wallet transport error: {0}")]
    Transport(String),
    #[error("unexpected response to {method}: {reason}")]
    UnexpectedResponse { method: String, reason: String },
}

impl ProviderError {
    pub fn rpc_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Rpc(err) => Some(err.kind()),
            _ => None,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.rpc_code() == Some(ErrorCode::UserRejected)
    }

    pub fn unexpected(method: &str, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountQuery {
    /// `eth_accounts`: already authorized accounts, never prompts.
    Silent,
    /// `eth_requestAccounts`: may show a consent prompt.
    Prompt,
}

impl AccountQuery {
    pub fn method(self) -> &'static str {
        match self {
            Self::Silent => ETH_ACCOUNTS,
            Self::Prompt => ETH_REQUEST_ACCOUNTS,
        }
    }
}

pub async fn request_accounts(
    provider: &dyn WalletProvider,
    query: AccountQuery,
) -> Result<Vec<Account>, ProviderError> {
    let method = query.method();
    let value = provider.request(method, json!([])).await?;
    serde_json::from_value::<Vec<Account>>(value)
        .map_err(|err| ProviderError::unexpected(method, err.to_string()))
}

/// Wallet reached over JSON-RPC on HTTP. The endpoint holds the keys and signs
/// `eth_sendTransaction` requests for its managed accounts.
pub struct HttpWalletProvider {
    http: Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl HttpWalletProvider {
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: Client::new(),
            endpoint,
            next_id: AtomicU64::new(1),
        }
    }

    async fn send(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response: JsonRpcResponse = self
            .http
            .post(self.endpoint.clone())
            .json(&JsonRpcRequest::new(id, method, params))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(response_id) = response.id {
            if response_id != id {
                return Err(ProviderError::unexpected(
                    method,
                    format!("response id {response_id} does not match request id {id}"),
                ));
            }
        }

        Ok(response.into_result()?)
    }
}

#[async_trait]
impl WalletProvider for HttpWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match self.send(method, params.clone()).await {
            // Development nodes manage unlocked accounts and have no consent step.
            Err(err)
                if method == ETH_REQUEST_ACCOUNTS
                    && err.rpc_code() == Some(ErrorCode::MethodNotFound) =>
            {
                debug!(endpoint = %self.endpoint, "eth_requestAccounts unsupported; using eth_accounts");
                self.send(ETH_ACCOUNTS, params).await
            }
            other => other,
        }
    }
}

pub trait WalletDetector: Send + Sync {
    fn detect(&self) -> Option<Arc<dyn WalletProvider>>;
}

/// Reports an HTTP wallet when an endpoint is configured.
pub struct ConfiguredWalletDetector {
    endpoint: Option<Url>,
}

impl ConfiguredWalletDetector {
    pub fn new(endpoint: Option<Url>) -> Self {
        Self { endpoint }
    }
}

impl WalletDetector for ConfiguredWalletDetector {
    fn detect(&self) -> Option<Arc<dyn WalletProvider>> {
        let endpoint = self.endpoint.clone()?;
        Some(Arc::new(HttpWalletProvider::new(endpoint)))
    }
}

/// Hands out a fixed provider, or none.
pub struct StaticWalletDetector {
    provider: Option<Arc<dyn WalletProvider>>,
}

impl StaticWalletDetector {
    pub fn new(provider: Option<Arc<dyn WalletProvider>>) -> Self {
        Self { provider }
    }
}

impl WalletDetector for StaticWalletDetector {
    fn detect(&self) -> Option<Arc<dyn WalletProvider>> {
        self.provider.clone()
    }
}

pub struct MissingWalletDetector;

impl WalletDetector for MissingWalletDetector {
    fn detect(&self) -> Option<Arc<dyn WalletProvider>> {
        None
    }
}

#[cfg(test)]
#[path = "tests/provider_tests.rs"]
mod tests;
