//! Session controller: wallet acquisition, account connection, contract binding,
//! tally reads and vote submission.
//!
//! All state lives behind one mutex that is never held across a wallet request,
//! so overlapping votes run as independent transactions.

use std::sync::Arc;

use shared::{
    domain::{Account, ContestantRecord, TallySnapshot, CONTESTANTS},
    protocol::TransactionReceipt,
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    contract::{ConfirmationPolicy, ContractError, ContractHandle, ContractInterface, Signer},
    events::{ControllerEvent, Notice, NoticePresenter},
    provider::{request_accounts, AccountQuery, ProviderError, WalletDetector, WalletProvider},
};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("wallet authorization failed: {0}")]
    Authorization(#[source] ProviderError),
    #[error("contract returned {actual} contestants, expected {expected}")]
    ContestantMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Contract(#[from] ContractError),
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub contract_address: String,
    pub interface: ContractInterface,
    pub confirmation: ConfirmationPolicy,
}

impl ControllerConfig {
    pub fn new(contract_address: impl Into<String>) -> Self {
        Self {
            contract_address: contract_address.into(),
            interface: ContractInterface::big_brother_voting(),
            confirmation: ConfirmationPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NoProvider,
    ProviderDetected,
    AccountConnected,
    ContractBound,
    TalliesLoaded,
    VoteInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub wallet_detected: bool,
    pub account: Option<Account>,
    pub contract_bound: bool,
    pub tallies: TallySnapshot,
    pub votes_in_flight: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(Account),
    NoAccount,
    WalletRequired,
}

struct SessionState {
    wallet: Option<Arc<dyn WalletProvider>>,
    account: Option<Account>,
    contract: Option<ContractHandle>,
    tallies: TallySnapshot,
    tallies_loaded: bool,
    refreshes_started: u64,
    refresh_applied: u64,
    votes_in_flight: usize,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        if self.wallet.is_none() {
            SessionPhase::NoProvider
        } else if self.account.is_none() {
            SessionPhase::ProviderDetected
        } else if self.contract.is_none() {
            SessionPhase::AccountConnected
        } else if self.votes_in_flight > 0 {
            SessionPhase::VoteInFlight
        } else if self.tallies_loaded {
            SessionPhase::TalliesLoaded
        } else {
            SessionPhase::ContractBound
        }
    }
}

pub struct VotingController {
    config: ControllerConfig,
    detector: Arc<dyn WalletDetector>,
    notices: Arc<dyn NoticePresenter>,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl VotingController {
    pub fn new(
        config: ControllerConfig,
        detector: Arc<dyn WalletDetector>,
        notices: Arc<dyn NoticePresenter>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            config,
            detector,
            notices,
            inner: Mutex::new(SessionState {
                wallet: None,
                account: None,
                contract: None,
                tallies: TallySnapshot::default(),
                tallies_loaded: false,
                refreshes_started: 0,
                refresh_applied: 0,
                votes_in_flight: 0,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let guard = self.inner.lock().await;
        SessionSnapshot {
            phase: guard.phase(),
            wallet_detected: guard.wallet.is_some(),
            account: guard.account.clone(),
            contract_bound: guard.contract.is_some(),
            tallies: guard.tallies.clone(),
            votes_in_flight: guard.votes_in_flight,
        }
    }

    /// Looks for a wallet provider. The silent account query only runs when a
    /// provider was already stored before this call.
    pub async fn acquire_wallet(&self) {
        let detected = self.detector.detect();
        let previously_stored = {
            let mut guard = self.inner.lock().await;
            let previous = guard.wallet.clone();
            if let Some(provider) = &detected {
                guard.wallet = Some(Arc::clone(provider));
            }
            previous.and(guard.wallet.clone())
        };

        if detected.is_some() {
            info!("wallet provider detected");
            self.emit(ControllerEvent::WalletDetected);
        } else {
            info!("no wallet provider detected");
        }

        let Some(wallet) = previously_stored else {
            return;
        };

        match request_accounts(wallet.as_ref(), AccountQuery::Silent).await {
            Ok(accounts) => {
                self.set_account(accounts).await;
                if self.needs_contract().await && self.build_contract_handle().await {
                    self.refresh_tallies().await;
                }
            }
            Err(err) => warn!(error = %err, "failed to query authorized accounts"),
        }
    }

    /// Stores the first account, if any. A different account invalidates the
    /// current contract handle.
    pub async fn set_account(&self, accounts: Vec<Account>) {
        let Some(account) = accounts.into_iter().next() else {
            info!("no account found");
            return;
        };

        info!(account = %account, "account connected");
        let changed = {
            let mut guard = self.inner.lock().await;
            let changed = guard.account.as_ref() != Some(&account);
            if changed {
                guard.account = Some(account.clone());
                guard.contract = None;
            }
            changed
        };

        if changed {
            self.emit(ControllerEvent::AccountChanged(account));
        }
    }

    /// Asks the wallet for account access. Authorization failures are returned
    /// to the caller without any notice.
    pub async fn connect_account(&self) -> Result<ConnectOutcome, ControllerError> {
        let wallet = self.inner.lock().await.wallet.clone();
        let Some(wallet) = wallet else {
            warn!("connect requested without a wallet provider");
            self.notify(Notice::WalletRequired).await;
            return Ok(ConnectOutcome::WalletRequired);
        };

        let accounts = request_accounts(wallet.as_ref(), AccountQuery::Prompt)
            .await
            .map_err(|err| {
                error!(error = %err, "wallet authorization failed");
                ControllerError::Authorization(err)
            })?;

        self.set_account(accounts).await;
        if self.build_contract_handle().await {
            self.refresh_tallies().await;
        }

        Ok(match self.inner.lock().await.account.clone() {
            Some(account) => ConnectOutcome::Connected(account),
            None => ConnectOutcome::NoAccount,
        })
    }

    /// Binds the configured contract to the connected account's signer.
    /// Returns whether a handle is bound afterwards.
    pub async fn build_contract_handle(&self) -> bool {
        let (wallet, account) = {
            let guard = self.inner.lock().await;
            (guard.wallet.clone(), guard.account.clone())
        };
        let (Some(wallet), Some(account)) = (wallet, account) else {
            debug!("contract binding skipped: wallet or account missing");
            return false;
        };

        let handle = Signer::new(wallet, account).and_then(|signer| {
            ContractHandle::bind(
                &self.config.contract_address,
                self.config.interface.clone(),
                signer,
            )
        });

        let handle = match handle {
            Ok(handle) => handle,
            Err(err) => {
                error!(error = %err, "failed to initialize contract");
                return false;
            }
        };

        let address = handle.address().to_string();
        {
            let mut guard = self.inner.lock().await;
            if guard.account.as_ref() != Some(handle.account()) {
                debug!("account changed while binding; dropping stale contract handle");
                return false;
            }
            guard.contract = Some(handle);
        }

        info!(contract = %address, "contract bound");
        self.emit(ControllerEvent::ContractBound { address });
        true
    }

    /// Re-reads tallies from the contract. Failures keep the previous snapshot,
    /// and a read that finishes after a later-started one is discarded.
    pub async fn refresh_tallies(&self) {
        let (contract, ticket) = {
            let mut guard = self.inner.lock().await;
            let Some(contract) = guard.contract.clone() else {
                return;
            };
            guard.refreshes_started += 1;
            (contract, guard.refreshes_started)
        };

        let snapshot = match contract.get_contestants().await {
            Ok(records) => tallies_from_records(&records),
            Err(err) => Err(err.into()),
        };

        match snapshot {
            Ok(snapshot) => {
                {
                    let mut guard = self.inner.lock().await;
                    if ticket < guard.refresh_applied {
                        debug!(
                            ticket,
                            applied = guard.refresh_applied,
                            "dropping outdated tally read"
                        );
                        return;
                    }
                    guard.refresh_applied = ticket;
                    guard.tallies = snapshot.clone();
                    guard.tallies_loaded = true;
                }
                debug!(tallies = ?snapshot.counts(), "tallies refreshed");
                self.emit(ControllerEvent::TalliesUpdated(snapshot));
            }
            Err(err) => error!(error = %err, "error fetching votes"),
        }
    }

    /// Sends a like for `contestant` and waits for it to be mined. Repeated
    /// calls send repeated transactions.
    pub async fn submit_vote(&self, contestant: usize) {
        let Some(contract) = self.inner.lock().await.contract.clone() else {
            debug!(contestant, "vote ignored: no contract bound");
            return;
        };

        self.inner.lock().await.votes_in_flight += 1;
        let result = self.send_vote(&contract, contestant).await;
        {
            let mut guard = self.inner.lock().await;
            guard.votes_in_flight = guard.votes_in_flight.saturating_sub(1);
        }

        match result {
            Ok(receipt) => {
                self.refresh_tallies().await;
                self.notify(Notice::VoteSucceeded { contestant }).await;
                debug!(tx = %receipt.transaction_hash, "vote flow completed");
            }
            Err(err) => {
                error!(contestant, error = %err, "error liking contestant");
                self.notify(Notice::vote_failed(contestant, &err)).await;
            }
        }
    }

    async fn send_vote(
        &self,
        contract: &ContractHandle,
        contestant: usize,
    ) -> Result<TransactionReceipt, ContractError> {
        let pending = contract.like_contestant(contestant).await?;
        let tx = pending.hash().clone();
        self.emit(ControllerEvent::VoteSubmitted {
            contestant,
            tx: tx.clone(),
        });

        let receipt = pending.wait(self.config.confirmation).await?;
        self.emit(ControllerEvent::VoteConfirmed { contestant, tx });
        Ok(receipt)
    }

    async fn needs_contract(&self) -> bool {
        let guard = self.inner.lock().await;
        guard.account.is_some() && guard.contract.is_none()
    }

    async fn notify(&self, notice: Notice) {
        self.emit(ControllerEvent::Notice(notice.clone()));
        self.notices.present(&notice).await;
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }
}

/// Maps contract records onto the display list by position.
fn tallies_from_records(records: &[ContestantRecord]) -> Result<TallySnapshot, ControllerError> {
    if records.len() != CONTESTANTS.len() {
        return Err(ControllerError::ContestantMismatch {
            expected: CONTESTANTS.len(),
            actual: records.len(),
        });
    }

    for (contestant, record) in CONTESTANTS.iter().zip(records) {
        if contestant.name != record.name {
            warn!(
                index = contestant.display_order,
                displayed = contestant.name,
                on_chain = %record.name,
                "contestant name differs from contract record"
            );
        }
    }

    Ok(TallySnapshot::from_counts(
        records.iter().map(|record| record.likes).collect(),
    ))
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
