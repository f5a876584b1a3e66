//! Controller notifications: observer events and blocking user notices.

use async_trait::async_trait;
use shared::domain::{Account, TallySnapshot, TxHash};
use tracing::info;

use crate::contract::ContractError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    WalletDetected,
    AccountChanged(Account),
    ContractBound { address: String },
    TalliesUpdated(TallySnapshot),
    VoteSubmitted { contestant: usize, tx: TxHash },
    VoteConfirmed { contestant: usize, tx: TxHash },
    Notice(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Rejected,
    Reverted,
    Transport,
    Unknown,
}

impl FailureCategory {
    pub fn classify(err: &ContractError) -> Self {
        match err {
            ContractError::Reverted(_) => return Self::Reverted,
            ContractError::ConfirmationTimeout { .. } => return Self::Transport,
            ContractError::Provider(provider) if provider.is_user_rejection() => {
                return Self::Rejected
            }
            _ => {}
        }

        let message = err.to_string().to_ascii_lowercase();
        if message.contains("user denied") || message.contains("user rejected") {
            Self::Rejected
        } else if message.contains("revert") {
            Self::Reverted
        } else if message.contains("transport")
            || message.contains("connection")
            || message.contains("timed out")
            || message.contains("disconnect")
        {
            Self::Transport
        } else {
            Self::Unknown
        }
    }
}

/// Messages that interrupt the user until acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    WalletRequired,
    VoteSucceeded {
        contestant: usize,
    },
    VoteFailed {
        contestant: usize,
        category: FailureCategory,
        message: String,
    },
}

impl Notice {
    pub fn vote_failed(contestant: usize, err: &ContractError) -> Self {
        Self::VoteFailed {
            contestant,
            category: FailureCategory::classify(err),
            message: err.to_string(),
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::WalletRequired => "A wallet is required to connect".to_string(),
            Self::VoteSucceeded { .. } => "Vote successful!".to_string(),
            Self::VoteFailed { message, .. } => format!("Error: {message}"),
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::VoteSucceeded { .. })
    }
}

#[async_trait]
pub trait NoticePresenter: Send + Sync {
    /// Returns once the user has seen the notice.
    async fn present(&self, notice: &Notice);
}

pub struct LogNoticePresenter;

#[async_trait]
impl NoticePresenter for LogNoticePresenter {
    async fn present(&self, notice: &Notice) {
        info!(notice = %notice.text(), "user notice");
    }
}
