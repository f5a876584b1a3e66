//! Client core for the Big Brother Voting contract: wallet provider seam,
//! contract binding, session controller and view model.

pub mod abi;
pub mod config;
pub mod contract;
pub mod controller;
pub mod deploy;
pub mod events;
pub mod provider;
pub mod view;

pub use config::{load_settings, Settings};
pub use contract::{ConfirmationPolicy, ContractError, ContractHandle, ContractInterface};
pub use controller::{
    ConnectOutcome, ControllerConfig, ControllerError, SessionPhase, SessionSnapshot,
    VotingController,
};
pub use deploy::{ContractArtifact, ContractFactory, DeployError, DeployedContract};
pub use events::{ControllerEvent, FailureCategory, LogNoticePresenter, Notice, NoticePresenter};
pub use provider::{
    ConfiguredWalletDetector, HttpWalletProvider, MissingWalletDetector, ProviderError,
    StaticWalletDetector, WalletDetector, WalletProvider,
};
pub use view::{parse_contestant, ViewState};

#[cfg(test)]
#[path = "tests/fake_wallet.rs"]
pub(crate) mod fake_wallet;
