//! Render state derived from a session snapshot.

use std::fmt::Write as _;

use shared::domain::{Account, CONTESTANTS};

use crate::controller::SessionSnapshot;

pub const TITLE: &str = "Big Brother Voting";
pub const TAGLINE: &str = "Vote for your favorite contestant!";
pub const INSTALL_PROMPT: &str = "Please install a wallet in order to use this app.";
pub const CONNECT_PROMPT: &str = "Please connect your wallet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestantCard {
    pub index: usize,
    pub name: &'static str,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    InstallWallet,
    ConnectWallet,
    Voting {
        account: Account,
        cards: Vec<ContestantCard>,
        votes_in_flight: usize,
    },
}

impl ViewState {
    pub fn from_session(session: &SessionSnapshot) -> Self {
        if !session.wallet_detected {
            return Self::InstallWallet;
        }
        let Some(account) = session.account.clone() else {
            return Self::ConnectWallet;
        };
        if !session.contract_bound {
            return Self::Voting {
                account,
                cards: Vec::new(),
                votes_in_flight: session.votes_in_flight,
            };
        }

        let cards = CONTESTANTS
            .iter()
            .enumerate()
            .map(|(index, contestant)| ContestantCard {
                index,
                name: contestant.name,
                votes: session.tallies.get(index).unwrap_or_default(),
            })
            .collect();

        Self::Voting {
            account,
            cards,
            votes_in_flight: session.votes_in_flight,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("{TITLE}\n{TAGLINE}\n\n");
        match self {
            Self::InstallWallet => {
                let _ = writeln!(out, "{INSTALL_PROMPT}");
            }
            Self::ConnectWallet => {
                let _ = writeln!(out, "{CONNECT_PROMPT} (type `connect`)");
            }
            Self::Voting {
                account,
                cards,
                votes_in_flight,
            } => {
                let _ = writeln!(out, "Your Account: {account}");
                for card in cards {
                    let _ = writeln!(
                        out,
                        "  [{}] {:<14} Total Votes: {:>4}   (`vote {}` to vote for {})",
                        card.index, card.name, card.votes, card.index, card.name
                    );
                }
                if *votes_in_flight > 0 {
                    let _ = writeln!(out, "Waiting for {votes_in_flight} vote(s) to be mined...");
                }
            }
        }
        out
    }
}

/// Resolves a `vote` argument: a display index, or a contestant name in any case.
/// Indexes are not range-checked here.
pub fn parse_contestant(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    if let Ok(index) = raw.parse::<usize>() {
        return Some(index);
    }
    CONTESTANTS
        .iter()
        .position(|contestant| contestant.name.eq_ignore_ascii_case(raw))
}

#[cfg(test)]
mod tests {
    use shared::domain::TallySnapshot;

    use super::*;
    use crate::controller::SessionPhase;

    fn session(wallet: bool, account: Option<&str>, tallies: Vec<u64>) -> SessionSnapshot {
        SessionSnapshot {
            phase: SessionPhase::NoProvider,
            wallet_detected: wallet,
            account: account.map(Account::from),
            contract_bound: account.is_some(),
            tallies: TallySnapshot::from_counts(tallies),
            votes_in_flight: 0,
        }
    }

    #[test]
    fn missing_wallet_shows_install_prompt() {
        let view = ViewState::from_session(&session(false, None, vec![0, 0, 0]));
        assert_eq!(view, ViewState::InstallWallet);
        assert!(view.render_text().contains(INSTALL_PROMPT));
    }

    #[test]
    fn wallet_without_account_shows_connect_prompt() {
        let view = ViewState::from_session(&session(true, None, vec![0, 0, 0]));
        assert_eq!(view, ViewState::ConnectWallet);
    }

    #[test]
    fn connected_session_shows_one_card_per_contestant() {
        let view = ViewState::from_session(&session(true, Some("0xABC"), vec![0, 1, 0]));

        let ViewState::Voting { account, cards, .. } = &view else {
            panic!("expected voting view, got {view:?}");
        };
        assert_eq!(account.as_str(), "0xABC");
        let votes: Vec<_> = cards.iter().map(|card| (card.name, card.votes)).collect();
        assert_eq!(votes, [("Fyang", 0), ("Alyssa", 1), ("Hong Lao Shi", 0)]);

        let text = view.render_text();
        assert!(text.contains("Your Account: 0xABC"));
        assert!(text.contains("Alyssa"));
    }

    #[test]
    fn unbound_contract_shows_account_without_cards() {
        let view = ViewState::from_session(&SessionSnapshot {
            phase: SessionPhase::AccountConnected,
            contract_bound: false,
            ..session(true, Some("0xABC"), vec![0, 0, 0])
        });

        let ViewState::Voting { account, cards, .. } = &view else {
            panic!("expected voting view, got {view:?}");
        };
        assert_eq!(account.as_str(), "0xABC");
        assert!(cards.is_empty());

        let text = view.render_text();
        assert!(text.contains("Your Account: 0xABC"));
        assert!(!text.contains("Total Votes"));
        assert!(!text.contains("`vote"));
    }

    #[test]
    fn contestants_resolve_by_index_or_name() {
        assert_eq!(parse_contestant("2"), Some(2));
        assert_eq!(parse_contestant(" 7 "), Some(7));
        assert_eq!(parse_contestant("alyssa"), Some(1));
        assert_eq!(parse_contestant("Hong Lao Shi"), Some(2));
        assert_eq!(parse_contestant("nobody"), None);
        assert_eq!(parse_contestant(""), None);
    }
}
