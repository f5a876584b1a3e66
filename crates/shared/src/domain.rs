use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

// Accounts are kept exactly as the wallet reported them.
string_newtype!(Account);
string_newtype!(TxHash);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Contestant {
    pub name: &'static str,
    pub display_order: usize,
}

/// Display list of contestants. The position of each entry is also the index
/// passed to `likeContestant` and the index of its tally in `getContestants()`.
pub const CONTESTANTS: [Contestant; 3] = [
    Contestant {
        name: "Fyang",
        display_order: 0,
    },
    Contestant {
        name: "Alyssa",
        display_order: 1,
    },
    Contestant {
        name: "Hong Lao Shi",
        display_order: 2,
    },
];

/// Contestant record as returned by the contract's read surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestantRecord {
    pub name: String,
    pub likes: u64,
}

/// Last fetched vote counts, one per contestant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallySnapshot(Vec<u64>);

impl TallySnapshot {
    pub fn zeroed(len: usize) -> Self {
        Self(vec![0; len])
    }

    pub fn from_counts(counts: Vec<u64>) -> Self {
        Self(counts)
    }

    pub fn get(&self, index: usize) -> Option<u64> {
        self.0.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn counts(&self) -> &[u64] {
        &self.0
    }
}

impl Default for TallySnapshot {
    fn default() -> Self {
        Self::zeroed(CONTESTANTS.len())
    }
}
