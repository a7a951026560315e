//! Capabilities an operation must be handed before it may act.
//!
//! Holding a [`Signer`] stands for a verified signature by that key. The
//! ledger never checks signatures itself; the caller that builds the
//! capability is responsible for that.

use common::Pubkey;
use serde::{Deserialize, Serialize};

/// A key that signed the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signer(Pubkey);

impl Signer {
    pub fn new(key: Pubkey) -> Self {
        Self(key)
    }

    pub fn key(&self) -> Pubkey {
        self.0
    }
}

/// The oracle's signing key, required to consume tickets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OracleCredential(Pubkey);

impl OracleCredential {
    pub fn new(key: Pubkey) -> Self {
        Self(key)
    }

    pub fn key(&self) -> Pubkey {
        self.0
    }
}
