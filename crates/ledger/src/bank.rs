//! Token transfer collaborator.
//!
//! The ledger hands every operation's transfers to a [`TokenTransfer`] as a
//! single batch. A batch either applies completely or not at all.

use common::Pubkey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A token balance: one asset held by one owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAccount {
    pub asset: Pubkey,
    pub owner: Pubkey,
}

impl TokenAccount {
    pub fn new(asset: Pubkey, owner: Pubkey) -> Self {
        Self { asset, owner }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub asset: Pubkey,
    pub from: Pubkey,
    pub to: Pubkey,
    pub amount: u64,
}

impl Transfer {
    pub fn source(&self) -> TokenAccount {
        TokenAccount::new(self.asset, self.from)
    }

    pub fn destination(&self) -> TokenAccount {
        TokenAccount::new(self.asset, self.to)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    #[error("Insufficient funds in {owner} for asset {asset}: need {needed}, have {available}")]
    InsufficientFunds {
        asset: Pubkey,
        owner: Pubkey,
        needed: u64,
        available: u64,
    },

    #[error("Balance overflow for {owner}")]
    Overflow { owner: Pubkey },

    #[error("Transfer rejected: {0}")]
    Rejected(String),
}

pub trait TokenTransfer: Send + Sync {
    /// Apply all transfers in order, or none of them
    fn transfer_batch(&mut self, transfers: &[Transfer]) -> Result<(), TransferError>;

    fn balance(&self, account: &TokenAccount) -> u64;
}

/// Balances held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryBank {
    balances: HashMap<TokenAccount, u64>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` out of thin air, for test and script setup
    pub fn mint(&mut self, asset: Pubkey, owner: Pubkey, amount: u64) {
        *self.balances.entry(TokenAccount::new(asset, owner)).or_insert(0) += amount;
    }

    /// Sum of all balances of one asset
    pub fn supply(&self, asset: &Pubkey) -> u64 {
        self.balances
            .iter()
            .filter(|(account, _)| &account.asset == asset)
            .map(|(_, amount)| *amount)
            .sum()
    }
}

impl TokenTransfer for InMemoryBank {
    fn transfer_batch(&mut self, transfers: &[Transfer]) -> Result<(), TransferError> {
        let mut scratch: HashMap<TokenAccount, u64> = HashMap::new();

        for transfer in transfers {
            let source = transfer.source();
            let available = *scratch
                .entry(source)
                .or_insert_with(|| self.balances.get(&source).copied().unwrap_or(0));
            let remaining = available
                .checked_sub(transfer.amount)
                .ok_or(TransferError::InsufficientFunds {
                    asset: transfer.asset,
                    owner: transfer.from,
                    needed: transfer.amount,
                    available,
                })?;
            scratch.insert(source, remaining);

            let destination = transfer.destination();
            let current = *scratch
                .entry(destination)
                .or_insert_with(|| self.balances.get(&destination).copied().unwrap_or(0));
            let credited = current
                .checked_add(transfer.amount)
                .ok_or(TransferError::Overflow { owner: transfer.to })?;
            scratch.insert(destination, credited);
        }

        self.balances.extend(scratch);
        Ok(())
    }

    fn balance(&self, account: &TokenAccount) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_batch_applies_in_order() {
        let usdc = Pubkey::named("usdc");
        let (alice, bob, carol) = (Pubkey::named("alice"), Pubkey::named("bob"), Pubkey::named("carol"));
        let mut bank = InMemoryBank::new();
        bank.mint(usdc, alice, 100);

        // bob forwards funds he only receives inside the same batch
        bank.transfer_batch(&[
            Transfer { asset: usdc, from: alice, to: bob, amount: 60 },
            Transfer { asset: usdc, from: bob, to: carol, amount: 50 },
        ])
        .unwrap();

        assert_eq!(bank.balance(&TokenAccount::new(usdc, alice)), 40);
        assert_eq!(bank.balance(&TokenAccount::new(usdc, bob)), 10);
        assert_eq!(bank.balance(&TokenAccount::new(usdc, carol)), 50);
    }

    #[test]
    fn test_failed_batch_changes_nothing() {
        let usdc = Pubkey::named("usdc");
        let (alice, bob) = (Pubkey::named("alice"), Pubkey::named("bob"));
        let mut bank = InMemoryBank::new();
        bank.mint(usdc, alice, 100);

        let result = bank.transfer_batch(&[
            Transfer { asset: usdc, from: alice, to: bob, amount: 80 },
            Transfer { asset: usdc, from: alice, to: bob, amount: 30 },
        ]);
        assert_matches!(result, Err(TransferError::InsufficientFunds { available: 20, .. }));
        assert_eq!(bank.balance(&TokenAccount::new(usdc, alice)), 100);
        assert_eq!(bank.balance(&TokenAccount::new(usdc, bob)), 0);
        assert_eq!(bank.supply(&usdc), 100);
    }
}
