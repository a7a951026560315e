//! Account storage keyed by derived address.

use common::Address;
use std::collections::HashMap;

use crate::accounts::{Account, MakerInfo, OracleTicket, TakerInfo, Vault, VaultFactory};
use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Default)]
pub struct AccountArena {
    accounts: HashMap<Address, Account>,
    /// Position addresses per vault, in insertion order
    makers_by_vault: HashMap<Address, Vec<Address>>,
    takers_by_vault: HashMap<Address, Vec<Address>>,
}

macro_rules! typed_getter {
    ($name:ident, $ty:ty, $variant:ident, $expected:literal) => {
        pub fn $name(&self, address: &Address) -> Result<&$ty> {
            match self.accounts.get(address) {
                Some(Account::$variant(inner)) => Ok(inner),
                Some(_) => Err(LedgerError::WrongAccountKind {
                    address: *address,
                    expected: $expected,
                }),
                None => Err(LedgerError::AccountNotFound(*address)),
            }
        }
    };
}

impl AccountArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn get(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    typed_getter!(factory, VaultFactory, Factory, "vault factory");
    typed_getter!(vault, Vault, Vault, "vault");
    typed_getter!(maker, MakerInfo, Maker, "maker position");
    typed_getter!(taker, TakerInfo, Taker, "taker position");
    typed_getter!(ticket, OracleTicket, Ticket, "oracle ticket");

    /// Insert or replace an account
    pub fn put(&mut self, address: Address, account: Account) {
        let index = match &account {
            Account::Maker(maker) => Some((&mut self.makers_by_vault, maker.vault)),
            Account::Taker(taker) => Some((&mut self.takers_by_vault, taker.vault)),
            _ => None,
        };
        if let Some((index, vault)) = index {
            if !self.accounts.contains_key(&address) {
                index.entry(vault).or_default().push(address);
            }
        }
        self.accounts.insert(address, account);
    }

    /// Maker positions of a vault, ordered by entry
    pub fn makers_in_vault(&self, vault: &Address) -> Vec<(Address, &MakerInfo)> {
        let mut makers: Vec<_> = self
            .makers_by_vault
            .get(vault)
            .into_iter()
            .flatten()
            .filter_map(|address| match self.accounts.get(address) {
                Some(Account::Maker(maker)) => Some((*address, maker)),
                _ => None,
            })
            .collect();
        makers.sort_by_key(|(_, maker)| maker.ord);
        makers
    }

    /// Taker positions of a vault, ordered by entry
    pub fn takers_in_vault(&self, vault: &Address) -> Vec<(Address, &TakerInfo)> {
        let mut takers: Vec<_> = self
            .takers_by_vault
            .get(vault)
            .into_iter()
            .flatten()
            .filter_map(|address| match self.accounts.get(address) {
                Some(Account::Taker(taker)) => Some((*address, taker)),
                _ => None,
            })
            .collect();
        takers.sort_by_key(|(_, taker)| taker.ord);
        takers
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
