//! Pending changes of one operation.
//!
//! Operations validate against a read-only view of the ledger and collect
//! their effects here. Nothing touches state until [`crate::Ledger::execute`]
//! commits the whole transaction.

use common::{Address, Pubkey};

use crate::accounts::Account;
use crate::bank::Transfer;
use crate::event::EventKind;

#[derive(Debug, Clone, Default)]
pub struct Transaction {
    writes: Vec<(Address, Account)>,
    transfers: Vec<Transfer>,
    events: Vec<EventKind>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an account write; later writes to the same address win
    pub fn write(&mut self, address: Address, account: impl Into<Account>) -> &mut Self {
        self.writes.push((address, account.into()));
        self
    }

    /// Stage a token transfer. Zero amounts are dropped.
    pub fn transfer(&mut self, asset: Pubkey, from: Pubkey, to: Pubkey, amount: u64) -> &mut Self {
        if amount > 0 {
            self.transfers.push(Transfer {
                asset,
                from,
                to,
                amount,
            });
        }
        self
    }

    pub fn emit(&mut self, event: EventKind) -> &mut Self {
        self.events.push(event);
        self
    }

    pub fn writes(&self) -> &[(Address, Account)] {
        &self.writes
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn events(&self) -> &[EventKind] {
        &self.events
    }

    pub(crate) fn into_parts(self) -> (Vec<(Address, Account)>, Vec<Transfer>, Vec<EventKind>) {
        (self.writes, self.transfers, self.events)
    }
}
