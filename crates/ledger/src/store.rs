//! Async access to a shared ledger.
//!
//! Writers are serialized; each operation still commits atomically inside
//! the lock.

use async_trait::async_trait;
use common::{Address, Pubkey, Timestamp};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::accounts::{MakerInfo, OracleTicket, TakerInfo, TicketKind, Vault, VaultFactory};
use crate::auth::{OracleCredential, Signer};
use crate::event::LedgerEvent;
use crate::ledger::Ledger;
use crate::params::LedgerParams;
use crate::tickets::{FairPriceWrite, SettlePriceWrite};
use crate::Result;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn params(&self) -> LedgerParams;

    async fn factory(&self, address: &Address) -> Result<VaultFactory>;

    async fn vault(&self, address: &Address) -> Result<Vault>;

    async fn makers_in_vault(&self, vault: &Address) -> Vec<(Address, MakerInfo)>;

    async fn takers_in_vault(&self, vault: &Address) -> Vec<(Address, TakerInfo)>;

    async fn balance(&self, asset: Pubkey, owner: Pubkey) -> u64;

    async fn ticket(&self, kind: TicketKind, factory: &Address, requester: &Pubkey) -> Option<OracleTicket>;

    async fn events_from(&self, sequence: u64) -> Vec<LedgerEvent>;

    async fn issue_fair_price_ticket(&self, signer: Signer, factory: Address, now: Timestamp) -> Result<u64>;

    async fn issue_settle_ticket(&self, signer: Signer, factory: Address, now: Timestamp) -> Result<u64>;

    async fn consume_fair_price_ticket(
        &self,
        credential: OracleCredential,
        factory: Address,
        requester: Pubkey,
        price: u64,
        now: Timestamp,
    ) -> Result<FairPriceWrite>;

    async fn consume_settle_ticket(
        &self,
        credential: OracleCredential,
        factory: Address,
        requester: Pubkey,
        price: u64,
        now: Timestamp,
    ) -> Result<SettlePriceWrite>;
}

/// A [`Ledger`] behind a tokio lock
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    ledger: Arc<RwLock<Ledger>>,
}

impl InMemoryLedgerStore {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read().await
    }

    /// Exclusive access for operations not exposed through [`LedgerStore`]
    pub async fn write(&self) -> RwLockWriteGuard<'_, Ledger> {
        self.ledger.write().await
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn params(&self) -> LedgerParams {
        self.ledger.read().await.params().clone()
    }

    async fn factory(&self, address: &Address) -> Result<VaultFactory> {
        self.ledger.read().await.factory(address).cloned()
    }

    async fn vault(&self, address: &Address) -> Result<Vault> {
        self.ledger.read().await.vault(address).cloned()
    }

    async fn makers_in_vault(&self, vault: &Address) -> Vec<(Address, MakerInfo)> {
        self.ledger
            .read()
            .await
            .makers_in_vault(vault)
            .into_iter()
            .map(|(address, maker)| (address, maker.clone()))
            .collect()
    }

    async fn takers_in_vault(&self, vault: &Address) -> Vec<(Address, TakerInfo)> {
        self.ledger
            .read()
            .await
            .takers_in_vault(vault)
            .into_iter()
            .map(|(address, taker)| (address, taker.clone()))
            .collect()
    }

    async fn balance(&self, asset: Pubkey, owner: Pubkey) -> u64 {
        self.ledger.read().await.balance(asset, owner)
    }

    async fn ticket(&self, kind: TicketKind, factory: &Address, requester: &Pubkey) -> Option<OracleTicket> {
        self.ledger.read().await.ticket(kind, factory, requester).cloned()
    }

    async fn events_from(&self, sequence: u64) -> Vec<LedgerEvent> {
        self.ledger.read().await.events().get_from(sequence).to_vec()
    }

    async fn issue_fair_price_ticket(&self, signer: Signer, factory: Address, now: Timestamp) -> Result<u64> {
        self.ledger
            .write()
            .await
            .issue_fair_price_ticket(signer, factory, now)
    }

    async fn issue_settle_ticket(&self, signer: Signer, factory: Address, now: Timestamp) -> Result<u64> {
        self.ledger.write().await.issue_settle_ticket(signer, factory, now)
    }

    async fn consume_fair_price_ticket(
        &self,
        credential: OracleCredential,
        factory: Address,
        requester: Pubkey,
        price: u64,
        now: Timestamp,
    ) -> Result<FairPriceWrite> {
        self.ledger
            .write()
            .await
            .consume_fair_price_ticket(credential, factory, requester, price, now)
    }

    async fn consume_settle_ticket(
        &self,
        credential: OracleCredential,
        factory: Address,
        requester: Pubkey,
        price: u64,
        now: Timestamp,
    ) -> Result<SettlePriceWrite> {
        self.ledger
            .write()
            .await
            .consume_settle_ticket(credential, factory, requester, price, now)
    }
}
