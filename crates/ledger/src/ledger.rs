//! The ledger: accounts, balances and the event log behind one write path.

use common::{derive_address, Address, AddressDomain, Pubkey, Timestamp};
use observability::ProtocolMetrics;
use tracing::{debug, warn};

use crate::accounts::{LotTerms, MakerInfo, OracleTicket, TakerInfo, TicketKind, Vault, VaultFactory};
use crate::arena::AccountArena;
use crate::bank::{TokenAccount, TokenTransfer};
use crate::error::{ErrorCategory, LedgerError, Result};
use crate::log::EventLog;
use crate::params::LedgerParams;
use crate::tx::Transaction;

/// Errors an operation built on top of the ledger may return
pub trait Categorized {
    fn category(&self) -> ErrorCategory;
}

impl Categorized for LedgerError {
    fn category(&self) -> ErrorCategory {
        LedgerError::category(self)
    }
}

pub struct Ledger {
    arena: AccountArena,
    bank: Box<dyn TokenTransfer>,
    params: LedgerParams,
    log: EventLog,
    metrics: ProtocolMetrics,
}

impl Ledger {
    pub fn new(params: LedgerParams, bank: Box<dyn TokenTransfer>) -> Self {
        Self {
            arena: AccountArena::new(),
            bank,
            params,
            log: EventLog::new(),
            metrics: ProtocolMetrics::new("ledger"),
        }
    }

    pub fn params(&self) -> &LedgerParams {
        &self.params
    }

    pub fn events(&self) -> &EventLog {
        &self.log
    }

    pub fn metrics(&self) -> &ProtocolMetrics {
        &self.metrics
    }

    pub fn arena(&self) -> &AccountArena {
        &self.arena
    }

    pub fn balance(&self, asset: Pubkey, owner: Pubkey) -> u64 {
        self.bank.balance(&TokenAccount::new(asset, owner))
    }

    pub fn factory(&self, address: &Address) -> Result<&VaultFactory> {
        self.arena.factory(address)
    }

    pub fn vault(&self, address: &Address) -> Result<&Vault> {
        self.arena.vault(address)
    }

    pub fn maker(&self, address: &Address) -> Result<&MakerInfo> {
        self.arena.maker(address)
    }

    pub fn taker(&self, address: &Address) -> Result<&TakerInfo> {
        self.arena.taker(address)
    }

    pub fn makers_in_vault(&self, vault: &Address) -> Vec<(Address, &MakerInfo)> {
        self.arena.makers_in_vault(vault)
    }

    pub fn takers_in_vault(&self, vault: &Address) -> Vec<(Address, &TakerInfo)> {
        self.arena.takers_in_vault(vault)
    }

    /// Address of the ticket `requester` holds for `factory`
    pub fn ticket_address(kind: TicketKind, factory: &Address, requester: &Pubkey) -> Address {
        let domain = match kind {
            TicketKind::FairPrice => AddressDomain::FairPriceTicket,
            TicketKind::Settle => AddressDomain::SettleTicket,
        };
        derive_address(domain, &[factory, requester])
    }

    pub fn ticket(&self, kind: TicketKind, factory: &Address, requester: &Pubkey) -> Option<&OracleTicket> {
        self.arena
            .ticket(&Self::ticket_address(kind, factory, requester))
            .ok()
    }

    /// Vault together with its factory and lot arithmetic
    pub fn vault_context(&self, vault_address: &Address) -> Result<VaultContext<'_>> {
        let vault = self.arena.vault(vault_address)?;
        let factory = self.arena.factory(&vault.factory)?;
        let terms = LotTerms::new(&factory.series, vault.lot_size)?;
        Ok(VaultContext {
            address: *vault_address,
            vault,
            factory,
            terms,
        })
    }

    /// Run one operation: validate and build against the current state, then
    /// commit the transaction. Transfers are applied first; if the token
    /// collaborator refuses them no account changes.
    pub fn execute<T, E>(
        &mut self,
        op: &'static str,
        now: Timestamp,
        build: impl FnOnce(&Ledger) -> std::result::Result<(Transaction, T), E>,
    ) -> std::result::Result<T, E>
    where
        E: From<LedgerError> + Categorized + std::fmt::Display,
    {
        let _timer = self.metrics.time(op);
        let outcome = build(self).and_then(|(tx, output)| {
            self.commit(tx, now).map_err(E::from)?;
            Ok(output)
        });

        match &outcome {
            Ok(_) => self.metrics.record_op(op),
            Err(err) => {
                let category = err.category();
                warn!(op, category = category.as_str(), error = %err, "Operation rejected");
                self.metrics.record_rejection(op, category.as_str());
            }
        }
        outcome
    }

    fn commit(&mut self, tx: Transaction, now: Timestamp) -> Result<()> {
        let (writes, transfers, events) = tx.into_parts();
        self.bank.transfer_batch(&transfers)?;
        debug!(
            writes = writes.len(),
            transfers = transfers.len(),
            "Committing transaction"
        );
        for (address, account) in writes {
            self.arena.put(address, account);
        }
        for event in events {
            self.log.append(now, event);
        }
        Ok(())
    }
}

/// Read view of one vault
#[derive(Debug, Clone, Copy)]
pub struct VaultContext<'a> {
    pub address: Address,
    pub vault: &'a Vault,
    pub factory: &'a VaultFactory,
    pub terms: LotTerms,
}

impl VaultContext<'_> {
    pub fn collateral_asset(&self) -> Pubkey {
        self.factory.series.collateral_asset().mint
    }

    pub fn funding_asset(&self) -> Pubkey {
        self.factory.series.funding_asset().mint
    }
}
