//! Vault ledger for OpenHedge
//!
//! Accounts (vault factories, vaults, maker and taker positions, oracle
//! tickets) live in an arena keyed by derived addresses. Every mutating
//! operation validates against the current state, stages its account writes
//! and token transfers in a [`Transaction`], and commits them together
//! through [`Ledger::execute`].
//!
//! # Key Invariants
//!
//! - A failed operation changes neither accounts nor balances
//! - Vault aggregates always equal the sums over their positions
//! - Maker and taker ords are gapless and assigned in entry order
//! - A ticket generation is consumed at most once

pub mod accounts;
pub mod arena;
pub mod auth;
pub mod bank;
pub mod emergency;
pub mod error;
pub mod event;
pub mod instruction;
pub mod invariants;
pub mod ledger;
pub mod log;
pub mod maker;
pub mod params;
pub mod store;
pub mod taker;
pub mod tickets;
pub mod tx;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use accounts::{
    Account, LotTerms, MakerInfo, OracleTicket, SettleResult, TakerInfo, TicketKind, TicketState, Vault,
    VaultFactory, VaultParams,
};
pub use auth::{OracleCredential, Signer};
pub use bank::{InMemoryBank, TokenAccount, TokenTransfer, Transfer, TransferError};
pub use error::{ErrorCategory, LedgerError, Result, Side};
pub use event::{EventKind, LedgerEvent};
pub use instruction::Instruction;
pub use invariants::{check_vault_invariants, InvariantViolation};
pub use ledger::{Categorized, Ledger, VaultContext};
pub use log::EventLog;
pub use maker::VaultCreated;
pub use params::LedgerParams;
pub use store::{InMemoryLedgerStore, LedgerStore};
pub use taker::open_taker;
pub use tickets::{FairPriceWrite, SettlePriceWrite};
pub use tx::Transaction;
