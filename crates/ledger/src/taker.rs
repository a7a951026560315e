//! Taker positions and funding deposits.

use common::address::taker_address;
use common::{Address, Timestamp};

use crate::accounts::{TakerInfo, Vault};
use crate::auth::Signer;
use crate::error::{LedgerError, Result, Side};
use crate::event::EventKind;
use crate::ledger::Ledger;
use crate::tx::Transaction;

impl Ledger {
    /// Open a taker position. Entering a vault the signer already holds a
    /// position in returns the existing position.
    pub fn taker_enter(&mut self, signer: Signer, vault_key: Address, now: Timestamp) -> Result<Address> {
        self.execute("taker_enter", now, |ledger| {
            let ctx = ledger.vault_context(&vault_key)?;
            ledger.check_open(&ctx, now)?;

            let mut tx = Transaction::new();
            let mut vault = ctx.vault.clone();
            let (taker_key, taker) = open_taker(&mut tx, &mut vault, vault_key, signer, ledger)?;
            if let Some(taker) = taker {
                tx.write(vault_key, vault).write(taker_key, taker);
            }
            Ok((tx, taker_key))
        })
    }

    /// Set the taker's deposited funding to `new_qty`. Deposits are capped by
    /// what the taker needs to exercise everything bought; withdrawals return
    /// the difference.
    pub fn taker_adjust_funding(
        &mut self,
        signer: Signer,
        vault_key: Address,
        new_qty: u64,
        now: Timestamp,
    ) -> Result<u64> {
        self.execute("taker_adjust_funding", now, |ledger| {
            let ctx = ledger.vault_context(&vault_key)?;
            ledger.check_open(&ctx, now)?;

            let taker_key = taker_address(&vault_key, &signer.key());
            let mut taker = ledger.taker(&taker_key)?.clone();
            let mut vault = ctx.vault.clone();
            let funding = ctx.funding_asset();
            let mut tx = Transaction::new();

            if new_qty >= taker.qty_deposited {
                let added = (new_qty - taker.qty_deposited).min(taker.missing_funding());
                tx.transfer(funding, signer.key(), vault_key, added);
                taker.qty_deposited += added;
                vault.adjust_deposits(added, 0)?;
            } else {
                let removed = taker.qty_deposited - new_qty;
                tx.transfer(funding, vault_key, signer.key(), removed);
                taker.qty_deposited -= removed;
                vault.adjust_deposits(0, removed)?;
            }

            let deposited = taker.qty_deposited;
            tx.emit(EventKind::TakerFunded {
                vault: vault_key,
                taker: taker_key,
                deposited,
            })
            .write(vault_key, vault)
            .write(taker_key, taker);
            Ok((tx, deposited))
        })
    }
}

/// Taker position for `signer`, creating it in `vault` when absent. Returns
/// `None` for the account when the position already exists.
pub fn open_taker(
    tx: &mut Transaction,
    vault: &mut Vault,
    vault_key: Address,
    signer: Signer,
    ledger: &Ledger,
) -> Result<(Address, Option<TakerInfo>)> {
    let taker_key = taker_address(&vault_key, &signer.key());
    match ledger.taker(&taker_key) {
        Ok(_) => return Ok((taker_key, None)),
        Err(LedgerError::AccountNotFound(_)) => {}
        Err(err) => return Err(err),
    }
    if vault.is_takers_full || vault.takers_num >= vault.max_takers {
        return Err(LedgerError::CapacityExceeded(Side::Taker));
    }

    vault.takers_num += 1;
    vault.is_takers_full = vault.takers_num >= vault.max_takers;
    let taker = TakerInfo {
        owner: signer.key(),
        vault: vault_key,
        ord: vault.takers_num,
        max_base_asset: 0,
        qty_deposited: 0,
        is_settled: false,
    };
    tx.emit(EventKind::TakerEntered {
        vault: vault_key,
        taker: taker_key,
        owner: signer.key(),
        ord: taker.ord,
    });
    Ok((taker_key, Some(taker)))
}
