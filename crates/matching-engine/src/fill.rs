//! Taker buy: executes an [`Allocation`] against the vault.

use common::units::{pow10, round_u64};
use common::{Address, Pubkey, Timestamp};
use ledger::{open_taker, EventKind, Ledger, LedgerError, Signer, Transaction};
use observability::ProtocolMetrics;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::allocation::Allocation;
use crate::error::MatchingError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyOutcome {
    pub num_lots_bought: u64,
    /// Fair price the premium was charged at
    pub price: u64,
    /// Premium paid, fees included
    pub premium_paid: u64,
    pub funding_added: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyRequest {
    pub vault: Address,
    /// Highest fair price the taker accepts
    pub max_fair_price: u64,
    pub num_lots: u64,
    /// Funding to deposit right away, capped at what the lots require
    pub initial_funding: u64,
    /// Receives the frontend share of the fee
    pub frontend: Pubkey,
}

/// Buy up to `request.num_lots` from the allocated makers, in allocation order.
///
/// Fewer lots than requested is not an error; the outcome reports what was
/// bought.
pub fn taker_buy(
    ledger: &mut Ledger,
    signer: Signer,
    request: BuyRequest,
    allocation: &Allocation,
    now: Timestamp,
) -> Result<BuyOutcome> {
    let vault_key = request.vault;
    let outcome = ledger.execute("taker_buy", now, |ledger| -> Result<(Transaction, BuyOutcome)> {
        if request.num_lots == 0 {
            return Err(LedgerError::InvalidQuantity("number of lots must be positive".to_string()).into());
        }
        if allocation.is_empty() {
            return Err(LedgerError::EmptyAllocation.into());
        }
        let ctx = ledger.vault_context(&vault_key)?;
        ledger.check_open(&ctx, now)?;

        let params = ledger.params();
        let factory = ctx.factory;
        let updated_at = factory.ts_last_fair_price;
        if factory.last_fair_price == 0
            || updated_at > now
            || now - updated_at > params.max_fair_price_age_seconds
        {
            return Err(LedgerError::FairPriceTooOld {
                updated_at,
                max_age: params.max_fair_price_age_seconds,
            }
            .into());
        }
        let price = factory.last_fair_price;
        if request.max_fair_price < price {
            return Err(LedgerError::MaxFairPriceTooLow {
                max: request.max_fair_price,
                fair: price,
            }
            .into());
        }

        let mut tx = Transaction::new();
        let mut vault = ctx.vault.clone();
        let (taker_key, created) = open_taker(&mut tx, &mut vault, vault_key, signer, ledger)?;
        let mut taker = match created {
            Some(taker) => taker,
            None => ledger.taker(&taker_key)?.clone(),
        };

        let quote = factory.series.quote.mint;
        let lot_multiplier = pow10(vault.lot_size as i32);
        let mut remaining = request.num_lots;
        let mut bought = 0u64;
        let mut premium_paid = 0u64;

        for (i, entry) in allocation.entries().iter().enumerate() {
            if allocation.entries()[..i].iter().any(|seen| seen.maker == entry.maker) {
                return Err(MatchingError::DuplicateMaker(entry.maker));
            }
            if remaining == 0 {
                break;
            }
            let mut maker = ledger.maker(&entry.maker)?.clone();
            if maker.vault != vault_key {
                return Err(LedgerError::MakerNotInVault {
                    maker: entry.maker,
                    vault: vault_key,
                }
                .into());
            }
            if maker.is_settled || maker.is_all_sold {
                continue;
            }
            let lots = ctx.terms.lots_in(maker.unsold()).min(remaining);
            if lots == 0 {
                continue;
            }

            let sold = lots
                .checked_mul(ctx.terms.rounded_lot_value)
                .ok_or_else(|| LedgerError::Arithmetic("sold volume overflow".to_string()))?;
            maker.volume_sold = maker
                .volume_sold
                .checked_add(sold)
                .ok_or_else(|| LedgerError::Arithmetic("maker volume sold overflow".to_string()))?;
            maker.is_all_sold = ctx.terms.is_all_sold(maker.unsold());
            vault.sell_collateral(sold)?;

            let premium_value = price as f64 * lot_multiplier * lots as f64;
            let premium = round_u64(premium_value).map_err(LedgerError::from)?;
            let (protocol_fee, frontend_fee) = params.fee_split(premium_value)?;
            let fees = protocol_fee + frontend_fee;
            if premium <= fees {
                return Err(LedgerError::PremiumTooLow { premium, fees }.into());
            }

            tx.transfer(quote, signer.key(), maker.owner, premium - fees)
                .transfer(quote, signer.key(), params.protocol_treasury, protocol_fee)
                .transfer(quote, signer.key(), request.frontend, frontend_fee)
                .emit(EventKind::LotsBought {
                    vault: vault_key,
                    taker: taker_key,
                    maker: entry.maker,
                    lots,
                    premium,
                    protocol_fee,
                    frontend_fee,
                })
                .write(entry.maker, maker);

            remaining -= lots;
            bought += lots;
            premium_paid += premium;
        }

        if bought == 0 {
            return Err(MatchingError::NoEligibleSellers);
        }

        taker.max_base_asset = taker
            .max_base_asset
            .checked_add(ctx.terms.funding_for_lots(bought)?)
            .ok_or_else(|| LedgerError::Arithmetic("taker exposure overflow".to_string()))?;
        let funding_added = request.initial_funding.min(taker.missing_funding());
        if funding_added > 0 {
            taker.qty_deposited += funding_added;
            vault.adjust_deposits(funding_added, 0)?;
            tx.transfer(ctx.funding_asset(), signer.key(), vault_key, funding_added)
                .emit(EventKind::TakerFunded {
                    vault: vault_key,
                    taker: taker_key,
                    deposited: taker.qty_deposited,
                });
        }
        tx.write(vault_key, vault).write(taker_key, taker);

        Ok((
            tx,
            BuyOutcome {
                num_lots_bought: bought,
                price,
                premium_paid,
                funding_added,
            },
        ))
    })?;

    let partial = outcome.num_lots_bought < request.num_lots;
    ProtocolMetrics::new("matching").record_fill(outcome.num_lots_bought, partial);
    if partial {
        warn!(
            vault = %vault_key,
            requested = request.num_lots,
            bought = outcome.num_lots_bought,
            "Partial fill"
        );
    } else {
        info!(vault = %vault_key, lots = outcome.num_lots_bought, price = outcome.price, "Lots bought");
    }
    Ok(outcome)
}
