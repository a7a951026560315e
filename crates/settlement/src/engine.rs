//! Payouts after maturity.
//!
//! Collateral is quote units for puts and base units for calls; funding is
//! the other asset. When a series is exercised, makers exchange the
//! collateral they sold for the funding takers deposited. Collateral sold to
//! takers who never deposited funding is returned to makers as a bonus,
//! first come first served, tracked in `bonus_not_exercised`.

use common::address::{maker_address, taker_address};
use common::{Address, Pubkey, Timestamp};
use ledger::{EventKind, Ledger, LedgerError, SettleResult, Side, Signer, Transaction, VaultContext};
use observability::ProtocolMetrics;
use tracing::info;

use crate::error::SettlementError;
use crate::outcome::{side_name, SettleOutcome};
use crate::Result;

fn check_settleable(ctx: &VaultContext<'_>, is_settled: bool, position: Address) -> Result<()> {
    let factory = ctx.factory;
    if !factory.matured {
        return Err(LedgerError::NotMatured.into());
    }
    if factory.settled_price == 0 {
        return Err(LedgerError::SettlePriceMissing.into());
    }
    if factory.emergency_mode {
        return Err(LedgerError::EmergencyMode.into());
    }
    if is_settled {
        return Err(LedgerError::AlreadySettled(position).into());
    }
    Ok(())
}

fn check_emergency(ctx: &VaultContext<'_>, is_settled: bool, position: Address) -> Result<()> {
    if !ctx.factory.emergency_mode {
        return Err(LedgerError::NotEmergencyMode.into());
    }
    if is_settled {
        return Err(LedgerError::AlreadySettled(position).into());
    }
    Ok(())
}

fn record(side: Side, vault: Address, position: Address, outcome: &SettleOutcome) {
    ProtocolMetrics::new("settlement").record_settlement(side_name(side), outcome.result.as_str());
    info!(
        vault = %vault,
        position = %position,
        side = side_name(side),
        result = outcome.result.as_str(),
        base = outcome.base_transfer,
        quote = outcome.quote_transfer,
        "Position settled"
    );
}

fn settled_event(vault: Address, position: Address, side: Side, outcome: &SettleOutcome) -> EventKind {
    EventKind::PositionSettled {
        vault,
        position,
        side,
        result: outcome.result,
        base_amount: outcome.base_transfer,
        quote_amount: outcome.quote_transfer,
    }
}

/// Settle `owner`'s maker position in `vault`. Anyone may trigger it; the
/// payout always goes to the owner.
pub fn settle_maker(ledger: &mut Ledger, vault: Address, owner: Pubkey, now: Timestamp) -> Result<SettleOutcome> {
    let position = maker_address(&vault, &owner);
    let outcome = ledger.execute("settle_maker", now, |ledger| -> Result<(Transaction, SettleOutcome)> {
        let ctx = ledger.vault_context(&vault)?;
        let mut maker = ledger.maker(&position)?.clone();
        check_settleable(&ctx, maker.is_settled, position)?;

        let kind = ctx.factory.kind();
        let mut vault_account = ctx.vault.clone();
        let outcome = if !ctx.factory.is_exercised() {
            SettleOutcome::from_assets(kind, maker.quote_asset_qty, 0, SettleResult::NotExercised)
        } else {
            let funded_value = ctx.terms.collateral_for_funding(vault_account.takers_total_deposited)?;
            let total_bonus = vault_account.total_sold().saturating_sub(funded_value);
            let bonus_left = total_bonus
                .checked_sub(vault_account.bonus_not_exercised)
                .ok_or_else(|| {
                    SettlementError::Accounting(format!(
                        "bonus already paid {} exceeds total bonus {}",
                        vault_account.bonus_not_exercised, total_bonus
                    ))
                })?;
            let bonus = bonus_left.min(maker.volume_sold);
            vault_account.bonus_not_exercised += bonus;

            let collateral = maker.unsold() + bonus;
            let funding = ctx.terms.funding_for_collateral(maker.volume_sold - bonus)?;
            let result = if collateral > 0 {
                SettleResult::PartiallyExercised
            } else {
                SettleResult::FullyExercised
            };
            SettleOutcome::from_assets(kind, collateral, funding, result)
        };

        maker.is_settled = true;
        let mut tx = Transaction::new();
        outcome.stage(&mut tx, &ctx, owner);
        tx.write(position, maker)
            .write(vault, vault_account)
            .emit(settled_event(vault, position, Side::Maker, &outcome));
        Ok((tx, outcome))
    })?;
    record(Side::Maker, vault, position, &outcome);
    Ok(outcome)
}

/// Settle `owner`'s taker position in `vault`
pub fn settle_taker(ledger: &mut Ledger, vault: Address, owner: Pubkey, now: Timestamp) -> Result<SettleOutcome> {
    let position = taker_address(&vault, &owner);
    let outcome = ledger.execute("settle_taker", now, |ledger| -> Result<(Transaction, SettleOutcome)> {
        let ctx = ledger.vault_context(&vault)?;
        let mut taker = ledger.taker(&position)?.clone();
        check_settleable(&ctx, taker.is_settled, position)?;

        let kind = ctx.factory.kind();
        let outcome = if !ctx.factory.is_exercised() {
            SettleOutcome::from_assets(kind, 0, taker.qty_deposited, SettleResult::NotExercised)
        } else {
            let collateral = ctx.terms.collateral_for_funding(taker.qty_deposited)?;
            let result = if taker.qty_deposited == taker.max_base_asset {
                SettleResult::FullyExercised
            } else {
                SettleResult::PartiallyExercised
            };
            SettleOutcome::from_assets(kind, collateral, 0, result)
        };

        taker.is_settled = true;
        let mut tx = Transaction::new();
        outcome.stage(&mut tx, &ctx, owner);
        tx.write(position, taker)
            .emit(settled_event(vault, position, Side::Taker, &outcome));
        Ok((tx, outcome))
    })?;
    record(Side::Taker, vault, position, &outcome);
    Ok(outcome)
}

/// Withdraw a maker's full committed collateral from an emergency-mode factory
pub fn maker_emergency_exit(ledger: &mut Ledger, signer: Signer, vault: Address, now: Timestamp) -> Result<SettleOutcome> {
    let position = maker_address(&vault, &signer.key());
    let outcome = ledger.execute("maker_emergency_exit", now, |ledger| -> Result<(Transaction, SettleOutcome)> {
        let ctx = ledger.vault_context(&vault)?;
        let mut maker = ledger.maker(&position)?.clone();
        check_emergency(&ctx, maker.is_settled, position)?;

        let outcome = SettleOutcome::from_assets(
            ctx.factory.kind(),
            maker.quote_asset_qty,
            0,
            SettleResult::EmergencyExit,
        );
        maker.is_settled = true;
        let mut tx = Transaction::new();
        outcome.stage(&mut tx, &ctx, signer.key());
        tx.write(position, maker)
            .emit(settled_event(vault, position, Side::Maker, &outcome));
        Ok((tx, outcome))
    })?;
    record(Side::Maker, vault, position, &outcome);
    Ok(outcome)
}

/// Withdraw a taker's deposited funding from an emergency-mode factory
pub fn taker_emergency_exit(ledger: &mut Ledger, signer: Signer, vault: Address, now: Timestamp) -> Result<SettleOutcome> {
    let position = taker_address(&vault, &signer.key());
    let outcome = ledger.execute("taker_emergency_exit", now, |ledger| -> Result<(Transaction, SettleOutcome)> {
        let ctx = ledger.vault_context(&vault)?;
        let mut taker = ledger.taker(&position)?.clone();
        check_emergency(&ctx, taker.is_settled, position)?;

        let outcome = SettleOutcome::from_assets(
            ctx.factory.kind(),
            0,
            taker.qty_deposited,
            SettleResult::EmergencyExit,
        );
        taker.is_settled = true;
        let mut tx = Transaction::new();
        outcome.stage(&mut tx, &ctx, signer.key());
        tx.write(position, taker)
            .emit(settled_event(vault, position, Side::Taker, &outcome));
        Ok((tx, outcome))
    })?;
    record(Side::Taker, vault, position, &outcome);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use common::OptionKind;
    use ledger::testing::{btc, fixture_with, taker_of, usdc, Fixture, NOW};
    use ledger::{check_vault_invariants, VaultCreated};
    use matching_engine::{allocate, taker_buy, BuyRequest};

    /// Alice sells 100 lots, Bob 100. Tom buys 150 lots and funds `funding`.
    fn sold_vault(kind: OptionKind, funding: u64) -> (Fixture, VaultCreated) {
        let mut f = fixture_with(kind);
        let created = f
            .ledger
            .create_vault(f.signer("alice"), f.series, Fixture::vault_params(100, 1_000), NOW)
            .unwrap();
        f.ledger
            .maker_enter(f.signer("bob"), created.vault, 100, 1_000, NOW)
            .unwrap();
        f.set_fair_price(&created, 250_000, NOW);

        let allocation = allocate(&f.ledger, &created.vault, 150, 250_000).unwrap();
        let request = BuyRequest {
            vault: created.vault,
            max_fair_price: 250_000,
            num_lots: 150,
            initial_funding: funding,
            frontend: Pubkey::named("frontend"),
        };
        let tom = f.signer("tom");
        taker_buy(&mut f.ledger, tom, request, &allocation, NOW + 1).unwrap();
        (f, created)
    }

    fn after(f: &Fixture) -> Timestamp {
        f.series.maturity + 600
    }

    #[test]
    fn test_not_exercised_returns_deposits() {
        let (mut f, created) = sold_vault(OptionKind::Put, 15_000_000);
        f.settle(&created, 30_000_000_000);
        let now = after(&f);

        let alice = settle_maker(&mut f.ledger, created.vault, Pubkey::named("alice"), now).unwrap();
        assert_eq!(alice.result, SettleResult::NotExercised);
        assert_eq!(alice.quote_transfer, 2_500_000_000);
        assert_eq!(alice.base_transfer, 0);

        let tom = settle_taker(&mut f.ledger, created.vault, Pubkey::named("tom"), now).unwrap();
        assert_eq!(tom.result, SettleResult::NotExercised);
        assert_eq!(tom.base_transfer, 15_000_000);
    }

    #[test]
    fn test_fully_funded_put_exercise() {
        // 150 lots need 0.15 BTC
        let (mut f, created) = sold_vault(OptionKind::Put, 15_000_000);
        f.settle(&created, 20_000_000_000);
        let now = after(&f);

        let tom = settle_taker(&mut f.ledger, created.vault, Pubkey::named("tom"), now).unwrap();
        assert_eq!(tom.result, SettleResult::FullyExercised);
        assert_eq!(tom.quote_transfer, 3_750_000_000);

        // alice sold all 100 lots for 0.1 BTC
        let alice = settle_maker(&mut f.ledger, created.vault, Pubkey::named("alice"), now).unwrap();
        assert_eq!(alice.result, SettleResult::FullyExercised);
        assert_eq!(alice.base_transfer, 10_000_000);
        assert_eq!(alice.quote_transfer, 0);

        // bob sold 50 of 100 lots
        let bob = settle_maker(&mut f.ledger, created.vault, Pubkey::named("bob"), now).unwrap();
        assert_eq!(bob.result, SettleResult::PartiallyExercised);
        assert_eq!(bob.base_transfer, 5_000_000);
        assert_eq!(bob.quote_transfer, 1_250_000_000);

        // the vault is drained of both assets
        assert_eq!(f.ledger.balance(usdc(), created.vault), 0);
        assert_eq!(f.ledger.balance(btc(), created.vault), 0);
        assert_eq!(check_vault_invariants(&f.ledger, &created.vault).unwrap(), vec![]);
    }

    #[test]
    fn test_unfunded_exposure_becomes_maker_bonus() {
        // tom funds 100 of the 150 lots he bought
        let (mut f, created) = sold_vault(OptionKind::Put, 10_000_000);
        f.settle(&created, 20_000_000_000);
        let now = after(&f);

        let tom = settle_taker(&mut f.ledger, created.vault, Pubkey::named("tom"), now).unwrap();
        assert_eq!(tom.result, SettleResult::PartiallyExercised);
        assert_eq!(tom.quote_transfer, 2_500_000_000);

        // 50 lots were never funded; alice settles first and takes that bonus
        let alice = settle_maker(&mut f.ledger, created.vault, Pubkey::named("alice"), now).unwrap();
        assert_eq!(alice.quote_transfer, 1_250_000_000);
        assert_eq!(alice.base_transfer, 5_000_000);
        assert_eq!(alice.result, SettleResult::PartiallyExercised);

        let bob = settle_maker(&mut f.ledger, created.vault, Pubkey::named("bob"), now).unwrap();
        assert_eq!(bob.quote_transfer, 1_250_000_000);
        assert_eq!(bob.base_transfer, 5_000_000);

        assert_eq!(f.ledger.vault(&created.vault).unwrap().bonus_not_exercised, 1_250_000_000);
        assert_eq!(f.ledger.balance(usdc(), created.vault), 0);
        assert_eq!(f.ledger.balance(btc(), created.vault), 0);
    }

    #[test]
    fn test_settle_twice_pays_once() {
        let (mut f, created) = sold_vault(OptionKind::Put, 15_000_000);
        f.settle(&created, 20_000_000_000);
        let now = after(&f);
        let alice = Pubkey::named("alice");
        let before = f.ledger.balance(btc(), alice);

        settle_maker(&mut f.ledger, created.vault, alice, now).unwrap();
        assert_matches!(
            settle_maker(&mut f.ledger, created.vault, alice, now),
            Err(SettlementError::Ledger(LedgerError::AlreadySettled(_)))
        );
        assert_eq!(f.ledger.balance(btc(), alice), before + 10_000_000);
    }

    #[test]
    fn test_settlement_requires_price() {
        let (mut f, created) = sold_vault(OptionKind::Put, 0);
        let now = after(&f);
        assert_matches!(
            settle_maker(&mut f.ledger, created.vault, Pubkey::named("alice"), now),
            Err(SettlementError::Ledger(LedgerError::NotMatured))
        );
    }

    #[test]
    fn test_call_exercise_pays_quote_to_makers() {
        // one call lot is 0.001 BTC of collateral, exercised at 25 USDC
        let (mut f, created) = sold_vault(OptionKind::Call, 3_750_000_000);
        f.settle(&created, 30_000_000_000);
        let now = after(&f);

        let tom = settle_taker(&mut f.ledger, created.vault, Pubkey::named("tom"), now).unwrap();
        assert_eq!(tom.result, SettleResult::FullyExercised);
        assert_eq!(tom.base_transfer, 15_000_000);

        let alice = settle_maker(&mut f.ledger, created.vault, Pubkey::named("alice"), now).unwrap();
        assert_eq!(alice.quote_transfer, 2_500_000_000);
        assert_eq!(alice.base_transfer, 0);
    }

    #[test]
    fn test_emergency_exit_returns_deposits() {
        let (mut f, created) = sold_vault(OptionKind::Put, 15_000_000);
        let grace = f.ledger.params().emergency_grace_seconds;
        let late = f.series.maturity + grace + 1;
        let tom = f.signer("tom");

        assert_matches!(
            taker_emergency_exit(&mut f.ledger, tom, created.vault, late),
            Err(SettlementError::Ledger(LedgerError::NotEmergencyMode))
        );
        f.ledger
            .activate_emergency_mode(f.signer("erin"), created.factory, late)
            .unwrap();

        let exit = taker_emergency_exit(&mut f.ledger, tom, created.vault, late).unwrap();
        assert_eq!(exit.result, SettleResult::EmergencyExit);
        assert_eq!(exit.base_transfer, 15_000_000);
        assert!(f.ledger.taker(&taker_of(&created, "tom")).unwrap().is_settled);

        let alice_signer = f.signer("alice");
        let alice = maker_emergency_exit(&mut f.ledger, alice_signer, created.vault, late).unwrap();
        assert_eq!(alice.quote_transfer, 2_500_000_000);
        assert_matches!(
            settle_maker(&mut f.ledger, created.vault, Pubkey::named("bob"), late),
            Err(SettlementError::Ledger(LedgerError::NotMatured))
        );
    }
}
