//! Vault creation and maker positions.

use common::address::{factory_address, maker_address, vault_address};
use common::{Address, OptionSeries, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accounts::{LotTerms, MakerInfo, Vault, VaultFactory, VaultParams};
use crate::auth::Signer;
use crate::error::{LedgerError, Result, Side};
use crate::event::EventKind;
use crate::ledger::{Ledger, VaultContext};
use crate::tx::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultCreated {
    pub factory: Address,
    pub vault: Address,
    pub maker: Address,
    pub vault_id: u64,
}

impl Ledger {
    fn validate_series(&self, series: &OptionSeries, now: Timestamp) -> Result<()> {
        if series.strike == 0 {
            return Err(LedgerError::InvalidStrike);
        }
        if self.params().is_frozen(series.maturity, now) {
            return Err(LedgerError::InvalidMaturity {
                maturity: series.maturity,
                reason: format!("must be more than {}s in the future", self.params().freeze_seconds),
            });
        }
        if series.maturity > now.saturating_add(self.params().max_maturity_future_seconds) {
            return Err(LedgerError::InvalidMaturity {
                maturity: series.maturity,
                reason: format!(
                    "must be within {}s of now",
                    self.params().max_maturity_future_seconds
                ),
            });
        }
        Ok(())
    }

    /// Existing factory of `series`, or a new one staged in `tx`
    fn factory_or_new(
        &self,
        tx: &mut Transaction,
        series: &OptionSeries,
        now: Timestamp,
    ) -> Result<(Address, VaultFactory)> {
        let address = factory_address(series);
        match self.factory(&address) {
            Ok(existing) => Ok((address, existing.clone())),
            Err(LedgerError::AccountNotFound(_)) => {
                self.validate_series(series, now)?;
                tx.emit(EventKind::FactoryCreated {
                    factory: address,
                    series: *series,
                });
                Ok((address, VaultFactory::new(*series)))
            }
            Err(err) => Err(err),
        }
    }

    /// Register the factory for `series`
    pub fn create_vault_factory(&mut self, series: OptionSeries, now: Timestamp) -> Result<Address> {
        self.execute("create_vault_factory", now, |ledger| {
            let address = factory_address(&series);
            if ledger.arena().contains(&address) {
                return Err(LedgerError::AlreadyExists(address));
            }
            ledger.validate_series(&series, now)?;

            let mut tx = Transaction::new();
            tx.write(address, VaultFactory::new(series))
                .emit(EventKind::FactoryCreated {
                    factory: address,
                    series,
                });
            Ok((tx, address))
        })
    }

    /// Reserve the next vault id of `series`, creating its factory if absent
    pub fn next_vault_id(&mut self, series: OptionSeries, now: Timestamp) -> Result<u64> {
        self.execute("next_vault_id", now, |ledger| {
            let mut tx = Transaction::new();
            let (address, mut factory) = ledger.factory_or_new(&mut tx, &series, now)?;
            let reserved = factory.next_vault_id;
            factory.next_vault_id += 1;
            tx.write(address, factory);
            Ok((tx, reserved))
        })
    }

    /// Create a vault and enter its creator as the first maker. The factory is
    /// created on first use.
    pub fn create_vault(
        &mut self,
        signer: Signer,
        series: OptionSeries,
        params: VaultParams,
        now: Timestamp,
    ) -> Result<VaultCreated> {
        self.execute("create_vault", now, |ledger| {
            if params.max_makers == 0 || params.max_takers == 0 {
                return Err(LedgerError::InvalidQuantity(
                    "vault capacity must be at least one on each side".to_string(),
                ));
            }
            let terms = LotTerms::new(&series, params.lot_size)?;

            let mut tx = Transaction::new();
            let (factory_key, mut factory) = ledger.factory_or_new(&mut tx, &series, now)?;
            if factory.matured {
                return Err(LedgerError::FactoryMatured);
            }
            if ledger.params().is_frozen(series.maturity, now) {
                return Err(LedgerError::FrozenPeriod {
                    freeze_seconds: ledger.params().freeze_seconds,
                });
            }

            let vault_id = factory.next_vault_id;
            factory.next_vault_id += 1;
            let vault_key = vault_address(&factory_key, vault_id);
            if ledger.arena().contains(&vault_key) {
                return Err(LedgerError::AlreadyExists(vault_key));
            }
            let mut vault = Vault::new(factory_key, vault_id, &params);
            tx.emit(EventKind::VaultCreated {
                factory: factory_key,
                vault: vault_key,
                vault_id,
                lot_size: params.lot_size,
                max_makers: params.max_makers,
                max_takers: params.max_takers,
            });

            let (maker_key, maker) = enter_maker(
                &mut tx,
                &mut vault,
                vault_key,
                &series,
                &terms,
                signer,
                params.num_lots,
                params.premium_limit,
            )?;
            tx.write(factory_key, factory)
                .write(vault_key, vault)
                .write(maker_key, maker);

            info!(vault = %vault_key, vault_id, series = %series, "Vault created");
            Ok((
                tx,
                VaultCreated {
                    factory: factory_key,
                    vault: vault_key,
                    maker: maker_key,
                    vault_id,
                },
            ))
        })
    }

    /// Enter an existing vault as a maker committing `num_lots` of collateral
    pub fn maker_enter(
        &mut self,
        signer: Signer,
        vault_key: Address,
        num_lots: u64,
        premium_limit: u64,
        now: Timestamp,
    ) -> Result<Address> {
        self.execute("maker_enter", now, |ledger| {
            let ctx = ledger.vault_context(&vault_key)?;
            ledger.check_open(&ctx, now)?;

            let maker_key = maker_address(&vault_key, &signer.key());
            if ledger.arena().contains(&maker_key) {
                return Err(LedgerError::AlreadyEntered {
                    side: Side::Maker,
                    position: maker_key,
                });
            }

            let mut tx = Transaction::new();
            let mut vault = ctx.vault.clone();
            let (maker_key, maker) = enter_maker(
                &mut tx,
                &mut vault,
                vault_key,
                &ctx.factory.series,
                &ctx.terms,
                signer,
                num_lots,
                premium_limit,
            )?;
            tx.write(vault_key, vault).write(maker_key, maker);
            Ok((tx, maker_key))
        })
    }

    /// Resize a maker position to `num_lots`, moving the collateral difference
    pub fn maker_adjust(
        &mut self,
        signer: Signer,
        vault_key: Address,
        num_lots: u64,
        premium_limit: u64,
        now: Timestamp,
    ) -> Result<()> {
        self.execute("maker_adjust", now, |ledger| {
            let ctx = ledger.vault_context(&vault_key)?;
            ledger.check_open(&ctx, now)?;

            let maker_key = maker_address(&vault_key, &signer.key());
            let mut maker = ledger.maker(&maker_key)?.clone();
            let mut vault = ctx.vault.clone();
            let new_qty = ctx.terms.collateral_for_lots(num_lots)?;
            if new_qty < maker.volume_sold {
                return Err(LedgerError::InsufficientUnsoldRemainder {
                    requested: new_qty,
                    volume_sold: maker.volume_sold,
                });
            }

            let collateral = ctx.collateral_asset();
            let mut tx = Transaction::new();
            if new_qty >= maker.quote_asset_qty {
                let added = new_qty - maker.quote_asset_qty;
                tx.transfer(collateral, signer.key(), vault_key, added);
                vault.commit_collateral(added, 0)?;
            } else {
                let removed = maker.quote_asset_qty - new_qty;
                tx.transfer(collateral, vault_key, signer.key(), removed);
                vault.commit_collateral(0, removed)?;
            }
            maker.quote_asset_qty = new_qty;
            maker.premium_limit = premium_limit;
            maker.is_all_sold = ctx.terms.is_all_sold(maker.unsold());

            tx.emit(EventKind::MakerAdjusted {
                vault: vault_key,
                maker: maker_key,
                collateral: new_qty,
                premium_limit,
            })
            .write(vault_key, vault)
            .write(maker_key, maker);
            Ok((tx, ()))
        })
    }

    /// Position changes are refused once the factory matured or inside the
    /// freeze window
    pub fn check_open(&self, ctx: &VaultContext<'_>, now: Timestamp) -> Result<()> {
        if ctx.factory.matured {
            return Err(LedgerError::FactoryMatured);
        }
        if self.params().is_frozen(ctx.factory.maturity(), now) {
            return Err(LedgerError::FrozenPeriod {
                freeze_seconds: self.params().freeze_seconds,
            });
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn enter_maker(
    tx: &mut Transaction,
    vault: &mut Vault,
    vault_key: Address,
    series: &OptionSeries,
    terms: &LotTerms,
    signer: Signer,
    num_lots: u64,
    premium_limit: u64,
) -> Result<(Address, MakerInfo)> {
    if num_lots == 0 {
        return Err(LedgerError::InvalidQuantity("number of lots must be positive".to_string()));
    }
    if vault.is_makers_full || vault.makers_num >= vault.max_makers {
        return Err(LedgerError::CapacityExceeded(Side::Maker));
    }
    let amount = terms.collateral_for_lots(num_lots)?;

    vault.makers_num += 1;
    vault.is_makers_full = vault.makers_num >= vault.max_makers;
    vault.commit_collateral(amount, 0)?;

    let maker_key = maker_address(&vault_key, &signer.key());
    let maker = MakerInfo {
        owner: signer.key(),
        vault: vault_key,
        ord: vault.makers_num,
        quote_asset_qty: amount,
        volume_sold: 0,
        is_all_sold: false,
        is_settled: false,
        premium_limit,
    };

    tx.transfer(series.collateral_asset().mint, signer.key(), vault_key, amount)
        .emit(EventKind::MakerEntered {
            vault: vault_key,
            maker: maker_key,
            owner: signer.key(),
            ord: maker.ord,
            collateral: amount,
            premium_limit,
        });
    Ok((maker_key, maker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture, series_at, usdc, NOW};
    use assert_matches::assert_matches;
    use common::Pubkey;

    #[test]
    fn test_create_vault_enters_creator_as_first_maker() {
        let mut f = fixture();
        let created = f.create_vault("alice", 100).unwrap();
        assert_eq!(created.vault_id, 1);

        let vault = f.ledger.vault(&created.vault).unwrap();
        assert_eq!(vault.makers_num, 1);
        assert_eq!(vault.makers_total_pending_sell, 2_500_000_000);
        assert_eq!(vault.makers_total_pending_settle, 2_500_000_000);

        let maker = f.ledger.maker(&created.maker).unwrap();
        assert_eq!(maker.ord, 1);
        assert_eq!(f.ledger.balance(usdc(), created.vault), 2_500_000_000);
        assert_eq!(f.ledger.next_vault_id(f.series, NOW).unwrap(), 2);
        assert_eq!(f.ledger.factory(&created.factory).unwrap().next_vault_id, 3);
    }

    #[test]
    fn test_factory_rejects_duplicate_and_bad_maturity() {
        let mut f = fixture();
        f.ledger.create_vault_factory(f.series, NOW).unwrap();
        assert_matches!(
            f.ledger.create_vault_factory(f.series, NOW),
            Err(LedgerError::AlreadyExists(_))
        );
        assert_matches!(
            f.ledger.create_vault_factory(series_at(NOW + 1800), NOW),
            Err(LedgerError::InvalidMaturity { .. })
        );
        assert_matches!(
            f.ledger.create_vault_factory(series_at(NOW + 31 * 86_400), NOW),
            Err(LedgerError::InvalidMaturity { .. })
        );
        let mut zero = series_at(NOW + 86_400);
        zero.strike = 0;
        assert_matches!(f.ledger.create_vault_factory(zero, NOW), Err(LedgerError::InvalidStrike));
    }

    #[test]
    fn test_maker_capacity_and_ords() {
        let mut f = fixture();
        let created = f.create_vault("alice", 10).unwrap();
        f.ledger
            .maker_enter(f.signer("bob"), created.vault, 5, 0, NOW)
            .unwrap();
        f.ledger
            .maker_enter(f.signer("carol"), created.vault, 5, 0, NOW)
            .unwrap();
        assert_matches!(
            f.ledger.maker_enter(f.signer("dave"), created.vault, 5, 0, NOW),
            Err(LedgerError::CapacityExceeded(Side::Maker))
        );

        let ords: Vec<u16> = f
            .ledger
            .makers_in_vault(&created.vault)
            .iter()
            .map(|(_, m)| m.ord)
            .collect();
        assert_eq!(ords, vec![1, 2, 3]);
        assert!(f.ledger.vault(&created.vault).unwrap().is_makers_full);
    }

    #[test]
    fn test_maker_cannot_enter_twice_or_with_zero_lots() {
        let mut f = fixture();
        let created = f.create_vault("alice", 10).unwrap();
        assert_matches!(
            f.ledger.maker_enter(f.signer("alice"), created.vault, 1, 0, NOW),
            Err(LedgerError::AlreadyEntered { side: Side::Maker, .. })
        );
        assert_matches!(
            f.ledger.maker_enter(f.signer("bob"), created.vault, 0, 0, NOW),
            Err(LedgerError::InvalidQuantity(_))
        );
    }

    #[test]
    fn test_maker_enter_refused_in_freeze_window() {
        let mut f = fixture();
        let created = f.create_vault("alice", 10).unwrap();
        let late = f.series.maturity - 1800;
        assert_matches!(
            f.ledger.maker_enter(f.signer("bob"), created.vault, 1, 0, late),
            Err(LedgerError::FrozenPeriod { .. })
        );
    }

    #[test]
    fn test_failed_transfer_leaves_state_untouched() {
        let mut f = fixture();
        let created = f.create_vault("alice", 10).unwrap();
        let broke = Signer::new(Pubkey::named("broke"));
        let events_before = f.ledger.events().len();
        assert_matches!(
            f.ledger.maker_enter(broke, created.vault, 1, 0, NOW),
            Err(LedgerError::Transfer(_))
        );
        assert_eq!(f.ledger.vault(&created.vault).unwrap().makers_num, 1);
        assert_eq!(f.ledger.events().len(), events_before);
    }

    #[test]
    fn test_maker_adjust_moves_collateral_both_ways() {
        let mut f = fixture();
        let created = f.create_vault("alice", 100).unwrap();
        let alice = f.signer("alice");
        let before = f.ledger.balance(usdc(), alice.key());

        f.ledger.maker_adjust(alice, created.vault, 40, 7, NOW).unwrap();
        let vault = f.ledger.vault(&created.vault).unwrap();
        assert_eq!(vault.makers_total_pending_sell, 1_000_000_000);
        assert_eq!(f.ledger.balance(usdc(), alice.key()), before + 1_500_000_000);
        assert_eq!(f.ledger.maker(&created.maker).unwrap().premium_limit, 7);

        f.ledger.maker_adjust(alice, created.vault, 120, 7, NOW).unwrap();
        let vault = f.ledger.vault(&created.vault).unwrap();
        assert_eq!(vault.makers_total_pending_settle, 3_000_000_000);
        assert_eq!(f.ledger.balance(usdc(), created.vault), 3_000_000_000);
    }
}
