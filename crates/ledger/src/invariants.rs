//! Aggregate consistency checks for a vault.
//!
//! Settled positions keep their fields, so they stay in every sum.

use common::Address;
use thiserror::Error;

use crate::ledger::Ledger;
use crate::Result as LedgerResult;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("{field}: aggregate {aggregate} != sum over positions {sum}")]
    SumMismatch {
        field: &'static str,
        aggregate: u64,
        sum: u64,
    },

    #[error("{side} ords {ords:?} are not 1..={count}")]
    OrdGap {
        side: &'static str,
        ords: Vec<u16>,
        count: u16,
    },

    #[error("maker ord {ord} sold {volume_sold} of {committed}")]
    Oversold { ord: u16, volume_sold: u64, committed: u64 },

    #[error("taker ord {ord} deposited {deposited} above its maximum {max}")]
    OverDeposited { ord: u16, deposited: u64, max: u64 },

    #[error("{side} full flag is {flag} with {count} of {max} positions")]
    CapacityFlag {
        side: &'static str,
        flag: bool,
        count: u16,
        max: u16,
    },
}

/// Every aggregate invariant of `vault` that does not hold
pub fn check_vault_invariants(ledger: &Ledger, vault_key: &Address) -> LedgerResult<Vec<InvariantViolation>> {
    let vault = ledger.vault(vault_key)?;
    let makers = ledger.makers_in_vault(vault_key);
    let takers = ledger.takers_in_vault(vault_key);
    let mut violations = Vec::new();

    let mut check_sum = |field: &'static str, aggregate: u64, sum: u64| {
        if aggregate != sum {
            violations.push(InvariantViolation::SumMismatch { field, aggregate, sum });
        }
    };
    check_sum(
        "makers_total_pending_sell",
        vault.makers_total_pending_sell,
        makers.iter().map(|(_, m)| m.quote_asset_qty - m.volume_sold.min(m.quote_asset_qty)).sum(),
    );
    check_sum(
        "makers_total_pending_settle",
        vault.makers_total_pending_settle,
        makers.iter().map(|(_, m)| m.quote_asset_qty).sum(),
    );
    check_sum(
        "takers_total_deposited",
        vault.takers_total_deposited,
        takers.iter().map(|(_, t)| t.qty_deposited).sum(),
    );

    let maker_ords: Vec<u16> = makers.iter().map(|(_, m)| m.ord).collect();
    if !is_gapless(&maker_ords, vault.makers_num) {
        violations.push(InvariantViolation::OrdGap {
            side: "maker",
            ords: maker_ords,
            count: vault.makers_num,
        });
    }
    let taker_ords: Vec<u16> = takers.iter().map(|(_, t)| t.ord).collect();
    if !is_gapless(&taker_ords, vault.takers_num) {
        violations.push(InvariantViolation::OrdGap {
            side: "taker",
            ords: taker_ords,
            count: vault.takers_num,
        });
    }

    for (_, maker) in &makers {
        if maker.volume_sold > maker.quote_asset_qty {
            violations.push(InvariantViolation::Oversold {
                ord: maker.ord,
                volume_sold: maker.volume_sold,
                committed: maker.quote_asset_qty,
            });
        }
    }
    for (_, taker) in &takers {
        if taker.qty_deposited > taker.max_base_asset {
            violations.push(InvariantViolation::OverDeposited {
                ord: taker.ord,
                deposited: taker.qty_deposited,
                max: taker.max_base_asset,
            });
        }
    }

    for (side, flag, count, max) in [
        ("maker", vault.is_makers_full, vault.makers_num, vault.max_makers),
        ("taker", vault.is_takers_full, vault.takers_num, vault.max_takers),
    ] {
        if flag != (count >= max) {
            violations.push(InvariantViolation::CapacityFlag { side, flag, count, max });
        }
    }

    Ok(violations)
}

fn is_gapless(ords: &[u16], count: u16) -> bool {
    ords.len() == count as usize && ords.iter().zip(1..=count).all(|(ord, expected)| *ord == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture, NOW};

    #[test]
    fn test_invariants_hold_through_maker_and_taker_ops() {
        let mut f = fixture();
        let created = f.create_vault("alice", 100).unwrap();
        f.ledger.maker_enter(f.signer("bob"), created.vault, 30, 5, NOW).unwrap();
        f.ledger.maker_adjust(f.signer("alice"), created.vault, 60, 5, NOW).unwrap();
        f.ledger.taker_enter(f.signer("tom"), created.vault, NOW).unwrap();

        assert_eq!(check_vault_invariants(&f.ledger, &created.vault).unwrap(), vec![]);
    }

    #[test]
    fn test_gapless_ords() {
        assert!(is_gapless(&[1, 2, 3], 3));
        assert!(!is_gapless(&[1, 3], 2));
        assert!(!is_gapless(&[1, 2], 3));
        assert!(is_gapless(&[], 0));
    }
}
