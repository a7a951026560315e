//! Maker allocation for a taker buy.
//!
//! Sellers are ranked strictly by entry order. Price only decides
//! eligibility: a maker whose premium limit is above the buyer's ceiling
//! is skipped, never reordered.

use arrayvec::ArrayVec;
use common::Address;
use ledger::{Ledger, TokenAccount};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MatchingError;
use crate::Result;

/// Upper bound on maker positions touched by one buy
pub const MAX_POSITIONS_PER_FILL: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationEntry {
    /// Maker position address
    pub maker: Address,
    /// Where the maker receives the premium
    pub premium_account: TokenAccount,
    pub ord: u16,
    /// Whole lots the position can still sell
    pub available_lots: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    entries: ArrayVec<AllocationEntry, MAX_POSITIONS_PER_FILL>,
    potential_lots: u64,
    requested_lots: u64,
}

impl Allocation {
    pub fn entries(&self) -> &[AllocationEntry] {
        &self.entries
    }

    pub fn potential_lots(&self) -> u64 {
        self.potential_lots
    }

    pub fn requested_lots(&self) -> u64 {
        self.requested_lots
    }

    /// Lots requested beyond what the selected positions can deliver
    pub fn shortfall(&self) -> u64 {
        self.requested_lots.saturating_sub(self.potential_lots)
    }

    pub fn is_partial(&self) -> bool {
        self.shortfall() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn from_entries(entries: &[AllocationEntry], requested_lots: u64) -> Self {
        Self {
            entries: entries.iter().copied().collect(),
            potential_lots: entries.iter().map(|e| e.available_lots).sum(),
            requested_lots,
        }
    }
}

/// Highest premium per whole base unit a buyer accepts:
/// `floor((1 + slippage) * fair_price)`
pub fn ceiling_price(fair_price: f64, slippage: f64) -> Result<u64> {
    if !(slippage > 0.0) || !slippage.is_finite() {
        return Err(MatchingError::validation(format!(
            "slippage tolerance must be positive, got {}",
            slippage
        )));
    }
    if !(fair_price > 0.0) || !fair_price.is_finite() {
        return Err(MatchingError::validation(format!(
            "fair price must be positive, got {}",
            fair_price
        )));
    }
    if fair_price.fract() != 0.0 {
        return Err(MatchingError::validation(format!(
            "fair price must be an integer in quote minor units, got {}",
            fair_price
        )));
    }
    common::units::floor_u64((1.0 + slippage) * fair_price)
        .map_err(|e| MatchingError::validation(e.to_string()))
}

/// Maker positions of `vault` able to sell at or below `max_price`, in entry order
pub fn eligible_sellers(ledger: &Ledger, vault: &Address, max_price: u64) -> Result<Vec<AllocationEntry>> {
    let ctx = ledger.vault_context(vault)?;
    let quote = ctx.factory.series.quote.mint;

    // makers_in_vault is already sorted by ord
    let sellers = ledger
        .makers_in_vault(vault)
        .into_iter()
        .filter(|(_, maker)| !maker.is_all_sold && !maker.is_settled && maker.premium_limit <= max_price)
        .map(|(address, maker)| AllocationEntry {
            maker: address,
            premium_account: TokenAccount::new(quote, maker.owner),
            ord: maker.ord,
            available_lots: ctx.terms.lots_in(maker.unsold()),
        })
        .filter(|entry| entry.available_lots > 0)
        .collect();
    Ok(sellers)
}

/// Select up to [`MAX_POSITIONS_PER_FILL`] sellers covering `requested_lots`
pub fn allocate(ledger: &Ledger, vault: &Address, requested_lots: u64, max_price: u64) -> Result<Allocation> {
    if requested_lots == 0 {
        return Err(ledger::LedgerError::InvalidQuantity("requested lots must be positive".to_string()).into());
    }
    let candidates = eligible_sellers(ledger, vault, max_price)?;
    let allocation = select(&candidates, requested_lots)?;
    debug!(
        vault = %vault,
        requested_lots,
        potential_lots = allocation.potential_lots,
        positions = allocation.len(),
        "Allocated sellers"
    );
    Ok(allocation)
}

/// Greedy walk over `candidates` (sorted by ord).
///
/// When four positions still fall short, the last slot goes to the next
/// candidate if it closes the gap, otherwise to the largest remaining
/// candidate (lowest ord on ties). A maker listed more than once is taken
/// at most once.
pub fn select(candidates: &[AllocationEntry], requested_lots: u64) -> Result<Allocation> {
    if candidates.is_empty() {
        return Err(MatchingError::NoEligibleSellers);
    }

    let mut entries = ArrayVec::<AllocationEntry, MAX_POSITIONS_PER_FILL>::new();
    let mut potential_lots = 0u64;

    for (i, candidate) in candidates.iter().enumerate() {
        if potential_lots >= requested_lots || entries.is_full() {
            break;
        }
        if is_taken(&entries, candidate) {
            continue;
        }
        if entries.len() == MAX_POSITIONS_PER_FILL - 1 {
            let last = if potential_lots.saturating_add(candidate.available_lots) >= requested_lots {
                candidate
            } else {
                largest(&candidates[i..], &entries).unwrap_or(candidate)
            };
            potential_lots = potential_lots.saturating_add(last.available_lots);
            entries.push(*last);
            break;
        }
        potential_lots = potential_lots.saturating_add(candidate.available_lots);
        entries.push(*candidate);
    }

    Ok(Allocation {
        entries,
        potential_lots,
        requested_lots,
    })
}

fn is_taken(entries: &[AllocationEntry], candidate: &AllocationEntry) -> bool {
    entries.iter().any(|entry| entry.maker == candidate.maker)
}

fn largest<'a>(candidates: &'a [AllocationEntry], taken: &[AllocationEntry]) -> Option<&'a AllocationEntry> {
    // max_by_key keeps the last maximum, so walk in reverse to favor low ords
    candidates
        .iter()
        .rev()
        .filter(|entry| !is_taken(taken, entry))
        .max_by_key(|entry| entry.available_lots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use common::Pubkey;
    use ledger::testing::{fixture, NOW};

    fn entry(ord: u16, lots: u64) -> AllocationEntry {
        let maker = Pubkey::named(&format!("maker-{}", ord));
        AllocationEntry {
            maker,
            premium_account: TokenAccount::new(Pubkey::named("USDC"), maker),
            ord,
            available_lots: lots,
        }
    }

    fn ords(allocation: &Allocation) -> Vec<u16> {
        allocation.entries().iter().map(|e| e.ord).collect()
    }

    #[test]
    fn test_ceiling_price() {
        assert_eq!(ceiling_price(250_000.0, 0.05).unwrap(), 262_500);
        assert_matches!(ceiling_price(250_000.0, 0.0), Err(MatchingError::Validation(_)));
        assert_matches!(ceiling_price(0.0, 0.05), Err(MatchingError::Validation(_)));
        assert_matches!(ceiling_price(250_000.5, 0.05), Err(MatchingError::Validation(_)));
    }

    #[test]
    fn test_takes_in_ord_until_covered() {
        let candidates = [entry(1, 100), entry(2, 50), entry(3, 500)];
        let allocation = select(&candidates, 120).unwrap();
        assert_eq!(ords(&allocation), vec![1, 2]);
        assert_eq!(allocation.potential_lots(), 150);
        assert!(!allocation.is_partial());
    }

    #[test]
    fn test_fifth_slot_takes_next_when_it_covers() {
        let candidates: Vec<_> = (1..=7).map(|ord| entry(ord, 10)).collect();
        let allocation = select(&candidates, 50).unwrap();
        assert_eq!(ords(&allocation), vec![1, 2, 3, 4, 5]);
        assert_eq!(allocation.potential_lots(), 50);
    }

    #[test]
    fn test_fifth_slot_falls_back_to_largest() {
        let candidates = [
            entry(1, 10),
            entry(2, 10),
            entry(3, 10),
            entry(4, 10),
            entry(5, 5),
            entry(6, 300),
            entry(7, 300),
        ];
        let allocation = select(&candidates, 100).unwrap();
        assert_eq!(ords(&allocation), vec![1, 2, 3, 4, 6]);
        assert_eq!(allocation.potential_lots(), 340);
    }

    #[test]
    fn test_cap_reports_partial() {
        let candidates: Vec<_> = (1..=8).map(|ord| entry(ord, 10)).collect();
        let allocation = select(&candidates, 100).unwrap();
        assert_eq!(allocation.len(), MAX_POSITIONS_PER_FILL);
        assert_eq!(allocation.shortfall(), 50);
        assert!(allocation.is_partial());
    }

    #[test]
    fn test_repeated_maker_taken_once() {
        let candidates = [entry(1, 10), entry(1, 10), entry(2, 10), entry(1, 10)];
        let allocation = select(&candidates, 30).unwrap();
        assert_eq!(ords(&allocation), vec![1, 2]);
        assert_eq!(allocation.potential_lots(), 20);
        assert!(allocation.is_partial());
    }

    #[test]
    fn test_no_candidates() {
        assert_matches!(select(&[], 10), Err(MatchingError::NoEligibleSellers));
    }

    #[test]
    fn test_time_priority_scenario() {
        let mut f = fixture();
        let created = f
            .ledger
            .create_vault(
                f.signer("alice"),
                f.series,
                ledger::testing::Fixture::vault_params(1000, 250_000),
                NOW,
            )
            .unwrap();
        f.ledger
            .maker_enter(f.signer("bob"), created.vault, 500, 250_000, NOW)
            .unwrap();
        let ceiling = ceiling_price(250_000.0, 0.05).unwrap();

        let sellers = eligible_sellers(&f.ledger, &created.vault, ceiling).unwrap();
        let owners: Vec<_> = sellers.iter().map(|s| s.premium_account.owner).collect();
        assert_eq!(owners, vec![Pubkey::named("alice"), Pubkey::named("bob")]);
        assert_eq!(sellers[0].available_lots, 1000);
        assert_eq!(sellers[1].available_lots, 500);

        // A alone covers 600 lots
        let allocation = allocate(&f.ledger, &created.vault, 600, ceiling).unwrap();
        assert_eq!(ords(&allocation), vec![1]);
        // B is drawn on once A is exhausted
        let allocation = allocate(&f.ledger, &created.vault, 1200, ceiling).unwrap();
        assert_eq!(ords(&allocation), vec![1, 2]);
        assert_eq!(allocation.potential_lots(), 1500);
    }

    #[test]
    fn test_premium_limit_boundary_is_inclusive() {
        let mut f = fixture();
        let created = f
            .ledger
            .create_vault(
                f.signer("alice"),
                f.series,
                ledger::testing::Fixture::vault_params(10, 150_000),
                NOW,
            )
            .unwrap();
        f.ledger
            .maker_enter(f.signer("bob"), created.vault, 10, 250_000, NOW)
            .unwrap();

        assert_eq!(eligible_sellers(&f.ledger, &created.vault, 249_999).unwrap().len(), 1);
        assert_eq!(eligible_sellers(&f.ledger, &created.vault, 250_000).unwrap().len(), 2);
        assert_matches!(
            allocate(&f.ledger, &created.vault, 5, 100_000),
            Err(MatchingError::NoEligibleSellers)
        );
        assert_matches!(
            allocate(&f.ledger, &created.vault, 0, 250_000),
            Err(MatchingError::Ledger(ledger::LedgerError::InvalidQuantity(_)))
        );
    }
}
