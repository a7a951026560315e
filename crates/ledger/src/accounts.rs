//! Account types stored in the ledger arena.

use common::units::{ceil_u64, floor_u64, pow10};
use common::{Address, OptionKind, OptionSeries, Pubkey, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Registry for one option series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultFactory {
    pub series: OptionSeries,
    pub is_initialized: bool,
    /// Id the next vault of this series receives; starts at 1
    pub next_vault_id: u64,
    pub matured: bool,
    pub last_fair_price: u64,
    pub ts_last_fair_price: Timestamp,
    pub settled_price: u64,
    pub emergency_mode: bool,
}

impl VaultFactory {
    pub fn new(series: OptionSeries) -> Self {
        Self {
            series,
            is_initialized: true,
            next_vault_id: 1,
            matured: false,
            last_fair_price: 0,
            ts_last_fair_price: 0,
            settled_price: 0,
            emergency_mode: false,
        }
    }

    pub fn maturity(&self) -> Timestamp {
        self.series.maturity
    }

    pub fn strike(&self) -> u64 {
        self.series.strike
    }

    pub fn kind(&self) -> OptionKind {
        self.series.kind
    }

    /// Whether the settlement price exercises the option
    pub fn is_exercised(&self) -> bool {
        self.series.kind.is_exercised(self.series.strike, self.settled_price)
    }
}

/// A capacity-bounded pool of maker and taker positions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vault {
    pub factory: Address,
    pub ord: u64,
    /// A lot is `10^lot_size` whole base units
    pub lot_size: i8,
    pub max_makers: u16,
    pub max_takers: u16,
    pub makers_num: u16,
    pub takers_num: u16,
    /// Collateral committed by makers and not yet sold
    pub makers_total_pending_sell: u64,
    /// Collateral committed by makers, sold or not
    pub makers_total_pending_settle: u64,
    /// Funding deposited by takers
    pub takers_total_deposited: u64,
    pub is_makers_full: bool,
    pub is_takers_full: bool,
    /// Unexercised collateral already handed back to makers at settlement
    pub bonus_not_exercised: u64,
}

impl Vault {
    pub fn new(factory: Address, ord: u64, params: &VaultParams) -> Self {
        Self {
            factory,
            ord,
            lot_size: params.lot_size,
            max_makers: params.max_makers,
            max_takers: params.max_takers,
            makers_num: 0,
            takers_num: 0,
            makers_total_pending_sell: 0,
            makers_total_pending_settle: 0,
            takers_total_deposited: 0,
            is_makers_full: false,
            is_takers_full: false,
            bonus_not_exercised: 0,
        }
    }

    /// Collateral sold to takers across all makers
    pub fn total_sold(&self) -> u64 {
        self.makers_total_pending_settle
            .saturating_sub(self.makers_total_pending_sell)
    }

    /// Maker collateral committed or withdrawn unsold
    pub fn commit_collateral(&mut self, added: u64, removed: u64) -> Result<()> {
        let pending_sell = checked_apply(self.makers_total_pending_sell, added, removed, "pending sell")?;
        let pending_settle = checked_apply(self.makers_total_pending_settle, added, removed, "pending settle")?;
        self.makers_total_pending_sell = pending_sell;
        self.makers_total_pending_settle = pending_settle;
        Ok(())
    }

    /// Collateral moved from unsold to sold
    pub fn sell_collateral(&mut self, sold: u64) -> Result<()> {
        self.makers_total_pending_sell = checked_apply(self.makers_total_pending_sell, 0, sold, "pending sell")?;
        Ok(())
    }

    pub fn adjust_deposits(&mut self, added: u64, removed: u64) -> Result<()> {
        self.takers_total_deposited = checked_apply(self.takers_total_deposited, added, removed, "taker deposits")?;
        Ok(())
    }
}

fn checked_apply(value: u64, added: u64, removed: u64, what: &str) -> Result<u64> {
    value
        .checked_add(added)
        .and_then(|v| v.checked_sub(removed))
        .ok_or_else(|| LedgerError::Arithmetic(format!("vault {} out of range", what)))
}

/// Parameters chosen by the maker who creates a vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultParams {
    pub lot_size: i8,
    pub max_makers: u16,
    pub max_takers: u16,
    pub num_lots: u64,
    pub premium_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakerInfo {
    pub owner: Pubkey,
    pub vault: Address,
    /// Entry order within the vault, starting at 1
    pub ord: u16,
    /// Committed collateral
    pub quote_asset_qty: u64,
    pub volume_sold: u64,
    pub is_all_sold: bool,
    pub is_settled: bool,
    /// Minimum premium per whole base unit the maker accepts
    pub premium_limit: u64,
}

impl MakerInfo {
    pub fn unsold(&self) -> u64 {
        self.quote_asset_qty - self.volume_sold
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakerInfo {
    pub owner: Pubkey,
    pub vault: Address,
    pub ord: u16,
    /// Funding the taker must deposit to fully exercise what they bought
    pub max_base_asset: u64,
    pub qty_deposited: u64,
    pub is_settled: bool,
}

impl TakerInfo {
    pub fn missing_funding(&self) -> u64 {
        self.max_base_asset.saturating_sub(self.qty_deposited)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    FairPrice,
    Settle,
}

impl TicketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketKind::FairPrice => "fair_price",
            TicketKind::Settle => "settle",
        }
    }
}

/// Lifecycle of one ticket generation. A ticket with no account is unissued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TicketState {
    Issued {
        issuer: Pubkey,
        /// The only key allowed to consume the ticket
        consumer: Pubkey,
        issued_at: Timestamp,
    },
    Consumed {
        consumed_at: Timestamp,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleTicket {
    pub factory: Address,
    pub requester: Pubkey,
    pub kind: TicketKind,
    /// Incremented each time the ticket is issued again after consumption
    pub generation: u64,
    pub state: TicketState,
}

impl OracleTicket {
    pub fn is_used(&self) -> bool {
        matches!(self.state, TicketState::Consumed { .. })
    }
}

/// Outcome of settling or exiting a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleResult {
    NotExercised,
    PartiallyExercised,
    FullyExercised,
    EmergencyExit,
}

impl SettleResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettleResult::NotExercised => "not_exercised",
            SettleResult::PartiallyExercised => "partially_exercised",
            SettleResult::FullyExercised => "fully_exercised",
            SettleResult::EmergencyExit => "emergency_exit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Account {
    Factory(VaultFactory),
    Vault(Vault),
    Maker(MakerInfo),
    Taker(TakerInfo),
    Ticket(OracleTicket),
}

impl Account {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Account::Factory(_) => "vault factory",
            Account::Vault(_) => "vault",
            Account::Maker(_) => "maker position",
            Account::Taker(_) => "taker position",
            Account::Ticket(_) => "oracle ticket",
        }
    }
}

macro_rules! impl_account_variant {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Account {
            fn from(value: $ty) -> Self {
                Account::$variant(value)
            }
        }
    };
}

impl_account_variant!(VaultFactory, Factory);
impl_account_variant!(Vault, Vault);
impl_account_variant!(MakerInfo, Maker);
impl_account_variant!(TakerInfo, Taker);
impl_account_variant!(OracleTicket, Ticket);

/// Lot arithmetic for one vault of one series
///
/// Collateral is quote units for puts and base units for calls; funding is
/// the other asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LotTerms {
    pub kind: OptionKind,
    pub strike: f64,
    pub base_unit: f64,
    /// Whole base units per lot
    pub lot_multiplier: f64,
    /// Collateral per lot
    pub lot_value: f64,
    pub rounded_lot_value: u64,
    /// Funding per lot
    pub exposure_per_lot: f64,
}

impl LotTerms {
    pub fn new(series: &OptionSeries, lot_size: i8) -> Result<Self> {
        if !(-18..=18).contains(&lot_size) {
            return Err(LedgerError::InvalidLotSize(lot_size));
        }
        let lot_multiplier = pow10(lot_size as i32);
        let base_unit = pow10(series.base.decimals as i32);
        let strike = series.strike as f64;
        let (lot_value, exposure_per_lot) = match series.kind {
            OptionKind::Put => (lot_multiplier * strike, lot_multiplier * base_unit),
            OptionKind::Call => (lot_multiplier * base_unit, lot_multiplier * strike),
        };
        let rounded_lot_value = ceil_u64(lot_value)?;
        if rounded_lot_value == 0 {
            return Err(LedgerError::InvalidLotSize(lot_size));
        }
        Ok(Self {
            kind: series.kind,
            strike,
            base_unit,
            lot_multiplier,
            lot_value,
            rounded_lot_value,
            exposure_per_lot,
        })
    }

    /// Collateral required for `num_lots`
    pub fn collateral_for_lots(&self, num_lots: u64) -> Result<u64> {
        Ok(ceil_u64(num_lots as f64 * self.lot_value)?)
    }

    /// Whole lots `collateral` can still back
    pub fn lots_in(&self, collateral: u64) -> u64 {
        collateral / self.rounded_lot_value
    }

    /// Funding a taker must hold to exercise `num_lots`
    pub fn funding_for_lots(&self, num_lots: u64) -> Result<u64> {
        Ok(ceil_u64(num_lots as f64 * self.exposure_per_lot)?)
    }

    /// Collateral a taker receives on exercise for `funding`
    pub fn collateral_for_funding(&self, funding: u64) -> Result<u64> {
        let value = match self.kind {
            OptionKind::Put => funding as f64 / self.base_unit * self.strike,
            OptionKind::Call => funding as f64 / self.strike * self.base_unit,
        };
        Ok(floor_u64(value)?)
    }

    /// Funding a maker receives on exercise for `collateral`
    pub fn funding_for_collateral(&self, collateral: u64) -> Result<u64> {
        let value = match self.kind {
            OptionKind::Put => collateral as f64 / self.strike * self.base_unit,
            OptionKind::Call => collateral as f64 / self.base_unit * self.strike,
        };
        Ok(floor_u64(value)?)
    }

    /// Whether an unsold remainder can no longer back a whole lot
    pub fn is_all_sold(&self, unsold: u64) -> bool {
        unsold < self.rounded_lot_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use common::Asset;

    #[test]
    fn test_vault_aggregates_are_checked() {
        let params = VaultParams {
            lot_size: -3,
            max_makers: 3,
            max_takers: 3,
            num_lots: 1,
            premium_limit: 0,
        };
        let mut vault = Vault::new(Pubkey::named("factory"), 1, &params);
        vault.commit_collateral(100, 0).unwrap();
        vault.sell_collateral(40).unwrap();
        assert_eq!(vault.total_sold(), 40);

        assert_matches!(vault.sell_collateral(61), Err(LedgerError::Arithmetic(_)));
        assert_matches!(vault.commit_collateral(u64::MAX, 0), Err(LedgerError::Arithmetic(_)));
        assert_matches!(vault.adjust_deposits(0, 1), Err(LedgerError::Arithmetic(_)));
        // a failed update leaves the aggregates as they were
        assert_eq!(vault.makers_total_pending_sell, 60);
        assert_eq!(vault.makers_total_pending_settle, 100);
    }

    fn series(kind: OptionKind) -> OptionSeries {
        OptionSeries {
            base: Asset::new(Pubkey::named("BTC"), 8),
            quote: Asset::new(Pubkey::named("USDC"), 6),
            maturity: 0,
            strike: 25_000_000_000,
            kind,
        }
    }

    #[test]
    fn test_put_lot_terms() {
        let terms = LotTerms::new(&series(OptionKind::Put), -3).unwrap();
        assert_eq!(terms.rounded_lot_value, 25_000_000);
        assert_eq!(terms.collateral_for_lots(1000).unwrap(), 25_000_000_000);
        assert_eq!(terms.lots_in(25_000_000_000), 1000);
        // one lot is 0.001 BTC = 100_000 sats
        assert_eq!(terms.funding_for_lots(600).unwrap(), 60_000_000);
        assert_eq!(terms.collateral_for_funding(60_000_000).unwrap(), 15_000_000_000);
        assert_eq!(terms.funding_for_collateral(15_000_000_000).unwrap(), 60_000_000);
    }

    #[test]
    fn test_call_lot_terms_swap_assets() {
        let terms = LotTerms::new(&series(OptionKind::Call), -3).unwrap();
        assert_eq!(terms.rounded_lot_value, 100_000);
        assert_eq!(terms.funding_for_lots(10).unwrap(), 250_000_000);
        assert_eq!(terms.collateral_for_funding(250_000_000).unwrap(), 1_000_000);
    }

    #[test]
    fn test_lot_size_bounds() {
        assert!(matches!(
            LotTerms::new(&series(OptionKind::Put), 19),
            Err(LedgerError::InvalidLotSize(19))
        ));
        assert!(LotTerms::new(&series(OptionKind::Put), -18).is_ok());
    }

    #[test]
    fn test_all_sold_threshold() {
        let terms = LotTerms::new(&series(OptionKind::Put), -3).unwrap();
        assert!(terms.is_all_sold(24_999_999));
        assert!(!terms.is_all_sold(25_000_000));
    }
}
