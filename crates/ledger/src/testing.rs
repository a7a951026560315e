//! Scenario fixtures shared by the ledger's tests and its dependents.
//!
//! The reference series is a BTC/USDC put struck at 25,000 USDC with a lot
//! of 0.001 BTC, so one lot is worth 25 USDC of collateral.

use common::address::{maker_address, taker_address};
use common::{Address, Asset, OptionKind, OptionSeries, Pubkey, Timestamp};

use crate::accounts::VaultParams;
use crate::auth::{OracleCredential, Signer};
use crate::bank::InMemoryBank;
use crate::ledger::Ledger;
use crate::maker::VaultCreated;
use crate::params::LedgerParams;
use crate::Result;

pub const NOW: Timestamp = 1_700_000_040;
pub const STRIKE: u64 = 25_000_000_000;
pub const LOT_SIZE: i8 = -3;

/// Participants funded by [`fixture`]
pub const PARTICIPANTS: &[&str] = &[
    "alice", "bob", "carol", "dave", "erin", "frank", "tom", "tina", "tim", "tess", "frontend",
];

pub fn btc() -> Pubkey {
    Pubkey::named("BTC")
}

pub fn usdc() -> Pubkey {
    Pubkey::named("USDC")
}

/// Asset ticket fees are paid in
pub fn native() -> Pubkey {
    LedgerParams::default().fee_asset
}

pub fn series_at(maturity: Timestamp) -> OptionSeries {
    OptionSeries {
        base: Asset::new(btc(), 8),
        quote: Asset::new(usdc(), 6),
        maturity,
        strike: STRIKE,
        kind: OptionKind::Put,
    }
}

pub fn maker_of(created: &VaultCreated, owner: &str) -> Address {
    maker_address(&created.vault, &Pubkey::named(owner))
}

pub fn taker_of(created: &VaultCreated, owner: &str) -> Address {
    taker_address(&created.vault, &Pubkey::named(owner))
}

pub struct Fixture {
    pub ledger: Ledger,
    pub series: OptionSeries,
}

pub fn fixture() -> Fixture {
    fixture_with(OptionKind::Put)
}

pub fn fixture_with(kind: OptionKind) -> Fixture {
    fixture_with_params(kind, LedgerParams::default())
}

pub fn fixture_with_params(kind: OptionKind, params: LedgerParams) -> Fixture {
    let mut bank = InMemoryBank::new();
    for name in PARTICIPANTS {
        let owner = Pubkey::named(name);
        bank.mint(usdc(), owner, 1_000_000_000_000);
        bank.mint(btc(), owner, 100_000_000_000);
        bank.mint(native(), owner, 1_000_000_000);
    }
    let mut series = series_at(NOW + 7 * 86_400);
    series.kind = kind;
    Fixture {
        ledger: Ledger::new(params, Box::new(bank)),
        series,
    }
}

impl Fixture {
    pub fn signer(&self, name: &str) -> Signer {
        Signer::new(Pubkey::named(name))
    }

    pub fn oracle(&self) -> OracleCredential {
        OracleCredential::new(self.ledger.params().oracle_key)
    }

    pub fn vault_params(num_lots: u64, premium_limit: u64) -> VaultParams {
        VaultParams {
            lot_size: LOT_SIZE,
            max_makers: 3,
            max_takers: 3,
            num_lots,
            premium_limit,
        }
    }

    /// Vault of the fixture series with `owner` as first maker
    pub fn create_vault(&mut self, owner: &str, num_lots: u64) -> Result<VaultCreated> {
        let signer = self.signer(owner);
        self.ledger
            .create_vault(signer, self.series, Self::vault_params(num_lots, 0), NOW)
    }

    /// Write a fair price through a ticket issued by a dedicated requester
    pub fn set_fair_price(&mut self, created: &VaultCreated, price: u64, now: Timestamp) {
        let requester = self.signer("frontend");
        let oracle = self.oracle();
        self.ledger
            .issue_fair_price_ticket(requester, created.factory, now)
            .expect("issue fair price ticket");
        self.ledger
            .consume_fair_price_ticket(oracle, created.factory, requester.key(), price, now)
            .expect("consume fair price ticket");
    }

    /// Set the settlement price one minute after maturity
    pub fn settle(&mut self, created: &VaultCreated, price: u64) {
        let requester = self.signer("frontend");
        let oracle = self.oracle();
        let after = self.series.maturity + 60;
        self.ledger
            .issue_settle_ticket(requester, created.factory, after)
            .expect("issue settle ticket");
        self.ledger
            .consume_settle_ticket(oracle, created.factory, requester.key(), price, after)
            .expect("consume settle ticket");
    }
}
