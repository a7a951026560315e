use common::{OptionKind, Pubkey};
use ledger::{SettleResult, Side, Transaction, VaultContext};
use serde::{Deserialize, Serialize};

/// Amounts paid out to a position's owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleOutcome {
    pub base_transfer: u64,
    pub quote_transfer: u64,
    pub result: SettleResult,
}

impl SettleOutcome {
    /// Outcome of paying `collateral` and `funding` for a series of `kind`
    pub(crate) fn from_assets(kind: OptionKind, collateral: u64, funding: u64, result: SettleResult) -> Self {
        let (base_transfer, quote_transfer) = match kind {
            OptionKind::Put => (funding, collateral),
            OptionKind::Call => (collateral, funding),
        };
        Self {
            base_transfer,
            quote_transfer,
            result,
        }
    }

    /// Stage the payout from the vault treasury to `owner`
    pub(crate) fn stage(&self, tx: &mut Transaction, ctx: &VaultContext<'_>, owner: Pubkey) {
        let series = &ctx.factory.series;
        tx.transfer(series.base.mint, ctx.address, owner, self.base_transfer)
            .transfer(series.quote.mint, ctx.address, owner, self.quote_transfer);
    }
}

pub(crate) fn side_name(side: Side) -> &'static str {
    match side {
        Side::Maker => "maker",
        Side::Taker => "taker",
    }
}
