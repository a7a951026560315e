//! Events appended to the ledger log on every committed operation.
//!
//! The log is the audit trail: replaying a script and comparing the
//! emitted events is how runs are checked for determinism.

use common::{Address, OptionSeries, Pubkey, Timestamp};
use serde::{Deserialize, Serialize};

use crate::accounts::{SettleResult, TicketKind};
use crate::error::Side;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub sequence: u64,
    pub at: Timestamp,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    FactoryCreated {
        factory: Address,
        series: OptionSeries,
    },

    VaultCreated {
        factory: Address,
        vault: Address,
        vault_id: u64,
        lot_size: i8,
        max_makers: u16,
        max_takers: u16,
    },

    MakerEntered {
        vault: Address,
        maker: Address,
        owner: Pubkey,
        ord: u16,
        collateral: u64,
        premium_limit: u64,
    },

    MakerAdjusted {
        vault: Address,
        maker: Address,
        collateral: u64,
        premium_limit: u64,
    },

    TakerEntered {
        vault: Address,
        taker: Address,
        owner: Pubkey,
        ord: u16,
    },

    TakerFunded {
        vault: Address,
        taker: Address,
        deposited: u64,
    },

    /// One maker's share of a taker buy
    LotsBought {
        vault: Address,
        taker: Address,
        maker: Address,
        lots: u64,
        premium: u64,
        protocol_fee: u64,
        frontend_fee: u64,
    },

    TicketIssued {
        factory: Address,
        requester: Pubkey,
        ticket_kind: TicketKind,
        generation: u64,
    },

    TicketConsumed {
        factory: Address,
        requester: Pubkey,
        ticket_kind: TicketKind,
        generation: u64,
    },

    FairPriceUpdated {
        factory: Address,
        price: u64,
    },

    SettlePriceSet {
        factory: Address,
        price: u64,
    },

    PositionSettled {
        vault: Address,
        position: Address,
        side: Side,
        result: SettleResult,
        base_amount: u64,
        quote_amount: u64,
    },

    EmergencyModeActivated {
        factory: Address,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::FactoryCreated { .. } => "factory_created",
            EventKind::VaultCreated { .. } => "vault_created",
            EventKind::MakerEntered { .. } => "maker_entered",
            EventKind::MakerAdjusted { .. } => "maker_adjusted",
            EventKind::TakerEntered { .. } => "taker_entered",
            EventKind::TakerFunded { .. } => "taker_funded",
            EventKind::LotsBought { .. } => "lots_bought",
            EventKind::TicketIssued { .. } => "ticket_issued",
            EventKind::TicketConsumed { .. } => "ticket_consumed",
            EventKind::FairPriceUpdated { .. } => "fair_price_updated",
            EventKind::SettlePriceSet { .. } => "settle_price_set",
            EventKind::PositionSettled { .. } => "position_settled",
            EventKind::EmergencyModeActivated { .. } => "emergency_mode_activated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_flat_with_type_tag() {
        let event = LedgerEvent {
            sequence: 3,
            at: 100,
            kind: EventKind::FairPriceUpdated {
                factory: Pubkey::named("factory"),
                price: 42,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "fair_price_updated");
        assert_eq!(json["sequence"], 3);
        assert_eq!(json["price"], 42);

        let back: LedgerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
