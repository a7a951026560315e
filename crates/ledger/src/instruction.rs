//! Named instructions: the wire form of every mutating operation.
//!
//! Keys are hex encoded. The signer of an instruction is the key the host
//! verified; oracle instructions are signed with the oracle credential.

use common::{Address, OptionSeries, Pubkey};
use serde::{Deserialize, Serialize};

use crate::accounts::VaultParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    CreateVaultFactory {
        series: OptionSeries,
    },
    NextVaultId {
        series: OptionSeries,
    },
    CreateVault {
        signer: Pubkey,
        series: OptionSeries,
        params: VaultParams,
    },
    MakerEnter {
        signer: Pubkey,
        vault: Address,
        num_lots: u64,
        premium_limit: u64,
    },
    MakerAdjust {
        signer: Pubkey,
        vault: Address,
        num_lots: u64,
        premium_limit: u64,
    },
    TakerEnter {
        signer: Pubkey,
        vault: Address,
    },
    TakerAdjustFunding {
        signer: Pubkey,
        vault: Address,
        qty_deposited: u64,
    },
    /// Allocation is computed against `max_fair_price` when executed
    TakerBuy {
        signer: Pubkey,
        vault: Address,
        max_fair_price: u64,
        num_lots: u64,
        #[serde(default)]
        initial_funding: u64,
        frontend: Pubkey,
    },
    IssueFairPriceTicket {
        signer: Pubkey,
        factory: Address,
    },
    IssueSettleTicket {
        signer: Pubkey,
        factory: Address,
    },
    /// Oracle prices the factory's series and consumes the requester's ticket
    UpdateFairPrice {
        factory: Address,
        requester: Pubkey,
    },
    UpdateSettlePrice {
        factory: Address,
        requester: Pubkey,
    },
    /// Oracle writes a price it computed elsewhere
    ConsumeFairPriceTicket {
        factory: Address,
        requester: Pubkey,
        price: u64,
    },
    ConsumeSettleTicket {
        factory: Address,
        requester: Pubkey,
        price: u64,
    },
    ActivateEmergencyMode {
        signer: Pubkey,
        factory: Address,
    },
    MakerSettle {
        vault: Address,
        owner: Pubkey,
    },
    TakerSettle {
        vault: Address,
        owner: Pubkey,
    },
    MakerEmergencyExit {
        signer: Pubkey,
        vault: Address,
    },
    TakerEmergencyExit {
        signer: Pubkey,
        vault: Address,
    },
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::CreateVaultFactory { .. } => "create_vault_factory",
            Instruction::NextVaultId { .. } => "next_vault_id",
            Instruction::CreateVault { .. } => "create_vault",
            Instruction::MakerEnter { .. } => "maker_enter",
            Instruction::MakerAdjust { .. } => "maker_adjust",
            Instruction::TakerEnter { .. } => "taker_enter",
            Instruction::TakerAdjustFunding { .. } => "taker_adjust_funding",
            Instruction::TakerBuy { .. } => "taker_buy",
            Instruction::IssueFairPriceTicket { .. } => "issue_fair_price_ticket",
            Instruction::IssueSettleTicket { .. } => "issue_settle_ticket",
            Instruction::UpdateFairPrice { .. } => "update_fair_price",
            Instruction::UpdateSettlePrice { .. } => "update_settle_price",
            Instruction::ConsumeFairPriceTicket { .. } => "consume_fair_price_ticket",
            Instruction::ConsumeSettleTicket { .. } => "consume_settle_ticket",
            Instruction::ActivateEmergencyMode { .. } => "activate_emergency_mode",
            Instruction::MakerSettle { .. } => "maker_settle",
            Instruction::TakerSettle { .. } => "taker_settle",
            Instruction::MakerEmergencyExit { .. } => "maker_emergency_exit",
            Instruction::TakerEmergencyExit { .. } => "taker_emergency_exit",
        }
    }

    /// Whether only the oracle credential may submit this instruction
    pub fn requires_oracle(&self) -> bool {
        matches!(
            self,
            Instruction::UpdateFairPrice { .. }
                | Instruction::UpdateSettlePrice { .. }
                | Instruction::ConsumeFairPriceTicket { .. }
                | Instruction::ConsumeSettleTicket { .. }
        )
    }
}
