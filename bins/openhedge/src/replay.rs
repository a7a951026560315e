//! Scripted replay against an in-memory ledger.
//!
//! Scripts name participants, assets and vaults by label. Each step is
//! resolved to an [`Instruction`] and dispatched to the ledger, matching,
//! oracle or settlement crate.

use anyhow::{anyhow, bail, Context, Result};
use common::{Address, Asset, OptionKind, OptionSeries, Pubkey, Timestamp};
use config::ProtocolConfig;
use ledger::{
    check_vault_invariants, FairPriceWrite, InMemoryBank, InMemoryLedgerStore, Instruction, Ledger, LedgerParams,
    OracleCredential, SettlePriceWrite, Signer, VaultCreated, VaultParams,
};
use market_data::{Candle, CandleGranularity, InMemoryFeed, OptionPricer};
use matching_engine::{allocate, ceiling_price, taker_buy, BuyOutcome, BuyRequest};
use oracle::{pricing_params, OracleService, SupportedPair, SupportedPairs};
use serde::{Deserialize, Serialize};
use settlement::SettleOutcome;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Asset label to decimals
    pub assets: BTreeMap<String, u8>,
    /// Base/quote labels the oracle prices, on top of the configured pairs
    #[serde(default)]
    pub pairs: Vec<(String, String)>,
    /// Participant label to asset label to minted amount
    #[serde(default)]
    pub balances: BTreeMap<String, BTreeMap<String, u64>>,
    #[serde(default)]
    pub candles: Vec<CandleSet>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandleSet {
    pub asset: String,
    pub granularity: CandleGranularity,
    pub candles: Vec<Candle>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub at: Timestamp,
    #[serde(flatten)]
    pub action: Action,
    /// The step must be rejected
    #[serde(default)]
    pub expect_failure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesSpec {
    pub base: String,
    pub quote: String,
    pub maturity: Timestamp,
    pub strike: u64,
    #[serde(default)]
    pub kind: OptionKind,
}

fn default_frontend() -> String {
    "frontend".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    CreateVaultFactory {
        series: SeriesSpec,
    },
    NextVaultId {
        series: SeriesSpec,
    },
    CreateVault {
        signer: String,
        label: String,
        series: SeriesSpec,
        lot_size: i8,
        max_makers: u16,
        max_takers: u16,
        num_lots: u64,
        premium_limit: u64,
    },
    MakerEnter {
        signer: String,
        vault: String,
        num_lots: u64,
        premium_limit: u64,
    },
    MakerAdjust {
        signer: String,
        vault: String,
        num_lots: u64,
        premium_limit: u64,
    },
    TakerEnter {
        signer: String,
        vault: String,
    },
    TakerAdjustFunding {
        signer: String,
        vault: String,
        qty: u64,
    },
    /// Either `max_fair_price` or `slippage` over the factory's last fair price
    TakerBuy {
        signer: String,
        vault: String,
        num_lots: u64,
        #[serde(default)]
        max_fair_price: Option<u64>,
        #[serde(default)]
        slippage: Option<f64>,
        #[serde(default)]
        initial_funding: u64,
        #[serde(default = "default_frontend")]
        frontend: String,
    },
    IssueFairPriceTicket {
        signer: String,
        vault: String,
    },
    IssueSettleTicket {
        signer: String,
        vault: String,
    },
    UpdateFairPrice {
        vault: String,
        requester: String,
    },
    UpdateSettlePrice {
        vault: String,
        requester: String,
    },
    ConsumeFairPriceTicket {
        vault: String,
        requester: String,
        price: u64,
    },
    ConsumeSettleTicket {
        vault: String,
        requester: String,
        price: u64,
    },
    ActivateEmergencyMode {
        signer: String,
        vault: String,
    },
    MakerSettle {
        vault: String,
        owner: String,
    },
    TakerSettle {
        vault: String,
        owner: String,
    },
    MakerEmergencyExit {
        signer: String,
        vault: String,
    },
    TakerEmergencyExit {
        signer: String,
        vault: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Factory { factory: Address },
    VaultId { vault_id: u64 },
    VaultCreated(VaultCreated),
    Position { position: Address },
    Adjusted,
    Deposited { amount: u64 },
    Bought(BuyOutcome),
    Ticket { generation: u64 },
    FairPrice { price: u64, write: FairPriceWrite },
    SettlePrice { price: u64, write: SettlePriceWrite },
    EmergencyMode,
    Settled(SettleOutcome),
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub at: Timestamp,
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionSummary {
    pub owner: String,
    pub ord: u16,
    pub amount: u64,
    pub filled: u64,
    pub settled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaultSummary {
    pub label: String,
    pub vault: Address,
    pub makers: Vec<PositionSummary>,
    pub takers: Vec<PositionSummary>,
    pub collateral_held: u64,
    pub funding_held: u64,
    pub violations: Vec<String>,
}

pub struct Replay {
    store: InMemoryLedgerStore,
    oracle: OracleService,
    assets: BTreeMap<String, Asset>,
    vaults: BTreeMap<String, VaultCreated>,
    names: HashMap<Pubkey, String>,
}

impl Replay {
    pub fn new(config: &ProtocolConfig, script: &Script) -> Result<Self> {
        let params = LedgerParams::from_config(&config.protocol)?;
        let mut names = HashMap::new();
        let mut key = |label: &str| {
            let pubkey = label_key(label);
            names.insert(pubkey, label.to_string());
            pubkey
        };

        let assets: BTreeMap<String, Asset> = script
            .assets
            .iter()
            .map(|(label, decimals)| (label.clone(), Asset::new(key(label), *decimals)))
            .collect();

        let mut bank = InMemoryBank::new();
        for (participant, balances) in &script.balances {
            let owner = key(participant);
            for (asset, amount) in balances {
                bank.mint(key(asset), owner, *amount);
            }
        }

        let feed = Arc::new(InMemoryFeed::new());
        for set in &script.candles {
            feed.insert(key(&set.asset), set.granularity, set.candles.clone());
        }

        let mut pairs: Vec<SupportedPair> = SupportedPairs::from_config(&config.oracle.supported_pairs)?
            .iter()
            .cloned()
            .collect();
        for (base, quote) in &script.pairs {
            pairs.push(SupportedPair {
                symbol: format!("{}/{}", base, quote),
                base: key(base),
                quote: key(quote),
                feed_address: None,
            });
        }

        let oracle = OracleService::new(
            OptionPricer::new(feed, pricing_params(&config.oracle)),
            SupportedPairs::new(pairs),
            OracleCredential::new(params.oracle_key),
        );
        let ledger = Ledger::new(params, Box::new(bank));
        info!(
            assets = assets.len(),
            participants = script.balances.len(),
            steps = script.steps.len(),
            "Replay initialized"
        );

        Ok(Self {
            store: InMemoryLedgerStore::new(ledger),
            oracle,
            assets,
            vaults: BTreeMap::new(),
            names,
        })
    }

    pub fn store(&self) -> &InMemoryLedgerStore {
        &self.store
    }

    pub fn vault(&self, label: &str) -> Option<&VaultCreated> {
        self.vaults.get(label)
    }

    fn key(&mut self, label: &str) -> Pubkey {
        let pubkey = label_key(label);
        self.names.entry(pubkey).or_insert_with(|| label.to_string());
        pubkey
    }

    fn signer(&mut self, label: &str) -> Signer {
        Signer::new(self.key(label))
    }

    pub fn name_of(&self, key: &Pubkey) -> String {
        self.names.get(key).cloned().unwrap_or_else(|| key.to_hex())
    }

    fn labelled(&self, label: &str) -> Result<VaultCreated> {
        self.vaults
            .get(label)
            .copied()
            .ok_or_else(|| anyhow!("unknown vault label '{}'", label))
    }

    fn series(&self, spec: &SeriesSpec) -> Result<OptionSeries> {
        let asset = |label: &str| {
            self.assets
                .get(label)
                .copied()
                .ok_or_else(|| anyhow!("unknown asset '{}'", label))
        };
        Ok(OptionSeries {
            base: asset(&spec.base)?,
            quote: asset(&spec.quote)?,
            maturity: spec.maturity,
            strike: spec.strike,
            kind: spec.kind,
        })
    }

    /// Translate labels into keys and addresses
    pub async fn resolve(&mut self, action: &Action) -> Result<Instruction> {
        let instruction = match action {
            Action::CreateVaultFactory { series } => Instruction::CreateVaultFactory {
                series: self.series(series)?,
            },
            Action::NextVaultId { series } => Instruction::NextVaultId {
                series: self.series(series)?,
            },
            Action::CreateVault {
                signer,
                series,
                lot_size,
                max_makers,
                max_takers,
                num_lots,
                premium_limit,
                ..
            } => Instruction::CreateVault {
                signer: self.key(signer),
                series: self.series(series)?,
                params: VaultParams {
                    lot_size: *lot_size,
                    max_makers: *max_makers,
                    max_takers: *max_takers,
                    num_lots: *num_lots,
                    premium_limit: *premium_limit,
                },
            },
            Action::MakerEnter {
                signer,
                vault,
                num_lots,
                premium_limit,
            } => Instruction::MakerEnter {
                signer: self.key(signer),
                vault: self.labelled(vault)?.vault,
                num_lots: *num_lots,
                premium_limit: *premium_limit,
            },
            Action::MakerAdjust {
                signer,
                vault,
                num_lots,
                premium_limit,
            } => Instruction::MakerAdjust {
                signer: self.key(signer),
                vault: self.labelled(vault)?.vault,
                num_lots: *num_lots,
                premium_limit: *premium_limit,
            },
            Action::TakerEnter { signer, vault } => Instruction::TakerEnter {
                signer: self.key(signer),
                vault: self.labelled(vault)?.vault,
            },
            Action::TakerAdjustFunding { signer, vault, qty } => Instruction::TakerAdjustFunding {
                signer: self.key(signer),
                vault: self.labelled(vault)?.vault,
                qty_deposited: *qty,
            },
            Action::TakerBuy {
                signer,
                vault,
                num_lots,
                max_fair_price,
                slippage,
                initial_funding,
                frontend,
            } => {
                let created = self.labelled(vault)?;
                let max_fair_price = match (max_fair_price, slippage) {
                    (Some(price), _) => *price,
                    (None, Some(slippage)) => {
                        let factory = self.store.read().await.factory(&created.factory)?.clone();
                        ceiling_price(factory.last_fair_price as f64, *slippage)?
                    }
                    (None, None) => bail!("taker_buy needs max_fair_price or slippage"),
                };
                Instruction::TakerBuy {
                    signer: self.key(signer),
                    vault: created.vault,
                    max_fair_price,
                    num_lots: *num_lots,
                    initial_funding: *initial_funding,
                    frontend: self.key(frontend),
                }
            }
            Action::IssueFairPriceTicket { signer, vault } => Instruction::IssueFairPriceTicket {
                signer: self.key(signer),
                factory: self.labelled(vault)?.factory,
            },
            Action::IssueSettleTicket { signer, vault } => Instruction::IssueSettleTicket {
                signer: self.key(signer),
                factory: self.labelled(vault)?.factory,
            },
            Action::UpdateFairPrice { vault, requester } => Instruction::UpdateFairPrice {
                factory: self.labelled(vault)?.factory,
                requester: self.key(requester),
            },
            Action::UpdateSettlePrice { vault, requester } => Instruction::UpdateSettlePrice {
                factory: self.labelled(vault)?.factory,
                requester: self.key(requester),
            },
            Action::ConsumeFairPriceTicket {
                vault,
                requester,
                price,
            } => Instruction::ConsumeFairPriceTicket {
                factory: self.labelled(vault)?.factory,
                requester: self.key(requester),
                price: *price,
            },
            Action::ConsumeSettleTicket {
                vault,
                requester,
                price,
            } => Instruction::ConsumeSettleTicket {
                factory: self.labelled(vault)?.factory,
                requester: self.key(requester),
                price: *price,
            },
            Action::ActivateEmergencyMode { signer, vault } => Instruction::ActivateEmergencyMode {
                signer: self.key(signer),
                factory: self.labelled(vault)?.factory,
            },
            Action::MakerSettle { vault, owner } => Instruction::MakerSettle {
                vault: self.labelled(vault)?.vault,
                owner: self.key(owner),
            },
            Action::TakerSettle { vault, owner } => Instruction::TakerSettle {
                vault: self.labelled(vault)?.vault,
                owner: self.key(owner),
            },
            Action::MakerEmergencyExit { signer, vault } => Instruction::MakerEmergencyExit {
                signer: self.key(signer),
                vault: self.labelled(vault)?.vault,
            },
            Action::TakerEmergencyExit { signer, vault } => Instruction::TakerEmergencyExit {
                signer: self.key(signer),
                vault: self.labelled(vault)?.vault,
            },
        };
        Ok(instruction)
    }

    /// Execute one instruction at `now`
    pub async fn dispatch(&self, instruction: Instruction, now: Timestamp) -> Result<Outcome> {
        // Oracle paths lock the store themselves
        match instruction {
            Instruction::UpdateFairPrice { factory, requester } => {
                let update = self
                    .oracle
                    .update_fair_price(&self.store, factory, requester, now)
                    .await?;
                return Ok(Outcome::FairPrice {
                    price: update.quote.price,
                    write: update.write,
                });
            }
            Instruction::UpdateSettlePrice { factory, requester } => {
                let update = self
                    .oracle
                    .update_settle_price(&self.store, factory, requester, now)
                    .await?;
                return Ok(Outcome::SettlePrice {
                    price: update.quote.price,
                    write: update.write,
                });
            }
            _ => {}
        }

        let credential = self.oracle.credential();
        let mut guard = self.store.write().await;
        let ledger = &mut *guard;
        let outcome = match instruction {
            Instruction::CreateVaultFactory { series } => Outcome::Factory {
                factory: ledger.create_vault_factory(series, now)?,
            },
            Instruction::NextVaultId { series } => Outcome::VaultId {
                vault_id: ledger.next_vault_id(series, now)?,
            },
            Instruction::CreateVault {
                signer,
                series,
                params,
            } => Outcome::VaultCreated(ledger.create_vault(Signer::new(signer), series, params, now)?),
            Instruction::MakerEnter {
                signer,
                vault,
                num_lots,
                premium_limit,
            } => Outcome::Position {
                position: ledger.maker_enter(Signer::new(signer), vault, num_lots, premium_limit, now)?,
            },
            Instruction::MakerAdjust {
                signer,
                vault,
                num_lots,
                premium_limit,
            } => {
                ledger.maker_adjust(Signer::new(signer), vault, num_lots, premium_limit, now)?;
                Outcome::Adjusted
            }
            Instruction::TakerEnter { signer, vault } => Outcome::Position {
                position: ledger.taker_enter(Signer::new(signer), vault, now)?,
            },
            Instruction::TakerAdjustFunding {
                signer,
                vault,
                qty_deposited,
            } => Outcome::Deposited {
                amount: ledger.taker_adjust_funding(Signer::new(signer), vault, qty_deposited, now)?,
            },
            Instruction::TakerBuy {
                signer,
                vault,
                max_fair_price,
                num_lots,
                initial_funding,
                frontend,
            } => {
                let allocation = allocate(ledger, &vault, num_lots, max_fair_price)?;
                let request = BuyRequest {
                    vault,
                    max_fair_price,
                    num_lots,
                    initial_funding,
                    frontend,
                };
                Outcome::Bought(taker_buy(ledger, Signer::new(signer), request, &allocation, now)?)
            }
            Instruction::IssueFairPriceTicket { signer, factory } => Outcome::Ticket {
                generation: ledger.issue_fair_price_ticket(Signer::new(signer), factory, now)?,
            },
            Instruction::IssueSettleTicket { signer, factory } => Outcome::Ticket {
                generation: ledger.issue_settle_ticket(Signer::new(signer), factory, now)?,
            },
            Instruction::ConsumeFairPriceTicket {
                factory,
                requester,
                price,
            } => Outcome::FairPrice {
                price,
                write: ledger.consume_fair_price_ticket(credential, factory, requester, price, now)?,
            },
            Instruction::ConsumeSettleTicket {
                factory,
                requester,
                price,
            } => Outcome::SettlePrice {
                price,
                write: ledger.consume_settle_ticket(credential, factory, requester, price, now)?,
            },
            Instruction::ActivateEmergencyMode { signer, factory } => {
                ledger.activate_emergency_mode(Signer::new(signer), factory, now)?;
                Outcome::EmergencyMode
            }
            Instruction::MakerSettle { vault, owner } => {
                Outcome::Settled(settlement::settle_maker(ledger, vault, owner, now)?)
            }
            Instruction::TakerSettle { vault, owner } => {
                Outcome::Settled(settlement::settle_taker(ledger, vault, owner, now)?)
            }
            Instruction::MakerEmergencyExit { signer, vault } => Outcome::Settled(
                settlement::maker_emergency_exit(ledger, Signer::new(signer), vault, now)?,
            ),
            Instruction::TakerEmergencyExit { signer, vault } => Outcome::Settled(
                settlement::taker_emergency_exit(ledger, Signer::new(signer), vault, now)?,
            ),
            Instruction::UpdateFairPrice { .. } | Instruction::UpdateSettlePrice { .. } => {
                bail!("oracle instruction reached the ledger path")
            }
        };
        Ok(outcome)
    }

    /// Run every step in order. A rejection is reported, and fails the run
    /// unless the step expects it.
    pub async fn run(&mut self, steps: &[Step]) -> Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let instruction = self
                .resolve(&step.action)
                .await
                .with_context(|| format!("step {}: cannot resolve", index))?;
            let op = instruction.name();
            debug!(index, op, at = step.at, "Replaying step");

            let report = match self.dispatch(instruction, step.at).await {
                Ok(outcome) => {
                    if step.expect_failure {
                        bail!("step {} ({}) succeeded but was expected to fail", index, op);
                    }
                    if let (Action::CreateVault { label, .. }, Outcome::VaultCreated(created)) = (&step.action, &outcome)
                    {
                        self.vaults.insert(label.clone(), *created);
                    }
                    StepReport {
                        index,
                        at: step.at,
                        op,
                        outcome: Some(outcome),
                        rejected: None,
                    }
                }
                Err(err) if step.expect_failure => StepReport {
                    index,
                    at: step.at,
                    op,
                    outcome: None,
                    rejected: Some(err.to_string()),
                },
                Err(err) => return Err(err.context(format!("step {} ({}) failed", index, op))),
            };
            reports.push(report);
        }
        Ok(reports)
    }

    pub async fn summaries(&self) -> Result<Vec<VaultSummary>> {
        let ledger = self.store.read().await;
        let mut summaries = Vec::with_capacity(self.vaults.len());
        for (label, created) in &self.vaults {
            let ctx = ledger.vault_context(&created.vault)?;
            let makers = ledger
                .makers_in_vault(&created.vault)
                .into_iter()
                .map(|(_, maker)| PositionSummary {
                    owner: self.name_of(&maker.owner),
                    ord: maker.ord,
                    amount: maker.quote_asset_qty,
                    filled: maker.volume_sold,
                    settled: maker.is_settled,
                })
                .collect();
            let takers = ledger
                .takers_in_vault(&created.vault)
                .into_iter()
                .map(|(_, taker)| PositionSummary {
                    owner: self.name_of(&taker.owner),
                    ord: taker.ord,
                    amount: taker.max_base_asset,
                    filled: taker.qty_deposited,
                    settled: taker.is_settled,
                })
                .collect();
            let violations = check_vault_invariants(&ledger, &created.vault)?
                .iter()
                .map(|v| v.to_string())
                .collect();
            summaries.push(VaultSummary {
                label: label.clone(),
                vault: created.vault,
                makers,
                takers,
                collateral_held: ledger.balance(ctx.collateral_asset(), created.vault),
                funding_held: ledger.balance(ctx.funding_asset(), created.vault),
                violations,
            });
        }
        Ok(summaries)
    }
}

/// Labels are either hex keys or names hashed into keys
fn label_key(label: &str) -> Pubkey {
    label.parse().unwrap_or_else(|_| Pubkey::named(label))
}
