//! The oracle answers tickets.
//!
//! A requester pays for a ticket on the ledger; the oracle prices the
//! ticket's factory off-ledger and consumes the ticket with the result.
//! Only the holder of the oracle credential can consume.

use common::{Address, Pubkey, Timestamp};
use config::{OracleSection, ProtocolConfig};
use ledger::{EventKind, FairPriceWrite, LedgerStore, OracleCredential, SettlePriceWrite, TicketKind};
use market_data::{FairPriceQuote, OptionPricer, PriceFeed, PricingParams, SettlePriceQuote};
use observability::ProtocolMetrics;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::OracleError;
use crate::pairs::SupportedPairs;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairPriceUpdate {
    pub quote: FairPriceQuote,
    pub write: FairPriceWrite,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlePriceUpdate {
    pub quote: SettlePriceQuote,
    pub write: SettlePriceWrite,
}

/// A ticket the oracle could not answer
#[derive(Debug, Clone, PartialEq)]
pub struct UnansweredTicket {
    pub kind: TicketKind,
    pub factory: Address,
    pub requester: Pubkey,
    pub error: OracleError,
}

/// Result of one pass over newly issued tickets
#[derive(Debug, Clone, Default)]
pub struct TicketSweep {
    /// First event sequence the next sweep should read
    pub next_sequence: u64,
    pub answered: Vec<(TicketKind, Address, u64)>,
    pub failed: Vec<UnansweredTicket>,
}

pub fn pricing_params(section: &OracleSection) -> PricingParams {
    PricingParams {
        sample_size: section.sample_size,
        current_price_max_delay_seconds: section.current_price_max_delay_seconds,
        risk_free_yearly_rate: section.risk_free_yearly_rate,
        max_steps_too_old: section.max_steps_too_old,
        year_seconds: section.year_seconds,
        settle_delay_seconds: section.settle_delay_seconds,
    }
}

pub struct OracleService {
    pricer: OptionPricer,
    pairs: SupportedPairs,
    credential: OracleCredential,
    metrics: ProtocolMetrics,
}

impl OracleService {
    pub fn new(pricer: OptionPricer, pairs: SupportedPairs, credential: OracleCredential) -> Self {
        Self {
            pricer,
            pairs,
            credential,
            metrics: ProtocolMetrics::new("oracle"),
        }
    }

    pub fn from_config(config: &ProtocolConfig, feed: Arc<dyn PriceFeed>) -> Result<Self> {
        let key: Pubkey = config
            .protocol
            .oracle_key
            .parse()
            .map_err(|_| OracleError::Config(format!("oracle_key is not a valid key: {}", config.protocol.oracle_key)))?;
        let pairs = SupportedPairs::from_config(&config.oracle.supported_pairs)?;
        if pairs.is_empty() {
            warn!("Oracle has no supported asset pairs, every ticket will be refused");
        }
        let pricer = OptionPricer::new(feed, pricing_params(&config.oracle));
        Ok(Self::new(pricer, pairs, OracleCredential::new(key)))
    }

    pub fn pairs(&self) -> &SupportedPairs {
        &self.pairs
    }

    pub fn credential(&self) -> OracleCredential {
        self.credential
    }

    fn observe<T>(&self, op: &'static str, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.metrics.record_op(op),
            Err(err) => {
                self.metrics.record_rejection(op, err.category());
                warn!(op, error = %err, "Oracle update refused");
            }
        }
        result
    }

    async fn check_ticket(
        &self,
        store: &dyn LedgerStore,
        kind: TicketKind,
        factory: &Address,
        requester: &Pubkey,
    ) -> Result<()> {
        match store.ticket(kind, factory, requester).await {
            Some(ticket) if !ticket.is_used() => Ok(()),
            _ => Err(OracleError::Ledger(ledger::LedgerError::TicketInvalid)),
        }
    }

    /// Price `factory` and consume `requester`'s fair-price ticket
    pub async fn update_fair_price(
        &self,
        store: &dyn LedgerStore,
        factory: Address,
        requester: Pubkey,
        now: Timestamp,
    ) -> Result<FairPriceUpdate> {
        let result = self.fair_price_inner(store, factory, requester, now).await;
        self.observe("update_fair_price", result)
    }

    async fn fair_price_inner(
        &self,
        store: &dyn LedgerStore,
        factory: Address,
        requester: Pubkey,
        now: Timestamp,
    ) -> Result<FairPriceUpdate> {
        self.check_ticket(store, TicketKind::FairPrice, &factory, &requester)
            .await?;
        let vault_factory = store.factory(&factory).await?;
        self.pairs.check(&vault_factory.series)?;

        let maturity = vault_factory.maturity();
        if vault_factory.matured || maturity < now {
            return Err(ledger::LedgerError::FactoryMatured.into());
        }
        let params = store.params().await;
        if params.is_frozen(maturity, now) {
            return Err(ledger::LedgerError::FrozenPeriod {
                freeze_seconds: params.freeze_seconds,
            }
            .into());
        }

        let quote = self.pricer.fair_price(&vault_factory.series, now).await?;
        if quote.price == 0 {
            return Err(OracleError::PriceNotPositive { factory });
        }
        let write = store
            .consume_fair_price_ticket(self.credential, factory, requester, quote.price, now)
            .await?;
        info!(factory = %factory, requester = %requester, price = quote.price, ?write, "Fair price ticket answered");
        Ok(FairPriceUpdate { quote, write })
    }

    /// Look up the settlement price of `factory` and consume `requester`'s settle ticket
    pub async fn update_settle_price(
        &self,
        store: &dyn LedgerStore,
        factory: Address,
        requester: Pubkey,
        now: Timestamp,
    ) -> Result<SettlePriceUpdate> {
        let result = self.settle_price_inner(store, factory, requester, now).await;
        self.observe("update_settle_price", result)
    }

    async fn settle_price_inner(
        &self,
        store: &dyn LedgerStore,
        factory: Address,
        requester: Pubkey,
        now: Timestamp,
    ) -> Result<SettlePriceUpdate> {
        self.check_ticket(store, TicketKind::Settle, &factory, &requester)
            .await?;
        let vault_factory = store.factory(&factory).await?;
        self.pairs.check(&vault_factory.series)?;

        let quote = self.pricer.settle_price(&vault_factory.series, now).await?;
        if quote.price == 0 {
            return Err(OracleError::PriceNotPositive { factory });
        }
        let write = store
            .consume_settle_ticket(self.credential, factory, requester, quote.price, now)
            .await?;
        info!(factory = %factory, requester = %requester, price = quote.price, ?write, "Settle ticket answered");
        Ok(SettlePriceUpdate { quote, write })
    }

    /// Answer every ticket issued at or after `from_sequence`.
    ///
    /// Failures are collected per ticket; one bad factory does not stop
    /// the sweep.
    pub async fn answer_issued_tickets(
        &self,
        store: &dyn LedgerStore,
        from_sequence: u64,
        now: Timestamp,
    ) -> TicketSweep {
        let events = store.events_from(from_sequence).await;
        let mut sweep = TicketSweep {
            next_sequence: events.last().map_or(from_sequence, |e| e.sequence + 1),
            ..TicketSweep::default()
        };

        for event in events {
            let EventKind::TicketIssued {
                factory,
                requester,
                ticket_kind,
                generation,
            } = event.kind
            else {
                continue;
            };
            // a later issue of the same ticket is answered at its own event
            let current = store.ticket(ticket_kind, &factory, &requester).await;
            if current.is_some_and(|ticket| ticket.generation > generation) {
                debug!(factory = %factory, requester = %requester, generation, "Skipping superseded ticket");
                continue;
            }
            let price = match ticket_kind {
                TicketKind::FairPrice => self
                    .update_fair_price(store, factory, requester, now)
                    .await
                    .map(|update| update.quote.price),
                TicketKind::Settle => self
                    .update_settle_price(store, factory, requester, now)
                    .await
                    .map(|update| update.quote.price),
            };
            match price {
                Ok(price) => sweep.answered.push((ticket_kind, factory, price)),
                Err(error) => sweep.failed.push(UnansweredTicket {
                    kind: ticket_kind,
                    factory,
                    requester,
                    error,
                }),
            }
        }
        debug!(
            answered = sweep.answered.len(),
            failed = sweep.failed.len(),
            next_sequence = sweep.next_sequence,
            "Ticket sweep finished"
        );
        sweep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::SupportedPair;
    use assert_matches::assert_matches;
    use ledger::testing::{btc, fixture, usdc, Fixture, NOW};
    use ledger::{InMemoryLedgerStore, LedgerError, VaultCreated};
    use market_data::{Candle, CandleGranularity, InMemoryFeed, MarketDataError};

    fn seeded_feed(now: u64) -> Arc<InMemoryFeed> {
        let feed = Arc::new(InMemoryFeed::new());
        let hourly = (0..48)
            .map(|i| {
                let wiggle = if i % 2 == 0 { 1.0 } else { -1.0 } * (i % 5) as f64 * 150_000_000.0;
                Candle::new(now - (48 - i) * 3600, 25_000_000_000.0 + wiggle)
            })
            .collect();
        feed.insert(btc(), CandleGranularity::OneHour, hourly);
        feed.insert(
            btc(),
            CandleGranularity::OneMinute,
            vec![Candle::new(now - now % 60 - 60, 24_800_000_000.0)],
        );
        feed
    }

    fn service(f: &Fixture, feed: Arc<InMemoryFeed>) -> OracleService {
        let pairs = SupportedPairs::new([SupportedPair {
            symbol: "BTC/USDC".to_string(),
            base: btc(),
            quote: usdc(),
            feed_address: None,
        }]);
        OracleService::new(OptionPricer::new(feed, PricingParams::default()), pairs, f.oracle())
    }

    fn setup() -> (OracleService, InMemoryLedgerStore, VaultCreated, Arc<InMemoryFeed>) {
        let mut f = fixture();
        let created = f.create_vault("alice", 10).unwrap();
        let feed = seeded_feed(NOW);
        let oracle = service(&f, feed.clone());
        (oracle, InMemoryLedgerStore::new(f.ledger), created, feed)
    }

    fn tom() -> ledger::Signer {
        ledger::Signer::new(Pubkey::named("tom"))
    }

    #[tokio::test]
    async fn test_fair_price_cycle() {
        let (oracle, store, created, _) = setup();
        store.issue_fair_price_ticket(tom(), created.factory, NOW).await.unwrap();

        let update = oracle
            .update_fair_price(&store, created.factory, tom().key(), NOW)
            .await
            .unwrap();
        assert_eq!(update.write, FairPriceWrite::Written);
        assert!(update.quote.price > 0);
        let factory = store.factory(&created.factory).await.unwrap();
        assert_eq!(factory.last_fair_price, update.quote.price);
        assert_eq!(factory.ts_last_fair_price, NOW);

        // the ticket is spent
        assert_matches!(
            oracle.update_fair_price(&store, created.factory, tom().key(), NOW).await,
            Err(OracleError::Ledger(LedgerError::TicketInvalid))
        );
    }

    #[tokio::test]
    async fn test_fair_price_refused_without_ticket() {
        let (oracle, store, created, _) = setup();
        assert_matches!(
            oracle.update_fair_price(&store, created.factory, tom().key(), NOW).await,
            Err(OracleError::Ledger(LedgerError::TicketInvalid))
        );
    }

    #[tokio::test]
    async fn test_unsupported_pair() {
        let mut f = fixture();
        let created = f.create_vault("alice", 10).unwrap();
        let oracle = OracleService::new(
            OptionPricer::new(seeded_feed(NOW), PricingParams::default()),
            SupportedPairs::default(),
            f.oracle(),
        );
        let store = InMemoryLedgerStore::new(f.ledger);
        store.issue_fair_price_ticket(tom(), created.factory, NOW).await.unwrap();
        assert_matches!(
            oracle.update_fair_price(&store, created.factory, tom().key(), NOW).await,
            Err(OracleError::MarketData(MarketDataError::UnsupportedAssetPair { .. }))
        );
    }

    #[tokio::test]
    async fn test_fair_price_refused_in_freeze_window() {
        let (oracle, store, created, _) = setup();
        store.issue_fair_price_ticket(tom(), created.factory, NOW).await.unwrap();
        let maturity = store.factory(&created.factory).await.unwrap().maturity();

        assert_matches!(
            oracle
                .update_fair_price(&store, created.factory, tom().key(), maturity - 600)
                .await,
            Err(OracleError::Ledger(LedgerError::FrozenPeriod { .. }))
        );
    }

    #[tokio::test]
    async fn test_settle_price_cycle() {
        let (oracle, store, created, feed) = setup();
        let maturity = store.factory(&created.factory).await.unwrap().maturity();
        let minute = maturity - maturity % 60;
        feed.insert(
            btc(),
            CandleGranularity::FiveMinutes,
            vec![
                Candle::new(minute - 600, 21_000_000_000.0),
                Candle::new(minute - 300, 20_000_000_000.0),
            ],
        );
        let now = maturity + 600;
        store.issue_settle_ticket(tom(), created.factory, now).await.unwrap();

        let update = oracle
            .update_settle_price(&store, created.factory, tom().key(), now)
            .await
            .unwrap();
        assert_eq!(update.write, SettlePriceWrite::Settled);
        let factory = store.factory(&created.factory).await.unwrap();
        assert_eq!(factory.settled_price, 20_000_000_000);
        assert!(factory.matured);
        assert!(factory.is_exercised());
    }

    #[tokio::test]
    async fn test_sweep_answers_issued_tickets() {
        let (oracle, store, created, _) = setup();
        let start = store.events_from(0).await.len() as u64 + 1;
        store.issue_fair_price_ticket(tom(), created.factory, NOW).await.unwrap();
        let tina = ledger::Signer::new(Pubkey::named("tina"));
        store.issue_fair_price_ticket(tina, created.factory, NOW).await.unwrap();

        let sweep = oracle.answer_issued_tickets(&store, start, NOW).await;
        assert_eq!(sweep.answered.len(), 2);
        assert!(sweep.failed.is_empty());

        // consumption events are past the sweep cursor and carry no new tickets
        let again = oracle.answer_issued_tickets(&store, sweep.next_sequence, NOW).await;
        assert!(again.answered.is_empty());
        assert!(again.failed.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_skips_superseded_generation() {
        let (oracle, store, created, _) = setup();
        let start = store.events_from(0).await.len() as u64 + 1;
        store.issue_fair_price_ticket(tom(), created.factory, NOW).await.unwrap();
        oracle
            .update_fair_price(&store, created.factory, tom().key(), NOW)
            .await
            .unwrap();
        // tom buys a second ticket before the sweep runs
        store.issue_fair_price_ticket(tom(), created.factory, NOW).await.unwrap();

        let sweep = oracle.answer_issued_tickets(&store, start, NOW).await;
        assert_eq!(sweep.answered.len(), 1);
        assert!(sweep.failed.is_empty(), "{:?}", sweep.failed);
        let ticket = store
            .ticket(TicketKind::FairPrice, &created.factory, &tom().key())
            .await
            .unwrap();
        assert!(ticket.is_used());
    }
}
