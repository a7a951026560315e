//! Answer issued oracle tickets from the live candle feed.

use anyhow::Result;
use common::{Address, Timestamp};
use config::ProtocolConfig;
use ledger::TicketKind;
use oracle::{http_feed, OracleService, SupportedPairs, TicketSweep};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::replay::Replay;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SweepLine {
    Answered {
        kind: TicketKind,
        factory: Address,
        price: u64,
    },
    Failed {
        kind: TicketKind,
        factory: Address,
        requester: String,
        error: String,
    },
}

/// Oracle service reading candles from the configured provider
pub fn live_oracle(config: &ProtocolConfig) -> Result<OracleService> {
    let pairs = SupportedPairs::from_config(&config.oracle.supported_pairs)?;
    let feed = http_feed(config, &pairs)?;
    Ok(OracleService::from_config(config, Arc::new(feed))?)
}

pub async fn sweep(oracle: &OracleService, replay: &Replay, from_sequence: u64, now: Timestamp) -> TicketSweep {
    let sweep = oracle.answer_issued_tickets(replay.store(), from_sequence, now).await;
    if sweep.failed.is_empty() {
        info!(answered = sweep.answered.len(), next_sequence = sweep.next_sequence, "Tickets answered");
    } else {
        warn!(
            answered = sweep.answered.len(),
            failed = sweep.failed.len(),
            next_sequence = sweep.next_sequence,
            "Some tickets were not answered"
        );
    }
    sweep
}

pub fn lines(sweep: &TicketSweep, replay: &Replay) -> Vec<SweepLine> {
    let answered = sweep.answered.iter().map(|(kind, factory, price)| SweepLine::Answered {
        kind: *kind,
        factory: *factory,
        price: *price,
    });
    let failed = sweep.failed.iter().map(|ticket| SweepLine::Failed {
        kind: ticket.kind,
        factory: ticket.factory,
        requester: replay.name_of(&ticket.requester),
        error: ticket.error.to_string(),
    });
    answered.chain(failed).collect()
}
