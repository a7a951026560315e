//! Oracle tickets.
//!
//! A ticket is a paid, single-use request for the oracle to write one price
//! into a vault factory. Requesters issue tickets; only the oracle key may
//! consume them.

use common::{Address, Pubkey, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accounts::{OracleTicket, TicketKind, TicketState, VaultFactory};
use crate::auth::{OracleCredential, Signer};
use crate::error::{LedgerError, Result};
use crate::event::EventKind;
use crate::ledger::Ledger;
use crate::tx::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FairPriceWrite {
    Written,
    /// Ticket consumed but the price not stored: the factory is inside its
    /// freeze window
    SkippedFrozen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlePriceWrite {
    Settled,
    /// Another ticket already set the settlement price
    AlreadyMatured,
}

impl Ledger {
    pub fn issue_fair_price_ticket(&mut self, signer: Signer, factory: Address, now: Timestamp) -> Result<u64> {
        let generation = self.execute("issue_fair_price_ticket", now, |ledger| {
            let vault_factory = ledger.factory(&factory)?;
            if vault_factory.matured {
                return Err(LedgerError::FactoryMatured);
            }
            if ledger.params().is_frozen(vault_factory.maturity(), now) {
                return Err(LedgerError::FrozenPeriod {
                    freeze_seconds: ledger.params().freeze_seconds,
                });
            }
            ledger.issue_ticket(TicketKind::FairPrice, signer, factory, now)
        })?;
        self.metrics().record_ticket(TicketKind::FairPrice.as_str(), "issued");
        Ok(generation)
    }

    pub fn issue_settle_ticket(&mut self, signer: Signer, factory: Address, now: Timestamp) -> Result<u64> {
        let generation = self.execute("issue_settle_ticket", now, |ledger| {
            let vault_factory = ledger.factory(&factory)?;
            if vault_factory.maturity() >= now {
                return Err(LedgerError::NotMatured);
            }
            if vault_factory.matured {
                return Err(LedgerError::FactoryMatured);
            }
            ledger.issue_ticket(TicketKind::Settle, signer, factory, now)
        })?;
        self.metrics().record_ticket(TicketKind::Settle.as_str(), "issued");
        Ok(generation)
    }

    fn issue_ticket(
        &self,
        kind: TicketKind,
        signer: Signer,
        factory: Address,
        now: Timestamp,
    ) -> Result<(Transaction, u64)> {
        let address = Self::ticket_address(kind, &factory, &signer.key());
        let generation = match self.ticket(kind, &factory, &signer.key()) {
            Some(ticket) if !ticket.is_used() => return Err(LedgerError::TicketAlreadyIssued),
            Some(ticket) => ticket.generation + 1,
            None => 1,
        };
        let params = self.params();
        let ticket = OracleTicket {
            factory,
            requester: signer.key(),
            kind,
            generation,
            state: TicketState::Issued {
                issuer: signer.key(),
                consumer: params.oracle_key,
                issued_at: now,
            },
        };

        let mut tx = Transaction::new();
        tx.transfer(params.fee_asset, signer.key(), params.oracle_key, params.ticket_fee)
            .write(address, ticket)
            .emit(EventKind::TicketIssued {
                factory,
                requester: signer.key(),
                ticket_kind: kind,
                generation,
            });
        Ok((tx, generation))
    }

    /// Oracle writes a fair price into `factory` using `requester`'s ticket
    pub fn consume_fair_price_ticket(
        &mut self,
        credential: OracleCredential,
        factory: Address,
        requester: Pubkey,
        price: u64,
        now: Timestamp,
    ) -> Result<FairPriceWrite> {
        let written = self.execute("consume_fair_price_ticket", now, |ledger| {
            let mut tx = Transaction::new();
            let mut vault_factory =
                ledger.consume_ticket(&mut tx, TicketKind::FairPrice, credential, factory, requester, price, now)?;

            let written = if ledger.params().is_frozen(vault_factory.maturity(), now) {
                FairPriceWrite::SkippedFrozen
            } else {
                vault_factory.last_fair_price = price;
                vault_factory.ts_last_fair_price = now;
                tx.write(factory, vault_factory)
                    .emit(EventKind::FairPriceUpdated { factory, price });
                FairPriceWrite::Written
            };
            Ok::<_, LedgerError>((tx, written))
        })?;
        self.metrics().record_ticket(TicketKind::FairPrice.as_str(), "consumed");
        Ok(written)
    }

    /// Oracle writes the settlement price into `factory`. The first
    /// settlement matures the factory; later ones only burn their ticket.
    pub fn consume_settle_ticket(
        &mut self,
        credential: OracleCredential,
        factory: Address,
        requester: Pubkey,
        price: u64,
        now: Timestamp,
    ) -> Result<SettlePriceWrite> {
        let written = self.execute("consume_settle_ticket", now, |ledger| {
            let mut tx = Transaction::new();
            let mut vault_factory =
                ledger.consume_ticket(&mut tx, TicketKind::Settle, credential, factory, requester, price, now)?;
            if vault_factory.maturity() >= now {
                return Err(LedgerError::NotMatured);
            }

            if vault_factory.matured {
                return Ok((tx, SettlePriceWrite::AlreadyMatured));
            }
            vault_factory.settled_price = price;
            vault_factory.matured = true;
            info!(factory = %factory, price, "Settlement price set");
            tx.write(factory, vault_factory)
                .emit(EventKind::SettlePriceSet { factory, price });
            Ok((tx, SettlePriceWrite::Settled))
        })?;
        self.metrics().record_ticket(TicketKind::Settle.as_str(), "consumed");
        Ok(written)
    }

    #[allow(clippy::too_many_arguments)]
    fn consume_ticket(
        &self,
        tx: &mut Transaction,
        kind: TicketKind,
        credential: OracleCredential,
        factory: Address,
        requester: Pubkey,
        price: u64,
        now: Timestamp,
    ) -> Result<VaultFactory> {
        if credential.key() != self.params().oracle_key {
            return Err(LedgerError::Unauthorized(credential.key()));
        }
        if price == 0 {
            return Err(LedgerError::InvalidPrice("price must be positive".to_string()));
        }
        let vault_factory = self.factory(&factory)?.clone();

        let mut ticket = self
            .ticket(kind, &factory, &requester)
            .cloned()
            .ok_or(LedgerError::TicketInvalid)?;
        match ticket.state {
            TicketState::Issued { consumer, .. } if consumer == credential.key() => {}
            TicketState::Issued { .. } => return Err(LedgerError::Unauthorized(credential.key())),
            TicketState::Consumed { .. } => return Err(LedgerError::TicketInvalid),
        }
        ticket.state = TicketState::Consumed { consumed_at: now };
        let generation = ticket.generation;

        tx.write(Self::ticket_address(kind, &factory, &requester), ticket)
            .emit(EventKind::TicketConsumed {
                factory,
                requester,
                ticket_kind: kind,
                generation,
            });
        Ok(vault_factory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture, native, NOW};
    use assert_matches::assert_matches;

    #[test]
    fn test_fair_price_ticket_lifecycle() {
        let mut f = fixture();
        let created = f.create_vault("alice", 10).unwrap();
        let tom = f.signer("tom");
        let oracle_key = f.ledger.params().oracle_key;
        let fee_before = f.ledger.balance(native(), oracle_key);

        assert_eq!(f.ledger.issue_fair_price_ticket(tom, created.factory, NOW).unwrap(), 1);
        assert_eq!(
            f.ledger.balance(native(), oracle_key),
            fee_before + f.ledger.params().ticket_fee
        );
        assert_matches!(
            f.ledger.issue_fair_price_ticket(tom, created.factory, NOW),
            Err(LedgerError::TicketAlreadyIssued)
        );

        let write = f
            .ledger
            .consume_fair_price_ticket(f.oracle(), created.factory, tom.key(), 250_000, NOW + 5)
            .unwrap();
        assert_eq!(write, FairPriceWrite::Written);
        let factory = f.ledger.factory(&created.factory).unwrap();
        assert_eq!(factory.last_fair_price, 250_000);
        assert_eq!(factory.ts_last_fair_price, NOW + 5);

        // a consumed ticket cannot be consumed again
        assert_matches!(
            f.ledger
                .consume_fair_price_ticket(f.oracle(), created.factory, tom.key(), 1, NOW + 6),
            Err(LedgerError::TicketInvalid)
        );
        // but a new generation can be issued
        assert_eq!(f.ledger.issue_fair_price_ticket(tom, created.factory, NOW + 7).unwrap(), 2);
    }

    #[test]
    fn test_only_oracle_consumes() {
        let mut f = fixture();
        let created = f.create_vault("alice", 10).unwrap();
        let tom = f.signer("tom");
        f.ledger.issue_fair_price_ticket(tom, created.factory, NOW).unwrap();

        let impostor = OracleCredential::new(tom.key());
        assert_matches!(
            f.ledger
                .consume_fair_price_ticket(impostor, created.factory, tom.key(), 10, NOW),
            Err(LedgerError::Unauthorized(_))
        );
        assert_matches!(
            f.ledger
                .consume_fair_price_ticket(f.oracle(), created.factory, tom.key(), 0, NOW),
            Err(LedgerError::InvalidPrice(_))
        );
        assert_matches!(
            f.ledger
                .consume_fair_price_ticket(f.oracle(), created.factory, f.signer("tina").key(), 10, NOW),
            Err(LedgerError::TicketInvalid)
        );
    }

    #[test]
    fn test_fair_price_skipped_inside_freeze_window() {
        let mut f = fixture();
        let created = f.create_vault("alice", 10).unwrap();
        let tom = f.signer("tom");
        f.ledger.issue_fair_price_ticket(tom, created.factory, NOW).unwrap();

        let late = f.series.maturity - 100;
        let write = f
            .ledger
            .consume_fair_price_ticket(f.oracle(), created.factory, tom.key(), 99, late)
            .unwrap();
        assert_eq!(write, FairPriceWrite::SkippedFrozen);
        assert_eq!(f.ledger.factory(&created.factory).unwrap().last_fair_price, 0);
        assert!(f.ledger.ticket(TicketKind::FairPrice, &created.factory, &tom.key()).unwrap().is_used());
    }

    #[test]
    fn test_settle_ticket_sets_price_once() {
        let mut f = fixture();
        let created = f.create_vault("alice", 10).unwrap();
        let after = f.series.maturity + 120;
        let (tom, tina) = (f.signer("tom"), f.signer("tina"));

        assert_matches!(
            f.ledger.issue_settle_ticket(tom, created.factory, NOW),
            Err(LedgerError::NotMatured)
        );
        f.ledger.issue_settle_ticket(tom, created.factory, after).unwrap();
        f.ledger.issue_settle_ticket(tina, created.factory, after).unwrap();

        assert_eq!(
            f.ledger
                .consume_settle_ticket(f.oracle(), created.factory, tom.key(), 24_000_000_000, after)
                .unwrap(),
            SettlePriceWrite::Settled
        );
        assert_eq!(
            f.ledger
                .consume_settle_ticket(f.oracle(), created.factory, tina.key(), 1, after)
                .unwrap(),
            SettlePriceWrite::AlreadyMatured
        );
        let factory = f.ledger.factory(&created.factory).unwrap();
        assert!(factory.matured);
        assert_eq!(factory.settled_price, 24_000_000_000);

        assert_matches!(
            f.ledger.issue_settle_ticket(tom, created.factory, after),
            Err(LedgerError::FactoryMatured)
        );
        assert_matches!(
            f.ledger.issue_fair_price_ticket(tom, created.factory, after),
            Err(LedgerError::FactoryMatured)
        );
    }
}
