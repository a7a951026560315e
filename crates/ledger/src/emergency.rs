//! Emergency mode: the way out when no settlement price arrives.

use common::{Address, Timestamp};
use tracing::warn;

use crate::auth::Signer;
use crate::error::{LedgerError, Result};
use crate::event::EventKind;
use crate::ledger::Ledger;
use crate::tx::Transaction;

impl Ledger {
    /// Put `factory` into emergency mode. Anyone may do this once the grace
    /// period after maturity has passed without a settlement price.
    pub fn activate_emergency_mode(&mut self, signer: Signer, factory: Address, now: Timestamp) -> Result<()> {
        self.execute("activate_emergency_mode", now, |ledger| {
            let mut vault_factory = ledger.factory(&factory)?.clone();
            if vault_factory.emergency_mode {
                return Err(LedgerError::EmergencyMode);
            }
            if vault_factory.settled_price > 0 {
                return Err(LedgerError::FactoryMatured);
            }
            let available_at = vault_factory
                .maturity()
                .saturating_add(ledger.params().emergency_grace_seconds);
            if now <= available_at {
                return Err(LedgerError::EmergencyGracePending { available_at });
            }

            vault_factory.emergency_mode = true;
            warn!(factory = %factory, by = %signer.key(), "Emergency mode activated");
            let mut tx = Transaction::new();
            tx.write(factory, vault_factory)
                .emit(EventKind::EmergencyModeActivated { factory });
            Ok((tx, ()))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::LedgerError;
    use crate::testing::fixture;
    use assert_matches::assert_matches;

    #[test]
    fn test_grace_period_must_elapse() {
        let mut f = fixture();
        let created = f.create_vault("alice", 10).unwrap();
        let grace = f.ledger.params().emergency_grace_seconds;
        let maturity = f.series.maturity;
        let bob = f.signer("bob");

        assert_matches!(
            f.ledger.activate_emergency_mode(bob, created.factory, maturity + grace),
            Err(LedgerError::EmergencyGracePending { .. })
        );
        f.ledger
            .activate_emergency_mode(bob, created.factory, maturity + grace + 1)
            .unwrap();
        assert!(f.ledger.factory(&created.factory).unwrap().emergency_mode);
        assert_matches!(
            f.ledger.activate_emergency_mode(bob, created.factory, maturity + grace + 2),
            Err(LedgerError::EmergencyMode)
        );
    }

    #[test]
    fn test_refused_after_settlement() {
        let mut f = fixture();
        let created = f.create_vault("alice", 10).unwrap();
        f.settle(&created, 24_000_000_000);
        let late = f.series.maturity + 10 * 86_400;
        assert_matches!(
            f.ledger.activate_emergency_mode(f.signer("bob"), created.factory, late),
            Err(LedgerError::FactoryMatured)
        );
    }
}
