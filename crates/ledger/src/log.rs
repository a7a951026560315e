//! Sequenced event log

use common::Timestamp;
use tracing::debug;

use crate::event::{EventKind, LedgerEvent};

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
    sequence: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event with the next sequence number
    pub fn append(&mut self, at: Timestamp, kind: EventKind) -> u64 {
        self.sequence += 1;
        debug!(sequence = self.sequence, event = kind.name(), "Event appended to log");
        self.events.push(LedgerEvent {
            sequence: self.sequence,
            at,
            kind,
        });
        self.sequence
    }

    /// Events with sequence at or after `from_sequence`
    pub fn get_from(&self, from_sequence: u64) -> &[LedgerEvent] {
        let start = self.events.partition_point(|e| e.sequence < from_sequence);
        &self.events[start..]
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Pubkey;

    #[test]
    fn test_sequence_is_monotonic() {
        let mut log = EventLog::new();
        let factory = Pubkey::named("f");
        for _ in 0..3 {
            log.append(10, EventKind::EmergencyModeActivated { factory });
        }
        assert_eq!(log.sequence(), 3);
        assert_eq!(log.get_from(2).len(), 2);
        assert_eq!(log.get_from(2)[0].sequence, 2);
        assert!(log.get_from(4).is_empty());
    }
}
