//! Engine events for state change notifications.
//!
//! One event is recorded for every committed operation so that clients can
//! track activity. Rejected operations record nothing.

use serde::{Deserialize, Serialize};

use crate::core::config::EngineConfig;
use crate::core::ledger::DebtShares;
use crate::core::token::TokenAmount;
use crate::core::vault::CollateralAmount;
use crate::utils::constants::DEFAULT_MAX_EVENTS;
use crate::utils::crypto::{AccountId, Hash};
use crate::utils::math::FixedPoint;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All engine event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Collateral was deposited
    CollateralDeposited(CollateralDepositedEvent),
    /// Collateral was withdrawn
    CollateralWithdrawn(CollateralWithdrawnEvent),
    /// Debt was minted
    DebtMinted(DebtMintedEvent),
    /// Debt was repaid
    DebtRepaid(DebtRepaidEvent),
    /// A position was liquidated
    PositionLiquidated(PositionLiquidatedEvent),
    /// Engine configuration changed
    ConfigUpdated(ConfigUpdatedEvent),
}

impl EngineEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CollateralDeposited(_) => "CollateralDeposited",
            Self::CollateralWithdrawn(_) => "CollateralWithdrawn",
            Self::DebtMinted(_) => "DebtMinted",
            Self::DebtRepaid(_) => "DebtRepaid",
            Self::PositionLiquidated(_) => "PositionLiquidated",
            Self::ConfigUpdated(_) => "ConfigUpdated",
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::CollateralDeposited(e) => e.timestamp,
            Self::CollateralWithdrawn(e) => e.timestamp,
            Self::DebtMinted(e) => e.timestamp,
            Self::DebtRepaid(e) => e.timestamp,
            Self::PositionLiquidated(e) => e.timestamp,
            Self::ConfigUpdated(e) => e.timestamp,
        }
    }

    /// Account the event concerns, if any
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            Self::CollateralDeposited(e) => Some(&e.account),
            Self::CollateralWithdrawn(e) => Some(&e.account),
            Self::DebtMinted(e) => Some(&e.account),
            Self::DebtRepaid(e) => Some(&e.account),
            Self::PositionLiquidated(e) => Some(&e.account),
            Self::ConfigUpdated(_) => None,
        }
    }

    /// Compute event hash
    pub fn hash(&self) -> Hash {
        let data = bincode::serialize(self).unwrap_or_default();
        Hash::sha256(&data)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSITION EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when collateral is deposited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralDepositedEvent {
    /// Account credited
    pub account: AccountId,
    /// Amount deposited
    pub amount: CollateralAmount,
    /// New account collateral
    pub new_total: CollateralAmount,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when collateral is withdrawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralWithdrawnEvent {
    /// Account debited
    pub account: AccountId,
    /// Amount withdrawn
    pub amount: CollateralAmount,
    /// Remaining account collateral
    pub new_total: CollateralAmount,
    /// Price used for the health check
    pub price: FixedPoint,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when debt is minted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtMintedEvent {
    /// Borrower
    pub account: AccountId,
    /// Debt asset credited
    pub amount: TokenAmount,
    /// Shares issued
    pub shares: DebtShares,
    /// New account debt
    pub new_debt: TokenAmount,
    /// Exchange rate used
    pub exchange_rate: FixedPoint,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when debt is repaid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtRepaidEvent {
    /// Account whose debt was repaid
    pub account: AccountId,
    /// Amount repaid after clamping
    pub amount: TokenAmount,
    /// Shares burned
    pub shares: DebtShares,
    /// Remaining debt
    pub remaining_debt: TokenAmount,
    /// Exchange rate used
    pub exchange_rate: FixedPoint,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a position is liquidated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionLiquidatedEvent {
    /// Liquidated account
    pub account: AccountId,
    /// Liquidator
    pub liquidator: AccountId,
    /// Debt repaid by the liquidator
    pub debt_repaid: TokenAmount,
    /// Collateral transferred to the liquidator
    pub collateral_seized: CollateralAmount,
    /// Debt written off
    pub bad_debt: TokenAmount,
    /// Price used
    pub price: FixedPoint,
    /// Health factor before liquidation
    pub health_factor: Option<FixedPoint>,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when the configuration changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdatedEvent {
    /// Configuration before the change
    pub previous: Box<EngineConfig>,
    /// Configuration after the change
    pub current: Box<EngineConfig>,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded log of committed events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<EngineEvent>,
    max_events: usize,
    /// Events ever recorded, including pruned ones
    total_recorded: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

impl EventLog {
    /// Create a new empty event log keeping at most `max_events`
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            max_events: max_events.max(1),
            total_recorded: 0,
        }
    }

    /// Add an event (with pruning)
    pub fn push(&mut self, event: EngineEvent) {
        self.events.push(event);
        self.total_recorded = self.total_recorded.saturating_add(1);

        if self.events.len() > self.max_events {
            self.events.drain(0..self.events.len() - self.max_events);
        }
    }

    /// Change the bound, pruning the oldest events if needed
    pub fn set_max_events(&mut self, max_events: usize) {
        self.max_events = max_events.max(1);
        if self.events.len() > self.max_events {
            self.events.drain(0..self.events.len() - self.max_events);
        }
    }

    /// Get all retained events, oldest first
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// Get the most recent `n` events, newest last
    pub fn recent(&self, n: usize) -> &[EngineEvent] {
        let start = self.events.len().saturating_sub(n);
        &self.events[start..]
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&EngineEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events concerning an account
    pub fn for_account(&self, account: &AccountId) -> Vec<&EngineEvent> {
        self.events
            .iter()
            .filter(|e| e.account() == Some(account))
            .collect()
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events ever recorded
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit_event(label: &str, timestamp: u64) -> EngineEvent {
        EngineEvent::CollateralDeposited(CollateralDepositedEvent {
            account: AccountId::from_label(label),
            amount: CollateralAmount::from_whole(1),
            new_total: CollateralAmount::from_whole(1),
            timestamp,
        })
    }

    #[test]
    fn test_event_types() {
        let event = deposit_event("alice", 100);
        assert_eq!(event.event_type(), "CollateralDeposited");
        assert_eq!(event.timestamp(), 100);
        assert_eq!(event.account(), Some(&AccountId::from_label("alice")));
    }

    #[test]
    fn test_event_log_pruning() {
        let mut log = EventLog::new(3);
        for t in 0..5 {
            log.push(deposit_event("alice", t));
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.total_recorded(), 5);
        assert_eq!(log.events()[0].timestamp(), 2);
        assert_eq!(log.recent(1)[0].timestamp(), 4);

        log.set_max_events(1);
        assert_eq!(log.len(), 1);
        assert_eq!(log.events()[0].timestamp(), 4);
    }

    #[test]
    fn test_event_log_filters() {
        let mut log = EventLog::default();
        log.push(deposit_event("alice", 1));
        log.push(deposit_event("bob", 2));

        assert_eq!(log.filter_by_type("CollateralDeposited").len(), 2);
        assert_eq!(log.filter_by_type("DebtMinted").len(), 0);
        assert_eq!(log.for_account(&AccountId::from_label("bob")).len(), 1);
    }

    #[test]
    fn test_event_hash() {
        let a = deposit_event("alice", 1);
        let b = deposit_event("alice", 1);
        let c = deposit_event("alice", 2);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }
}
