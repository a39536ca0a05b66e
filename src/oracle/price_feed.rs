//! Price oracle interface and price feed implementation.
//!
//! This module provides the collateral price the engine consumes:
//! - The [`PriceOracle`] trait, a synchronous point-in-time price read
//! - [`FixedPriceOracle`], a settable price for tests and scripting
//! - [`PriceFeed`], a validating feed with staleness, deviation and history

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::crypto::Hash;
use crate::utils::math::{mul_div_down, FixedPoint};

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of the collateral price, in debt-asset units per collateral unit
pub trait PriceOracle {
    /// Price valid at `now`; any failure aborts the calling operation
    fn get_price(&self, now: u64) -> Result<FixedPoint>;
}

/// Oracle returning whatever price it was last given
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPriceOracle {
    price: Option<FixedPoint>,
}

impl FixedPriceOracle {
    /// Oracle quoting `price`
    pub fn new(price: FixedPoint) -> Self {
        Self { price: Some(price) }
    }

    /// Oracle with no price; every read fails
    pub fn unavailable() -> Self {
        Self { price: None }
    }

    /// Replace the quoted price
    pub fn set_price(&mut self, price: FixedPoint) {
        self.price = Some(price);
    }

    /// Drop the price so reads fail
    pub fn clear(&mut self) {
        self.price = None;
    }
}

impl PriceOracle for FixedPriceOracle {
    fn get_price(&self, _now: u64) -> Result<FixedPoint> {
        match self.price {
            Some(price) if !price.is_zero() => Ok(price),
            Some(_) => Err(Error::OracleUnavailable("price is zero".into())),
            None => Err(Error::OracleUnavailable("no price set".into())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// A single price data point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceData {
    /// Price of one collateral unit in debt-asset units
    pub price: FixedPoint,
    /// Unix timestamp when price was recorded
    pub timestamp: u64,
    /// Who reported the price
    pub source: String,
}

impl PriceData {
    /// Create a new price data point
    pub fn new(price: FixedPoint, timestamp: u64, source: impl Into<String>) -> Self {
        Self {
            price,
            timestamp,
            source: source.into(),
        }
    }

    /// Check if price is fresh
    pub fn is_fresh(&self, current_time: u64, max_age: u64) -> bool {
        current_time.saturating_sub(self.timestamp) <= max_age
    }

    /// Get age of price in seconds
    pub fn age(&self, current_time: u64) -> u64 {
        current_time.saturating_sub(self.timestamp)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE FEED
// ═══════════════════════════════════════════════════════════════════════════════

/// Validating price feed for the collateral asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeed {
    /// Current price
    current: Option<PriceData>,
    /// Previous price (for change detection)
    previous: Option<PriceData>,
    /// Price history (for TWAP calculations)
    history: Vec<PriceData>,
    /// Maximum history size
    max_history: usize,
    /// Maximum price staleness in seconds
    max_staleness: u64,
    /// Maximum allowed deviation between updates
    max_deviation_bps: u64,
}

impl Default for PriceFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceFeed {
    /// Create a new price feed
    pub fn new() -> Self {
        Self {
            current: None,
            previous: None,
            history: Vec::new(),
            max_history: PRICE_HISTORY_LEN,
            max_staleness: MAX_PRICE_STALENESS_SECS,
            max_deviation_bps: MAX_PRICE_DEVIATION_BPS,
        }
    }

    /// Create with custom parameters
    pub fn with_params(max_staleness: u64, max_deviation_bps: u64) -> Self {
        Self {
            max_staleness,
            max_deviation_bps,
            ..Self::new()
        }
    }

    /// Replace the staleness and deviation limits, keeping recorded prices
    pub fn set_limits(&mut self, max_staleness: u64, max_deviation_bps: u64) {
        self.max_staleness = max_staleness;
        self.max_deviation_bps = max_deviation_bps;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PRICE UPDATES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Update price with validation
    pub fn update(&mut self, price: PriceData) -> Result<()> {
        if price.price.is_zero() {
            return Err(Error::InvalidParameter {
                name: "price".into(),
                reason: "price cannot be zero".into(),
            });
        }

        if let Some(current) = &self.current {
            if price.timestamp < current.timestamp {
                return Err(Error::InvalidParameter {
                    name: "timestamp".into(),
                    reason: "price timestamp is older than current".into(),
                });
            }

            let deviation = Self::deviation_bps(current.price, price.price)?;
            if deviation > self.max_deviation_bps {
                return Err(Error::PriceDeviationTooHigh {
                    deviation_bps: deviation,
                    max_deviation_bps: self.max_deviation_bps,
                });
            }
        }

        self.force_update(price);
        Ok(())
    }

    /// Force update (bypass validation, for operator use)
    pub fn force_update(&mut self, price: PriceData) {
        self.previous = self.current.take();
        self.history.push(price.clone());
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }
        self.current = Some(price);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get current price
    pub fn current_price(&self) -> Option<&PriceData> {
        self.current.as_ref()
    }

    /// Get previous price
    pub fn previous_price(&self) -> Option<&PriceData> {
        self.previous.as_ref()
    }

    /// Recorded history, oldest first
    pub fn history(&self) -> &[PriceData] {
        &self.history
    }

    /// Maximum accepted age of a price
    pub fn max_staleness(&self) -> u64 {
        self.max_staleness
    }

    /// Check if current price is valid for use
    pub fn is_valid(&self, current_time: u64) -> bool {
        self.get_validated_price(current_time).is_ok()
    }

    /// Get validated price or error
    pub fn get_validated_price(&self, current_time: u64) -> Result<FixedPoint> {
        let current = self
            .current
            .as_ref()
            .ok_or_else(|| Error::OracleUnavailable("no price available".into()))?;

        if current.timestamp > current_time {
            return Err(Error::OracleUnavailable(
                "price timestamp is in the future".into(),
            ));
        }
        if !current.is_fresh(current_time, self.max_staleness) {
            return Err(Error::OracleUnavailable(format!(
                "price is stale: {}s old, max {}s",
                current.age(current_time),
                self.max_staleness
            )));
        }

        Ok(current.price)
    }

    /// Average of the prices recorded in the last `period_secs`
    pub fn twap(&self, period_secs: u64, current_time: u64) -> Option<FixedPoint> {
        let cutoff = current_time.saturating_sub(period_secs);

        let relevant: Vec<u128> = self
            .history
            .iter()
            .filter(|p| p.timestamp >= cutoff)
            .map(|p| p.price.raw())
            .collect();

        if relevant.is_empty() {
            return None;
        }

        let sum = relevant.iter().try_fold(0u128, |acc, p| acc.checked_add(*p))?;
        Some(FixedPoint::from_raw(sum / relevant.len() as u128))
    }

    /// Signed change from the previous price, in basis points
    pub fn price_change_bps(&self) -> i64 {
        let (Some(previous), Some(current)) = (&self.previous, &self.current) else {
            return 0;
        };
        let magnitude = Self::deviation_bps(previous.price, current.price).unwrap_or(u64::MAX);
        let magnitude = i64::try_from(magnitude).unwrap_or(i64::MAX);
        if current.price >= previous.price {
            magnitude
        } else {
            -magnitude
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Calculate deviation between two prices in basis points
    fn deviation_bps(old_price: FixedPoint, new_price: FixedPoint) -> Result<u64> {
        let diff = if new_price > old_price {
            new_price.raw() - old_price.raw()
        } else {
            old_price.raw() - new_price.raw()
        };
        let bps = mul_div_down(diff, BPS_DIVISOR as u128, old_price.raw())?;
        Ok(u64::try_from(bps).unwrap_or(u64::MAX))
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Compute state hash
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        if let Some(current) = &self.current {
            data.extend_from_slice(&current.price.raw().to_be_bytes());
            data.extend_from_slice(&current.timestamp.to_be_bytes());
            data.extend_from_slice(current.source.as_bytes());
        }
        Hash::sha256(&data)
    }
}

impl PriceOracle for PriceFeed {
    fn get_price(&self, now: u64) -> Result<FixedPoint> {
        self.get_validated_price(now)
    }
}
