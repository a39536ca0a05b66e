//! Global exchange-rate accrual.
//!
//! Debt is recorded in shares. One [`DebtPool`] holds the exchange rate that
//! converts shares to debt, and interest accrues by growing that rate:
//!
//! ```text
//! exchange_rate += exchange_rate * borrow_rate_per_second * elapsed
//! ```
//!
//! so every position's debt grows together without touching any position.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::ledger::DebtShares;
use crate::error::{Error, Result};
use crate::utils::constants::WAD;
use crate::utils::math::{checked_add, mul_div, mul_div_down, wad_serde, FixedPoint, Rounding};

/// Outcome of one accrual step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualReport {
    /// Seconds covered by the step
    pub elapsed: u64,
    /// Rate applied
    pub borrow_rate_per_second: FixedPoint,
    /// Exchange rate before the step
    pub previous_rate: FixedPoint,
    /// Exchange rate after the step
    pub new_rate: FixedPoint,
    /// Growth of total debt
    #[serde(with = "wad_serde")]
    pub interest: u128,
    /// Part of the interest kept as reserves
    #[serde(with = "wad_serde")]
    pub reserves_added: u128,
}

impl AccrualReport {
    /// True when the step changed nothing
    pub fn is_noop(&self) -> bool {
        self.previous_rate == self.new_rate && self.reserves_added == 0
    }
}

/// The singleton debt pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtPool {
    /// Sum of every account's debt shares
    pub total_debt_shares: DebtShares,

    /// Debt per share; starts at 1.0 and never decreases
    pub exchange_rate: FixedPoint,

    /// Last time interest was accrued (unix seconds)
    pub last_accrual_timestamp: u64,

    /// Protocol share of accrued interest
    #[serde(with = "wad_serde")]
    pub total_reserves: u128,

    /// Debt written off by liquidation shortfalls
    #[serde(with = "wad_serde")]
    pub bad_debt: u128,
}

impl DebtPool {
    /// A fresh pool with exchange rate 1.0 anchored at `now`
    pub fn initialize(now: u64) -> Self {
        Self {
            total_debt_shares: DebtShares::ZERO,
            exchange_rate: FixedPoint::ONE,
            last_accrual_timestamp: now,
            total_reserves: 0,
            bad_debt: 0,
        }
    }

    /// Convert shares to debt at the current rate
    pub fn shares_to_debt(&self, shares: DebtShares, rounding: Rounding) -> Result<u128> {
        mul_div(shares.raw(), self.exchange_rate.raw(), WAD, rounding)
    }

    /// Convert a debt amount to shares at the current rate
    pub fn debt_to_shares(&self, amount: u128, rounding: Rounding) -> Result<DebtShares> {
        mul_div(amount, WAD, self.exchange_rate.raw(), rounding).map(DebtShares::from_raw)
    }

    /// Total debt owed across all shares, rounded up
    pub fn total_debt(&self) -> Result<u128> {
        self.shares_to_debt(self.total_debt_shares, Rounding::Up)
    }

    /// Bring the exchange rate current.
    ///
    /// A `now` at or before the last accrual is a no-op; the timestamp never
    /// moves backwards. The pool is only modified once every value is computed.
    pub fn accrue(
        &mut self,
        now: u64,
        borrow_rate_per_second: FixedPoint,
        reserve_factor: FixedPoint,
    ) -> Result<AccrualReport> {
        let elapsed = now.saturating_sub(self.last_accrual_timestamp);
        let previous_rate = self.exchange_rate;

        if elapsed == 0 {
            return Ok(AccrualReport {
                elapsed: 0,
                borrow_rate_per_second,
                previous_rate,
                new_rate: previous_rate,
                interest: 0,
                reserves_added: 0,
            });
        }

        let growth = borrow_rate_per_second.mul_int(elapsed)?;
        let delta = mul_div_down(previous_rate.raw(), growth.raw(), WAD)?;
        let new_rate = FixedPoint::from_raw(checked_add(
            previous_rate.raw(),
            delta,
            "exchange rate accrual",
        )?);

        let shares = self.total_debt_shares.raw();
        let debt_before = mul_div_down(shares, previous_rate.raw(), WAD)?;
        let debt_after = mul_div_down(shares, new_rate.raw(), WAD)?;
        let interest = debt_after.saturating_sub(debt_before);
        let reserves_added = mul_div_down(interest, reserve_factor.raw(), WAD)?;
        let total_reserves = checked_add(self.total_reserves, reserves_added, "reserve accrual")?;

        self.exchange_rate = new_rate;
        self.last_accrual_timestamp = now;
        self.total_reserves = total_reserves;

        debug!(
            elapsed,
            previous_rate = %previous_rate,
            new_rate = %new_rate,
            interest,
            "accrued interest"
        );

        Ok(AccrualReport {
            elapsed,
            borrow_rate_per_second,
            previous_rate,
            new_rate,
            interest,
            reserves_added,
        })
    }

    /// Record debt that will never be repaid
    pub fn with_bad_debt(&self, amount: u128) -> Result<u128> {
        checked_add(self.bad_debt, amount, "bad debt")
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl Default for DebtPool {
    fn default() -> Self {
        Self::initialize(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1e10 raw per second over 2e7 seconds is exactly +0.2
    const RATE: FixedPoint = FixedPoint::from_raw(10_000_000_000);

    fn pool_with_debt(debt_whole: u64) -> DebtPool {
        let mut pool = DebtPool::initialize(1_000);
        pool.total_debt_shares = DebtShares::from_raw(FixedPoint::from_integer(debt_whole).raw());
        pool
    }

    #[test]
    fn test_initialize() {
        let pool = DebtPool::initialize(42);
        assert_eq!(pool.exchange_rate, FixedPoint::ONE);
        assert_eq!(pool.last_accrual_timestamp, 42);
        assert!(pool.total_debt_shares.is_zero());
        assert_eq!(pool.total_debt().unwrap(), 0);
    }

    #[test]
    fn test_accrue_exact_growth() {
        let mut pool = pool_with_debt(1_000);
        let report = pool.accrue(1_000 + 20_000_000, RATE, FixedPoint::ZERO).unwrap();

        assert_eq!(pool.exchange_rate, FixedPoint::from_percentage(120));
        assert_eq!(report.elapsed, 20_000_000);
        assert_eq!(report.interest, FixedPoint::from_integer(200).raw());
        assert_eq!(pool.total_debt().unwrap(), FixedPoint::from_integer(1_200).raw());
        assert_eq!(pool.last_accrual_timestamp, 20_001_000);
    }

    #[test]
    fn test_accrue_zero_elapsed_is_noop() {
        let mut pool = pool_with_debt(1_000);
        let before = pool.clone();
        let report = pool.accrue(1_000, RATE, FixedPoint::ZERO).unwrap();
        assert!(report.is_noop());
        assert_eq!(pool, before);
    }

    #[test]
    fn test_accrue_backwards_clock_does_not_rewind() {
        let mut pool = pool_with_debt(1_000);
        pool.accrue(5_000, RATE, FixedPoint::ZERO).unwrap();
        let after_forward = pool.clone();

        let report = pool.accrue(2_000, RATE, FixedPoint::ZERO).unwrap();
        assert!(report.is_noop());
        assert_eq!(pool, after_forward);
        assert_eq!(pool.last_accrual_timestamp, 5_000);
    }

    #[test]
    fn test_accrue_zero_rate_moves_timestamp() {
        let mut pool = pool_with_debt(1_000);
        pool.accrue(9_000, FixedPoint::ZERO, FixedPoint::ZERO).unwrap();
        assert_eq!(pool.exchange_rate, FixedPoint::ONE);
        assert_eq!(pool.last_accrual_timestamp, 9_000);
    }

    #[test]
    fn test_reserves_accumulate() {
        let mut pool = pool_with_debt(1_000);
        pool.accrue(1_000 + 20_000_000, RATE, FixedPoint::from_percentage(10))
            .unwrap();
        // 10% of 200 interest
        assert_eq!(pool.total_reserves, FixedPoint::from_integer(20).raw());
    }

    #[test]
    fn test_accrue_overflow_leaves_pool_untouched() {
        let mut pool = pool_with_debt(1_000);
        let before = pool.clone();
        let result = pool.accrue(u64::MAX, FixedPoint::from_raw(u128::MAX / 2), FixedPoint::ZERO);
        assert!(result.unwrap_err().is_invalid_amount());
        assert_eq!(pool, before);
    }

    #[test]
    fn test_share_conversions_round() {
        let mut pool = DebtPool::initialize(0);
        pool.exchange_rate = FixedPoint::from_raw(3 * WAD);

        assert_eq!(pool.debt_to_shares(10, Rounding::Down).unwrap().raw(), 3);
        assert_eq!(pool.debt_to_shares(10, Rounding::Up).unwrap().raw(), 4);
        assert_eq!(pool.shares_to_debt(DebtShares::from_raw(3), Rounding::Up).unwrap(), 9);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let mut pool = pool_with_debt(10);
        pool.bad_debt = 7;
        let restored = DebtPool::from_bytes(&pool.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, pool);
    }
}
