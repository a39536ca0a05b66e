//! Position health.
//!
//! A position is the pair (collateral, debt shares) held by one account. It is
//! healthy when it owes nothing or when
//!
//! ```text
//! collateral * price >= current_debt * min_collateral_ratio
//! ```
//!
//! The comparison is done exactly in 256 bits; the health factor is reported
//! for display and ordering only.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::accrual::DebtPool;
use crate::core::ledger::DebtShares;
use crate::core::vault::CollateralAmount;
use crate::error::Result;
use crate::utils::constants::WAD;
use crate::utils::crypto::AccountId;
use crate::utils::math::{mul_div_down, wad_serde, FixedPoint, Rounding};

/// Liquidation state of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    /// At or above the minimum collateral ratio, or debt free
    Healthy,
    /// Below the minimum collateral ratio
    Liquidatable,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Healthy => write!(f, "healthy"),
            PositionStatus::Liquidatable => write!(f, "liquidatable"),
        }
    }
}

/// Stored state of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Collateral in custody
    pub collateral: CollateralAmount,
    /// Debt shares owed
    pub debt_shares: DebtShares,
}

impl Position {
    /// Create a position
    pub fn new(collateral: CollateralAmount, debt_shares: DebtShares) -> Self {
        Self {
            collateral,
            debt_shares,
        }
    }

    /// True for the (0, 0) position
    pub fn is_empty(&self) -> bool {
        self.collateral.is_zero() && self.debt_shares.is_zero()
    }
}

/// Health assessment of a position at one price and exchange rate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionHealth {
    /// Account assessed
    pub account: AccountId,
    /// Collateral in custody
    pub collateral: CollateralAmount,
    /// Debt shares owed
    pub debt_shares: DebtShares,
    /// Current debt, rounded up
    #[serde(with = "wad_serde")]
    pub debt: u128,
    /// Collateral value at the price, rounded down
    #[serde(with = "wad_serde")]
    pub collateral_value: u128,
    /// Largest debt the collateral supports
    #[serde(with = "wad_serde")]
    pub max_debt: u128,
    /// `collateral_value / debt`; `None` without debt
    pub collateral_ratio: Option<FixedPoint>,
    /// `(collateral_value / min_collateral_ratio) / debt`; `None` without debt
    pub health_factor: Option<FixedPoint>,
    /// Healthy or liquidatable
    pub status: PositionStatus,
}

impl PositionHealth {
    /// Assess a position against a pool, price and minimum collateral ratio
    pub fn assess(
        account: AccountId,
        position: Position,
        pool: &DebtPool,
        price: FixedPoint,
        min_collateral_ratio: FixedPoint,
    ) -> Result<Self> {
        let debt = pool.shares_to_debt(position.debt_shares, Rounding::Up)?;
        let collateral_value = position.collateral.value_at(price)?;
        Self::from_values(account, position, debt, collateral_value, min_collateral_ratio)
    }

    /// Build an assessment from already computed debt and collateral value
    pub fn from_values(
        account: AccountId,
        position: Position,
        debt: u128,
        collateral_value: u128,
        min_collateral_ratio: FixedPoint,
    ) -> Result<Self> {
        let max_debt = mul_div_down(collateral_value, WAD, min_collateral_ratio.raw())?;
        let status = if is_healthy(collateral_value, debt, min_collateral_ratio) {
            PositionStatus::Healthy
        } else {
            PositionStatus::Liquidatable
        };

        let (collateral_ratio, health_factor) = if debt == 0 {
            (None, None)
        } else {
            (
                Some(saturating_ratio(collateral_value, debt)),
                Some(saturating_ratio(max_debt, debt)),
            )
        };

        Ok(Self {
            account,
            collateral: position.collateral,
            debt_shares: position.debt_shares,
            debt,
            collateral_value,
            max_debt,
            collateral_ratio,
            health_factor,
            status,
        })
    }

    /// Shorthand for `status == Healthy`
    pub fn is_healthy(&self) -> bool {
        self.status == PositionStatus::Healthy
    }

    /// Health factor for ordering; debt-free positions sort last
    pub fn sort_key(&self) -> FixedPoint {
        self.health_factor
            .unwrap_or(FixedPoint::from_raw(u128::MAX))
    }
}

/// `debt == 0 || collateral_value >= debt * min_collateral_ratio`, exact
pub fn is_healthy(collateral_value: u128, debt: u128, min_collateral_ratio: FixedPoint) -> bool {
    if debt == 0 {
        return true;
    }
    U256::from(collateral_value) * U256::from(WAD)
        >= U256::from(debt) * U256::from(min_collateral_ratio.raw())
}

/// `numerator / denominator` as fixed point, clamped to `u128::MAX`
fn saturating_ratio(numerator: u128, denominator: u128) -> FixedPoint {
    let ratio = U256::from(numerator) * U256::from(WAD) / U256::from(denominator);
    FixedPoint::from_raw(u128::try_from(ratio).unwrap_or(u128::MAX))
}
