//! Interest rate model.
//!
//! A kinked (two-slope) borrow curve over utilization, plus the savings rate
//! derived from it. Everything here is pure and deterministic.
//!
//! ```text
//! rate
//!  │                      ╱ slope_high
//!  │                    ╱
//!  │           ______--╱  <- kink
//!  │   ___----  slope_low
//!  │──  base
//!  └──────────────────────── utilization
//! ```

use serde::{Deserialize, Serialize};

use crate::core::config::{RateParams, UtilizationBasis};
use crate::error::Result;
use crate::utils::constants::{SECONDS_PER_YEAR, WAD};
use crate::utils::math::{mul_div_down, FixedPoint, Rounding};

/// Point-in-time view of the rate curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Utilization in `[0, 1]`
    pub utilization: FixedPoint,
    /// Borrow rate charged per second
    pub borrow_rate_per_second: FixedPoint,
    /// Savings rate paid per second
    pub savings_rate_per_second: FixedPoint,
    /// Per-second borrow rate times seconds per year
    pub borrow_apr: FixedPoint,
    /// Per-second savings rate times seconds per year
    pub savings_apr: FixedPoint,
}

/// Kinked interest rate model over a [`RateParams`] set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestRateModel {
    params: RateParams,
}

impl InterestRateModel {
    /// Create a model over the given parameters
    pub fn new(params: RateParams) -> Self {
        Self { params }
    }

    /// Parameters in use
    pub fn params(&self) -> &RateParams {
        &self.params
    }

    /// `total_debt / denominator`, clamped to `[0, 1]`.
    ///
    /// A zero denominator reads as empty when there is no debt and as fully
    /// utilized otherwise.
    pub fn utilization(total_debt: u128, denominator: u128) -> Result<FixedPoint> {
        if denominator == 0 {
            return Ok(if total_debt == 0 {
                FixedPoint::ZERO
            } else {
                FixedPoint::ONE
            });
        }
        if total_debt >= denominator {
            return Ok(FixedPoint::ONE);
        }
        let ratio = mul_div_down(total_debt, WAD, denominator)?;
        Ok(FixedPoint::from_raw(ratio.min(WAD)))
    }

    /// Utilization measured against the configured basis
    pub fn utilization_for(&self, total_debt: u128, collateral_value: u128) -> Result<FixedPoint> {
        let denominator = match self.params.utilization_basis {
            UtilizationBasis::CollateralValue => collateral_value,
            UtilizationBasis::DebtCeiling { ceiling } => ceiling.raw(),
        };
        Self::utilization(total_debt, denominator)
    }

    /// Annualized borrow rate at `utilization`
    pub fn annual_borrow_rate(&self, utilization: FixedPoint) -> Result<FixedPoint> {
        let p = &self.params;
        match p.kink {
            Some(kink) if utilization > kink => {
                let below = p.slope_low.mul(kink, Rounding::Down)?;
                let excess = utilization.saturating_sub(kink);
                let above = p.slope_high.mul(excess, Rounding::Down)?;
                p.base_rate.checked_add(below)?.checked_add(above)
            }
            _ => {
                let linear = p.slope_low.mul(utilization, Rounding::Down)?;
                p.base_rate.checked_add(linear)
            }
        }
    }

    /// Per-second borrow rate, capped at `max_borrow_rate_per_second`
    pub fn borrow_rate(&self, utilization: FixedPoint) -> Result<FixedPoint> {
        let annual = self.annual_borrow_rate(utilization)?;
        let per_second = FixedPoint::from_raw(annual.raw() / SECONDS_PER_YEAR);
        Ok(per_second.min(self.params.max_borrow_rate_per_second))
    }

    /// `borrow_rate * utilization * (1 - reserve_factor)`
    pub fn savings_rate(&self, utilization: FixedPoint, borrow_rate: FixedPoint) -> Result<FixedPoint> {
        let depositor_share = FixedPoint::ONE.saturating_sub(self.params.reserve_factor);
        borrow_rate
            .mul(utilization, Rounding::Down)?
            .mul(depositor_share, Rounding::Down)
    }

    /// Full rate view for the given pool debt and collateral value
    pub fn snapshot(&self, total_debt: u128, collateral_value: u128) -> Result<RateSnapshot> {
        let utilization = self.utilization_for(total_debt, collateral_value)?;
        let borrow = self.borrow_rate(utilization)?;
        let savings = self.savings_rate(utilization, borrow)?;
        let year = SECONDS_PER_YEAR as u64;
        Ok(RateSnapshot {
            utilization,
            borrow_rate_per_second: borrow,
            savings_rate_per_second: savings,
            borrow_apr: borrow.mul_int(year)?,
            savings_apr: savings.mul_int(year)?,
        })
    }
}
