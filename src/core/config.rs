//! Engine configuration and parameters.
//!
//! This module defines every tunable parameter of the engine. Parameters are
//! divided into:
//! - Rate parameters: the kinked borrow curve and reserve factor
//! - Liquidation parameters: collateral ratio, bonus, close factor, shortfall policy
//! - Bookkeeping: event log bound
//!
//! An [`EngineConfig`] is always validated as a whole before the engine uses it.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::math::FixedPoint;
use crate::utils::validation::{
    validate_fraction, validate_open_fraction, validate_positive_fraction,
    validate_ratio_above_one,
};

/// Environment variable overriding the minimum collateral ratio
pub const ENV_MIN_COLLATERAL_RATIO: &str = "MYUSD_MIN_COLLATERAL_RATIO";
/// Environment variable overriding the liquidation bonus
pub const ENV_LIQUIDATION_BONUS: &str = "MYUSD_LIQUIDATION_BONUS";
/// Environment variable overriding the reserve factor
pub const ENV_RESERVE_FACTOR: &str = "MYUSD_RESERVE_FACTOR";
/// Environment variable overriding the annual base rate
pub const ENV_BASE_RATE: &str = "MYUSD_BASE_RATE";

// ═══════════════════════════════════════════════════════════════════════════════
// RATE PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// What utilization is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationBasis {
    /// Total debt over total collateral value at the current price
    CollateralValue,
    /// Total debt over a fixed system debt ceiling
    DebtCeiling {
        /// Debt ceiling in debt-asset units
        ceiling: FixedPoint,
    },
}

/// Interest rate curve parameters (annualized)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateParams {
    /// Borrow rate at zero utilization
    pub base_rate: FixedPoint,

    /// Rate added per unit of utilization up to the kink
    pub slope_low: FixedPoint,

    /// Rate added per unit of utilization above the kink
    pub slope_high: FixedPoint,

    /// Utilization at which the curve steepens; `None` gives a single line
    pub kink: Option<FixedPoint>,

    /// Share of accrued interest kept as protocol reserves
    pub reserve_factor: FixedPoint,

    /// Denominator used for utilization
    pub utilization_basis: UtilizationBasis,

    /// Hard ceiling on the per-second borrow rate
    pub max_borrow_rate_per_second: FixedPoint,
}

impl Default for RateParams {
    fn default() -> Self {
        Self {
            base_rate: FixedPoint::from_raw(DEFAULT_BASE_RATE),
            slope_low: FixedPoint::from_raw(DEFAULT_SLOPE_LOW),
            slope_high: FixedPoint::from_raw(DEFAULT_SLOPE_HIGH),
            kink: Some(FixedPoint::from_raw(DEFAULT_KINK)),
            reserve_factor: FixedPoint::from_raw(DEFAULT_RESERVE_FACTOR),
            utilization_basis: UtilizationBasis::CollateralValue,
            max_borrow_rate_per_second: FixedPoint::from_raw(MAX_BORROW_RATE_PER_SECOND),
        }
    }
}

impl RateParams {
    /// A flat curve charging `annual_rate` regardless of utilization
    pub fn flat(annual_rate: FixedPoint) -> Self {
        Self {
            base_rate: annual_rate,
            slope_low: FixedPoint::ZERO,
            slope_high: FixedPoint::ZERO,
            kink: None,
            reserve_factor: FixedPoint::ZERO,
            ..Default::default()
        }
    }

    /// Zero interest; useful when only collateral mechanics matter
    pub fn zero() -> Self {
        Self::flat(FixedPoint::ZERO)
    }

    /// Set the reserve factor
    pub fn with_reserve_factor(mut self, reserve_factor: FixedPoint) -> Self {
        self.reserve_factor = reserve_factor;
        self
    }

    /// Set the utilization basis
    pub fn with_utilization_basis(mut self, basis: UtilizationBasis) -> Self {
        self.utilization_basis = basis;
        self
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<()> {
        if let Some(kink) = self.kink {
            validate_open_fraction(kink.raw(), "kink")?;
        }
        validate_fraction(self.reserve_factor.raw(), "reserve_factor")?;
        if self.max_borrow_rate_per_second.is_zero() {
            return Err(Error::InvalidParameter {
                name: "max_borrow_rate_per_second".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if let UtilizationBasis::DebtCeiling { ceiling } = self.utilization_basis {
            if ceiling.is_zero() {
                return Err(Error::InvalidParameter {
                    name: "utilization_basis.ceiling".into(),
                    reason: "debt ceiling must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// How much of a position's debt one liquidation may repay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseFactor {
    /// The whole debt must be repaid at once
    Full,
    /// At most this fraction of the current debt per call
    Partial(FixedPoint),
}

/// What happens when the bonus-adjusted seizure exceeds the collateral held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    /// Seize everything and write the uncovered debt off as bad debt
    #[default]
    AbsorbBadDebt,
    /// Refuse the liquidation
    Reject,
}

/// Liquidation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationParams {
    /// Minimum collateral ratio (MCR); below it a position is liquidatable
    pub min_collateral_ratio: FixedPoint,

    /// Extra collateral paid to the liquidator, as a fraction of the repay value
    pub liquidation_bonus: FixedPoint,

    /// Repay cap per liquidation
    pub close_factor: CloseFactor,

    /// Handling of positions whose collateral cannot cover the bonus
    pub shortfall_policy: ShortfallPolicy,
}

impl Default for LiquidationParams {
    fn default() -> Self {
        Self {
            min_collateral_ratio: FixedPoint::from_raw(DEFAULT_MIN_COLLATERAL_RATIO),
            liquidation_bonus: FixedPoint::from_raw(DEFAULT_LIQUIDATION_BONUS),
            close_factor: CloseFactor::Partial(FixedPoint::from_raw(DEFAULT_CLOSE_FACTOR)),
            shortfall_policy: ShortfallPolicy::AbsorbBadDebt,
        }
    }
}

impl LiquidationParams {
    /// Set a custom MCR
    pub fn with_mcr(mut self, mcr: FixedPoint) -> Self {
        self.min_collateral_ratio = mcr;
        self
    }

    /// Set a custom liquidation bonus
    pub fn with_bonus(mut self, bonus: FixedPoint) -> Self {
        self.liquidation_bonus = bonus;
        self
    }

    /// Set the close factor
    pub fn with_close_factor(mut self, close_factor: CloseFactor) -> Self {
        self.close_factor = close_factor;
        self
    }

    /// Set the shortfall policy
    pub fn with_shortfall_policy(mut self, policy: ShortfallPolicy) -> Self {
        self.shortfall_policy = policy;
        self
    }

    /// `1 + liquidation_bonus`
    pub fn bonus_multiplier(&self) -> Result<FixedPoint> {
        FixedPoint::ONE.checked_add(self.liquidation_bonus)
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<()> {
        validate_ratio_above_one(self.min_collateral_ratio.raw(), "min_collateral_ratio")?;
        if self.liquidation_bonus.raw() >= WAD {
            return Err(Error::InvalidParameter {
                name: "liquidation_bonus".into(),
                reason: format!("{} must be less than 1", self.liquidation_bonus),
            });
        }
        if let CloseFactor::Partial(fraction) = self.close_factor {
            validate_positive_fraction(fraction.raw(), "close_factor")?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interest rate curve
    pub rates: RateParams,

    /// Liquidation rules
    pub liquidation: LiquidationParams,

    /// Events kept in memory before the oldest are pruned
    pub max_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rates: RateParams::default(),
            liquidation: LiquidationParams::default(),
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl EngineConfig {
    /// Create a configuration from its parts
    pub fn new(rates: RateParams, liquidation: LiquidationParams) -> Self {
        Self {
            rates,
            liquidation,
            ..Default::default()
        }
    }

    /// Replace the rate parameters
    pub fn with_rates(mut self, rates: RateParams) -> Self {
        self.rates = rates;
        self
    }

    /// Replace the liquidation parameters
    pub fn with_liquidation(mut self, liquidation: LiquidationParams) -> Self {
        self.liquidation = liquidation;
        self
    }

    /// Validate the whole parameter set
    pub fn validate(&self) -> Result<()> {
        self.rates.validate()?;
        self.liquidation.validate()?;
        if self.max_events == 0 {
            return Err(Error::InvalidParameter {
                name: "max_events".into(),
                reason: "must keep at least one event".into(),
            });
        }
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Deserialization(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| Error::Storage(format!("write {}: {}", path.display(), e)))
    }

    /// Apply `MYUSD_*` overrides from the process environment
    pub fn apply_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup, then re-validate
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MIN_COLLATERAL_RATIO) {
            self.liquidation.min_collateral_ratio = value.parse()?;
        }
        if let Some(value) = lookup(ENV_LIQUIDATION_BONUS) {
            self.liquidation.liquidation_bonus = value.parse()?;
        }
        if let Some(value) = lookup(ENV_RESERVE_FACTOR) {
            self.rates.reserve_factor = value.parse()?;
        }
        if let Some(value) = lookup(ENV_BASE_RATE) {
            self.rates.base_rate = value.parse()?;
        }
        self.validate()?;
        Ok(self)
    }
}
