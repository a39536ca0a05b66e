//! Liquidation engine.
//!
//! This module handles the liquidation of undercollateralized positions:
//! - Detection and prioritization of liquidatable positions
//! - Repay sizing under the close factor
//! - Collateral seizure with the liquidation bonus
//! - Shortfall handling (reject, or absorb as bad debt)
//! - Cumulative statistics

use serde::{Deserialize, Serialize};

use crate::core::accrual::DebtPool;
use crate::core::config::{CloseFactor, LiquidationParams, ShortfallPolicy};
use crate::core::ledger::{DebtChange, DebtLedger};
use crate::core::position::{Position, PositionHealth};
use crate::core::token::TokenAmount;
use crate::core::vault::{CollateralAmount, CollateralVault, VaultChange};
use crate::error::{Error, Result};
use crate::utils::constants::WAD;
use crate::utils::crypto::AccountId;
use crate::utils::math::{mul_div, mul_div_up, FixedPoint, Rounding};
use crate::utils::validation::validate_non_zero;

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION PLAN
// ═══════════════════════════════════════════════════════════════════════════════

/// A validated liquidation, ready to settle and apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationPlan {
    /// Account paying the debt and receiving collateral
    pub liquidator: AccountId,
    /// Position being liquidated
    pub account: AccountId,
    /// Price used for the whole liquidation
    pub price: FixedPoint,
    /// Position health before the liquidation
    pub health_before: PositionHealth,
    /// Debt asset the liquidator pays
    pub repay: TokenAmount,
    /// Collateral leaving custody to the liquidator
    pub collateral_seized: CollateralAmount,
    /// True when the collateral could not cover the bonus-adjusted repay
    pub shortfall: bool,
    /// Ledger change for the liquidated account
    pub debt_change: DebtChange,
    /// Vault change for the liquidated account
    pub vault_change: VaultChange,
}

impl LiquidationPlan {
    /// Debt written off as bad debt
    pub fn bad_debt(&self) -> TokenAmount {
        TokenAmount::from_raw(self.debt_change.written_off)
    }

    /// Summary returned to callers
    pub fn outcome(&self) -> LiquidationOutcome {
        LiquidationOutcome {
            account: self.account,
            liquidator: self.liquidator,
            price: self.price,
            debt_repaid: self.repay,
            collateral_seized: self.collateral_seized,
            bad_debt: self.bad_debt(),
            shortfall: self.shortfall,
            health_factor_before: self.health_before.health_factor,
            remaining_collateral: self.vault_change.balance_after,
            remaining_debt: TokenAmount::from_raw(self.debt_change.debt_after),
        }
    }
}

/// Result of a committed liquidation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    /// Position liquidated
    pub account: AccountId,
    /// Liquidator
    pub liquidator: AccountId,
    /// Price used
    pub price: FixedPoint,
    /// Debt repaid by the liquidator
    pub debt_repaid: TokenAmount,
    /// Collateral transferred to the liquidator
    pub collateral_seized: CollateralAmount,
    /// Debt written off
    pub bad_debt: TokenAmount,
    /// Whether the shortfall branch was taken
    pub shortfall: bool,
    /// Health factor before the liquidation
    pub health_factor_before: Option<FixedPoint>,
    /// Collateral left in the position
    pub remaining_collateral: CollateralAmount,
    /// Debt left in the position
    pub remaining_debt: TokenAmount,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATISTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Cumulative liquidation statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationStats {
    /// Total liquidations performed
    pub total_liquidations: u64,
    /// Liquidations that hit the shortfall branch
    pub shortfall_liquidations: u64,
    /// Total debt repaid by liquidators
    pub total_debt_repaid: TokenAmount,
    /// Total collateral seized
    pub total_collateral_seized: CollateralAmount,
    /// Total debt written off
    pub total_bad_debt: TokenAmount,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Plans liquidations and keeps their statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationEngine {
    stats: LiquidationStats,
}

impl LiquidationEngine {
    /// Create a new liquidation engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore an engine with existing statistics
    pub fn with_stats(stats: LiquidationStats) -> Self {
        Self { stats }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION DETECTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// All liquidatable positions, worst health first
    pub fn find_liquidatable(
        vault: &CollateralVault,
        ledger: &DebtLedger,
        pool: &DebtPool,
        price: FixedPoint,
        params: &LiquidationParams,
    ) -> Result<Vec<PositionHealth>> {
        let mut liquidatable = Vec::new();

        for (account, shares) in ledger.accounts() {
            let position = Position::new(vault.collateral_of(account), *shares);
            let health = PositionHealth::assess(
                *account,
                position,
                pool,
                price,
                params.min_collateral_ratio,
            )?;
            if !health.is_healthy() {
                liquidatable.push(health);
            }
        }

        liquidatable.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.account.cmp(&b.account))
        });
        Ok(liquidatable)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION PLANNING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Plan liquidating `account` with up to `repay_amount` of debt asset.
    ///
    /// Nothing is modified; the caller settles with the debt-asset ledger and
    /// then applies the vault and ledger changes.
    #[allow(clippy::too_many_arguments)]
    pub fn plan_liquidation(
        vault: &CollateralVault,
        ledger: &DebtLedger,
        pool: &DebtPool,
        params: &LiquidationParams,
        price: FixedPoint,
        liquidator: AccountId,
        account: AccountId,
        repay_amount: TokenAmount,
    ) -> Result<LiquidationPlan> {
        validate_non_zero(repay_amount.raw(), "repay amount")?;

        let collateral = vault.collateral_of(&account);
        let position = Position::new(collateral, ledger.shares_of(&account));
        let health_before =
            PositionHealth::assess(account, position, pool, price, params.min_collateral_ratio)?;
        if health_before.is_healthy() {
            return Err(Error::PositionHealthy(account.to_hex()));
        }

        let debt = health_before.debt;
        let mut repay = match params.close_factor {
            CloseFactor::Partial(fraction) => {
                let cap = mul_div_up(debt, fraction.raw(), WAD)?;
                repay_amount.raw().min(cap).min(debt)
            }
            CloseFactor::Full => {
                if repay_amount.raw() < debt {
                    return Err(Error::InvalidAmount(format!(
                        "full close factor requires repaying the whole debt of {}",
                        TokenAmount::from_raw(debt)
                    )));
                }
                debt
            }
        };

        // Seizure follows the debt the burn actually retires, not the request
        let burn = ledger.plan_burn(pool, account, repay)?;
        if burn.shares.is_zero() {
            return Err(Error::InvalidAmount(format!(
                "repay of {} retires no debt shares",
                TokenAmount::from_raw(repay)
            )));
        }
        let retired = if burn.account_shares_after.is_zero() {
            burn.amount
        } else {
            pool.shares_to_debt(burn.shares, Rounding::Down)?
        };

        let bonus_multiplier = params.bonus_multiplier()?;
        let mut seize = mul_div(retired, bonus_multiplier.raw(), price.raw(), Rounding::Down)?;
        let shortfall = seize > collateral.raw();

        if shortfall {
            match params.shortfall_policy {
                ShortfallPolicy::Reject => {
                    return Err(Error::InsufficientCollateralToSeize {
                        required: seize,
                        available: collateral.raw(),
                    });
                }
                ShortfallPolicy::AbsorbBadDebt => {
                    seize = collateral.raw();
                    let covered = mul_div_up(collateral.raw(), price.raw(), bonus_multiplier.raw())?;
                    repay = covered.min(repay);
                }
            }
        }

        let vault_change = vault.plan_seize(account, CollateralAmount::from_raw(seize))?;
        let write_off = params.shortfall_policy == ShortfallPolicy::AbsorbBadDebt
            && vault_change.balance_after.is_zero();
        let debt_change = if write_off {
            ledger.plan_write_off(pool, account, repay)?
        } else {
            burn
        };

        Ok(LiquidationPlan {
            liquidator,
            account,
            price,
            health_before,
            repay: TokenAmount::from_raw(debt_change.amount),
            collateral_seized: vault_change.amount,
            shortfall,
            debt_change,
            vault_change,
        })
    }

    /// Record a committed liquidation in the statistics
    pub fn record(&mut self, plan: &LiquidationPlan) {
        let stats = &mut self.stats;
        stats.total_liquidations = stats.total_liquidations.saturating_add(1);
        if plan.shortfall {
            stats.shortfall_liquidations = stats.shortfall_liquidations.saturating_add(1);
        }
        stats.total_debt_repaid = TokenAmount::from_raw(
            stats.total_debt_repaid.raw().saturating_add(plan.repay.raw()),
        );
        stats.total_collateral_seized = CollateralAmount::from_raw(
            stats
                .total_collateral_seized
                .raw()
                .saturating_add(plan.collateral_seized.raw()),
        );
        stats.total_bad_debt = TokenAmount::from_raw(
            stats.total_bad_debt.raw().saturating_add(plan.bad_debt().raw()),
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get total liquidations
    pub fn total_liquidations(&self) -> u64 {
        self.stats.total_liquidations
    }

    /// Get statistics
    pub fn statistics(&self) -> &LiquidationStats {
        &self.stats
    }
}
