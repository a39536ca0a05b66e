//! Stablecoin engine - the atomic public operations.
//!
//! The engine is the central coordinator. Every mutating operation:
//!
//! 1. reads the clock and the oracle once,
//! 2. accrues interest into a staged copy of the debt pool,
//! 3. plans its vault and ledger changes against the staged pool,
//! 4. validates position health,
//! 5. settles with the debt-asset ledger,
//! 6. applies everything with infallible writes.
//!
//! Any failure before step 6 leaves the engine exactly as it was.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::core::accrual::{AccrualReport, DebtPool};
use crate::core::config::{EngineConfig, LiquidationParams, RateParams};
use crate::core::ledger::DebtLedger;
use crate::core::position::{Position, PositionHealth};
use crate::core::rates::{InterestRateModel, RateSnapshot};
use crate::core::token::{DebtAssetLedger, TokenAmount};
use crate::core::vault::{CollateralAmount, CollateralVault};
use crate::error::{Error, Result};
use crate::liquidation::engine::{LiquidationEngine, LiquidationOutcome, LiquidationStats};
use crate::oracle::price_feed::PriceOracle;
use crate::protocol::events::*;
use crate::utils::constants::WAD_DECIMALS;
use crate::utils::crypto::{AccountId, Hash};
use crate::utils::math::{mul_div_up, wad_serde, FixedPoint, Rounding};
use crate::utils::time::Clock;

// ═══════════════════════════════════════════════════════════════════════════════
// RECEIPTS AND SNAPSHOTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a committed position operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReceipt {
    /// Account operated on
    pub account: AccountId,
    /// Effective amount (collateral for deposit/withdraw, debt asset for mint/burn)
    #[serde(with = "wad_serde")]
    pub amount: u128,
    /// Position health after the operation
    pub health: PositionHealth,
    /// Exchange rate the operation ran at
    pub exchange_rate: FixedPoint,
    /// Price the operation ran at
    pub price: FixedPoint,
    /// Operation time
    pub timestamp: u64,
}

/// Everything needed to rebuild an engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Fixed-point scale the values were written with
    pub decimals: u32,
    /// Engine configuration
    pub config: EngineConfig,
    /// Global debt pool
    pub pool: DebtPool,
    /// Non-empty positions by account
    pub positions: BTreeMap<AccountId, Position>,
    /// Cumulative liquidation statistics
    pub liquidation_stats: LiquidationStats,
}

/// Clock, price and accrued pool shared by one operation
struct Staged {
    now: u64,
    price: FixedPoint,
    pool: DebtPool,
    accrual: AccrualReport,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Over-collateralized, share-based stablecoin engine
pub struct StablecoinEngine<O, C, T>
where
    O: PriceOracle,
    C: Clock,
    T: DebtAssetLedger,
{
    config: EngineConfig,
    rate_model: InterestRateModel,
    pool: DebtPool,
    vault: CollateralVault,
    ledger: DebtLedger,
    liquidations: LiquidationEngine,
    events: EventLog,
    oracle: O,
    clock: C,
    token: T,
}

impl<O, C, T> StablecoinEngine<O, C, T>
where
    O: PriceOracle,
    C: Clock,
    T: DebtAssetLedger,
{
    /// Create an empty engine anchored at the clock's current time
    pub fn new(config: EngineConfig, oracle: O, clock: C, token: T) -> Result<Self> {
        config.validate()?;
        let pool = DebtPool::initialize(clock.now());

        Ok(Self {
            rate_model: InterestRateModel::new(config.rates.clone()),
            events: EventLog::new(config.max_events),
            config,
            pool,
            vault: CollateralVault::new(),
            ledger: DebtLedger::new(),
            liquidations: LiquidationEngine::new(),
            oracle,
            clock,
            token,
        })
    }

    /// Rebuild an engine from a snapshot
    pub fn from_snapshot(snapshot: EngineSnapshot, oracle: O, clock: C, token: T) -> Result<Self> {
        if snapshot.decimals != WAD_DECIMALS {
            return Err(Error::Deserialization(format!(
                "snapshot uses {} decimals, engine uses {}",
                snapshot.decimals, WAD_DECIMALS
            )));
        }
        snapshot.config.validate()?;

        let mut vault = CollateralVault::new();
        let mut ledger = DebtLedger::new();
        for (account, position) in &snapshot.positions {
            vault.restore(*account, position.collateral)?;
            ledger.restore(*account, position.debt_shares);
        }
        if !ledger.verify_invariant(&snapshot.pool) {
            return Err(Error::InvariantViolation(
                "persisted share total does not match positions".into(),
            ));
        }

        Ok(Self {
            rate_model: InterestRateModel::new(snapshot.config.rates.clone()),
            events: EventLog::new(snapshot.config.max_events),
            config: snapshot.config,
            pool: snapshot.pool,
            vault,
            ledger,
            liquidations: LiquidationEngine::with_stats(snapshot.liquidation_stats),
            oracle,
            clock,
            token,
        })
    }

    /// Capture the persistent state
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            decimals: WAD_DECIMALS,
            config: self.config.clone(),
            pool: self.pool.clone(),
            positions: self.positions(),
            liquidation_stats: self.liquidations.statistics().clone(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COLLATERAL OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit collateral into `account`'s position
    pub fn deposit(&mut self, account: AccountId, amount: CollateralAmount) -> Result<OperationReceipt> {
        let staged = self.stage()?;
        let change = self.vault.plan_deposit(account, amount)?;

        let shares = self.ledger.shares_of(&account);
        let debt = staged.pool.shares_to_debt(shares, Rounding::Up)?;
        let health = PositionHealth::from_values(
            account,
            Position::new(change.balance_after, shares),
            debt,
            change.balance_after.value_at(staged.price)?,
            self.config.liquidation.min_collateral_ratio,
        )?;

        self.commit_pool(&staged);
        self.vault.apply(&change);
        self.events.push(EngineEvent::CollateralDeposited(CollateralDepositedEvent {
            account,
            amount,
            new_total: change.balance_after,
            timestamp: staged.now,
        }));

        info!(account = %account.short(), amount = %amount, "collateral deposited");
        Ok(self.receipt(account, amount.raw(), health, &staged))
    }

    /// Withdraw collateral, keeping the position healthy
    pub fn withdraw(&mut self, account: AccountId, amount: CollateralAmount) -> Result<OperationReceipt> {
        let staged = self.stage()?;
        let change = self.vault.plan_withdraw(account, amount)?;

        let shares = self.ledger.shares_of(&account);
        let debt = staged.pool.shares_to_debt(shares, Rounding::Up)?;
        let mcr = self.config.liquidation.min_collateral_ratio;
        let health = PositionHealth::from_values(
            account,
            Position::new(change.balance_after, shares),
            debt,
            change.balance_after.value_at(staged.price)?,
            mcr,
        )?;

        if !health.is_healthy() {
            let required = mul_div_up(debt, mcr.raw(), staged.price.raw())?;
            warn!(
                account = %account.short(),
                amount = %amount,
                "withdrawal rejected: would undercollateralize"
            );
            return Err(Error::InsufficientCollateral {
                required,
                available: change.balance_after.raw(),
            });
        }

        self.commit_pool(&staged);
        self.vault.apply(&change);
        self.events.push(EngineEvent::CollateralWithdrawn(CollateralWithdrawnEvent {
            account,
            amount,
            new_total: change.balance_after,
            price: staged.price,
            timestamp: staged.now,
        }));

        info!(account = %account.short(), amount = %amount, "collateral withdrawn");
        Ok(self.receipt(account, amount.raw(), health, &staged))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEBT OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Mint `amount` of debt asset against `account`'s collateral
    pub fn mint(&mut self, account: AccountId, amount: TokenAmount) -> Result<OperationReceipt> {
        let staged = self.stage()?;
        let change = self.ledger.plan_mint(&staged.pool, account, amount.raw())?;

        let collateral = self.vault.collateral_of(&account);
        let health = PositionHealth::from_values(
            account,
            Position::new(collateral, change.account_shares_after),
            change.debt_after,
            collateral.value_at(staged.price)?,
            self.config.liquidation.min_collateral_ratio,
        )?;
        if !health.is_healthy() {
            warn!(account = %account.short(), amount = %amount, "mint rejected: undercollateralized");
            return Err(Error::UndercollateralizedMint {
                debt: change.debt_after,
                max_debt: health.max_debt,
            });
        }

        self.token.credit_account(&account, amount)?;

        self.commit_pool(&staged);
        self.ledger.apply(&mut self.pool, &change);
        self.events.push(EngineEvent::DebtMinted(DebtMintedEvent {
            account,
            amount,
            shares: change.shares,
            new_debt: TokenAmount::from_raw(change.debt_after),
            exchange_rate: staged.pool.exchange_rate,
            timestamp: staged.now,
        }));

        info!(
            account = %account.short(),
            amount = %amount,
            shares = %change.shares,
            "debt minted"
        );
        Ok(self.receipt(account, amount.raw(), health, &staged))
    }

    /// Repay up to `amount` of `account`'s debt; the excess is ignored
    pub fn burn(&mut self, account: AccountId, amount: TokenAmount) -> Result<OperationReceipt> {
        let staged = self.stage()?;
        let change = self.ledger.plan_burn(&staged.pool, account, amount.raw())?;
        let repaid = TokenAmount::from_raw(change.amount);

        let collateral = self.vault.collateral_of(&account);
        let health = PositionHealth::from_values(
            account,
            Position::new(collateral, change.account_shares_after),
            change.debt_after,
            collateral.value_at(staged.price)?,
            self.config.liquidation.min_collateral_ratio,
        )?;

        self.token.debit_account(&account, repaid)?;

        self.commit_pool(&staged);
        self.ledger.apply(&mut self.pool, &change);
        self.events.push(EngineEvent::DebtRepaid(DebtRepaidEvent {
            account,
            amount: repaid,
            shares: change.shares,
            remaining_debt: TokenAmount::from_raw(change.debt_after),
            exchange_rate: staged.pool.exchange_rate,
            timestamp: staged.now,
        }));

        info!(
            account = %account.short(),
            requested = %amount,
            repaid = %repaid,
            "debt repaid"
        );
        Ok(self.receipt(account, repaid.raw(), health, &staged))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Liquidate `account`, with `liquidator` repaying up to `repay_amount`
    pub fn liquidate(
        &mut self,
        liquidator: AccountId,
        account: AccountId,
        repay_amount: TokenAmount,
    ) -> Result<LiquidationOutcome> {
        let staged = self.stage()?;

        let plan = LiquidationEngine::plan_liquidation(
            &self.vault,
            &self.ledger,
            &staged.pool,
            &self.config.liquidation,
            staged.price,
            liquidator,
            account,
            repay_amount,
        )
        .map_err(|e| {
            warn!(account = %account.short(), error = %e, "liquidation rejected");
            e
        })?;

        if !plan.repay.is_zero() {
            self.token.debit_account(&liquidator, plan.repay)?;
        }

        self.commit_pool(&staged);
        self.vault.apply(&plan.vault_change);
        self.ledger.apply(&mut self.pool, &plan.debt_change);
        self.liquidations.record(&plan);

        let outcome = plan.outcome();
        self.events.push(EngineEvent::PositionLiquidated(PositionLiquidatedEvent {
            account,
            liquidator,
            debt_repaid: outcome.debt_repaid,
            collateral_seized: outcome.collateral_seized,
            bad_debt: outcome.bad_debt,
            price: staged.price,
            health_factor: outcome.health_factor_before,
            timestamp: staged.now,
        }));

        if !outcome.bad_debt.is_zero() {
            warn!(
                account = %account.short(),
                bad_debt = %outcome.bad_debt,
                "liquidation shortfall written off as bad debt"
            );
        }
        info!(
            account = %account.short(),
            liquidator = %liquidator.short(),
            repaid = %outcome.debt_repaid,
            seized = %outcome.collateral_seized,
            "position liquidated"
        );
        Ok(outcome)
    }

    /// Liquidatable positions at the current price, worst first
    pub fn liquidatable_accounts(&self) -> Result<Vec<PositionHealth>> {
        let staged = self.stage()?;
        LiquidationEngine::find_liquidatable(
            &self.vault,
            &self.ledger,
            &staged.pool,
            staged.price,
            &self.config.liquidation,
        )
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION AND ACCRUAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Replace the configuration, accruing under the old parameters first
    pub fn update_config(&mut self, config: EngineConfig) -> Result<AccrualReport> {
        config.validate()?;
        let staged = self.stage()?;

        let previous = std::mem::replace(&mut self.config, config.clone());
        self.commit_pool(&staged);
        self.rate_model = InterestRateModel::new(config.rates.clone());
        self.events.set_max_events(config.max_events);
        self.events.push(EngineEvent::ConfigUpdated(ConfigUpdatedEvent {
            previous: Box::new(previous),
            current: Box::new(config),
            timestamp: staged.now,
        }));

        info!(exchange_rate = %self.pool.exchange_rate, "configuration updated");
        Ok(staged.accrual)
    }

    /// Bring the exchange rate current without any other change
    pub fn accrue(&mut self) -> Result<AccrualReport> {
        let staged = self.stage()?;
        self.commit_pool(&staged);
        Ok(staged.accrual)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Stored position of an account; unknown accounts read as empty
    pub fn position(&self, account: &AccountId) -> Position {
        Position::new(
            self.vault.collateral_of(account),
            self.ledger.shares_of(account),
        )
    }

    /// All non-empty positions
    pub fn positions(&self) -> BTreeMap<AccountId, Position> {
        let mut positions: BTreeMap<AccountId, Position> = BTreeMap::new();
        for (account, collateral) in self.vault.accounts() {
            positions.entry(*account).or_default().collateral = *collateral;
        }
        for (account, shares) in self.ledger.accounts() {
            positions.entry(*account).or_default().debt_shares = *shares;
        }
        positions
    }

    /// Debt owed now, with interest projected to the current time
    pub fn current_debt(&self, account: &AccountId) -> Result<TokenAmount> {
        let staged = self.stage()?;
        self.ledger
            .current_debt(&staged.pool, account)
            .map(TokenAmount::from_raw)
    }

    /// Health of an account at the current price and projected rate
    pub fn health(&self, account: &AccountId) -> Result<PositionHealth> {
        let staged = self.stage()?;
        PositionHealth::assess(
            *account,
            self.position(account),
            &staged.pool,
            staged.price,
            self.config.liquidation.min_collateral_ratio,
        )
    }

    /// Utilization and rates at the current price
    pub fn current_rates(&self) -> Result<RateSnapshot> {
        let staged = self.stage()?;
        let total_debt = staged.pool.total_debt()?;
        let collateral_value = self.vault.total_value(staged.price)?;
        self.rate_model.snapshot(total_debt, collateral_value)
    }

    /// Debt pool as of the last committed operation
    pub fn pool(&self) -> &DebtPool {
        &self.pool
    }

    /// Collateral vault
    pub fn vault(&self) -> &CollateralVault {
        &self.vault
    }

    /// Debt ledger
    pub fn ledger(&self) -> &DebtLedger {
        &self.ledger
    }

    /// Full configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rate parameters
    pub fn rate_params(&self) -> &RateParams {
        &self.config.rates
    }

    /// Liquidation parameters
    pub fn liquidation_params(&self) -> &LiquidationParams {
        &self.config.liquidation
    }

    /// Liquidation statistics
    pub fn liquidation_stats(&self) -> &LiquidationStats {
        self.liquidations.statistics()
    }

    /// Committed events
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Price oracle
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Mutable price oracle
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    /// Clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Mutable clock
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Debt-asset ledger
    pub fn token(&self) -> &T {
        &self.token
    }

    /// Mutable debt-asset ledger
    pub fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }

    /// Take the engine apart, returning its collaborators
    pub fn into_parts(self) -> (EngineSnapshot, O, C, T) {
        let snapshot = self.snapshot();
        (snapshot, self.oracle, self.clock, self.token)
    }

    /// Check every accounting invariant
    pub fn verify_invariants(&self) -> Result<()> {
        if !self.vault.verify_invariant() {
            return Err(Error::InvariantViolation(
                "vault total does not match account collateral".into(),
            ));
        }
        if !self.ledger.verify_invariant(&self.pool) {
            return Err(Error::InvariantViolation(
                "pool share total does not match account shares".into(),
            ));
        }
        if self.pool.exchange_rate < FixedPoint::ONE {
            return Err(Error::InvariantViolation(
                "exchange rate fell below 1.0".into(),
            ));
        }
        Ok(())
    }

    /// Compute state hash
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        data.extend_from_slice(self.vault.state_hash().as_bytes());
        data.extend_from_slice(self.ledger.state_hash().as_bytes());
        data.extend_from_slice(&self.pool.to_bytes().unwrap_or_default());
        Hash::sha256(&data)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Read the clock and oracle once and accrue into a copy of the pool
    fn stage(&self) -> Result<Staged> {
        let now = self.clock.now();
        let price = self.read_price(now)?;

        let mut pool = self.pool.clone();
        let total_debt = pool.total_debt()?;
        let collateral_value = self.vault.total_value(price)?;
        let utilization = self.rate_model.utilization_for(total_debt, collateral_value)?;
        let rate = self.rate_model.borrow_rate(utilization)?;
        let accrual = pool.accrue(now, rate, self.config.rates.reserve_factor)?;

        debug!(
            now,
            price = %price,
            utilization = %utilization,
            exchange_rate = %pool.exchange_rate,
            "operation staged"
        );

        Ok(Staged {
            now,
            price,
            pool,
            accrual,
        })
    }

    fn read_price(&self, now: u64) -> Result<FixedPoint> {
        match self.oracle.get_price(now) {
            Ok(price) if price.is_zero() => Err(Error::OracleUnavailable("price is zero".into())),
            Ok(price) => Ok(price),
            Err(e @ Error::OracleUnavailable(_)) => Err(e),
            Err(e) => Err(Error::OracleUnavailable(e.to_string())),
        }
    }

    fn commit_pool(&mut self, staged: &Staged) {
        self.pool = staged.pool.clone();
    }

    fn receipt(&self, account: AccountId, amount: u128, health: PositionHealth, staged: &Staged) -> OperationReceipt {
        OperationReceipt {
            account,
            amount,
            health,
            exchange_rate: staged.pool.exchange_rate,
            price: staged.price,
            timestamp: staged.now,
        }
    }
}
