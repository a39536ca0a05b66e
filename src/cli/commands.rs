//! CLI Commands.
//!
//! Every command runs against a loaded [`CliEngine`]; [`CliApp`] takes care of
//! loading and saving around it.

use serde::Serialize;
use std::path::PathBuf;

use super::{CliApp, CliEngine, CliResult, CommandOutput};
use crate::core::config::EngineConfig;
use crate::core::token::TokenAmount;
use crate::core::vault::CollateralAmount;
use crate::oracle::price_feed::PriceData;
use crate::utils::crypto::AccountId;
use crate::utils::math::FixedPoint;
use crate::utils::time::{format_timestamp, Clock};

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND ENUM
// ═══════════════════════════════════════════════════════════════════════════════

/// All available commands
#[derive(Debug, Clone)]
pub enum Command {
    /// Create a new engine in the data directory
    Init(InitCommand),
    /// Position operations
    Position(PositionCommand),
    /// Liquidation operations
    Liquidation(LiquidationCommand),
    /// Oracle operations
    Oracle(OracleCommand),
    /// Debt-asset balances
    Token(TokenCommand),
    /// Engine status
    Status(StatusCommand),
    /// Configuration management
    Config(ConfigCommand),
}

impl Command {
    /// Whether the command changes persisted state
    pub fn is_mutating(&self) -> bool {
        match self {
            Command::Init(_) => true,
            Command::Position(cmd) => !matches!(cmd, PositionCommand::Show { .. }),
            Command::Liquidation(cmd) => matches!(cmd, LiquidationCommand::Liquidate { .. }),
            Command::Oracle(cmd) => matches!(cmd, OracleCommand::SetPrice { .. }),
            Command::Token(cmd) => matches!(cmd, TokenCommand::Transfer { .. }),
            Command::Status(cmd) => matches!(cmd, StatusCommand::Accrue),
            Command::Config(cmd) => matches!(cmd, ConfigCommand::Apply { .. }),
        }
    }

    /// Run against a loaded engine
    pub fn execute(&self, engine: &mut CliEngine) -> CliResult<CommandOutput> {
        match self {
            Command::Init(_) => Ok(CommandOutput::success("Engine already loaded")),
            Command::Position(cmd) => cmd.execute(engine),
            Command::Liquidation(cmd) => cmd.execute(engine),
            Command::Oracle(cmd) => cmd.execute(engine),
            Command::Token(cmd) => cmd.execute(engine),
            Command::Status(cmd) => cmd.execute(engine),
            Command::Config(cmd) => cmd.execute(engine),
        }
    }
}

/// Trait for commands that run against a loaded engine
pub trait Executable {
    /// Execute the command
    fn execute(&self, engine: &mut CliEngine) -> CliResult<CommandOutput>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// INIT COMMAND
// ═══════════════════════════════════════════════════════════════════════════════

/// Create a new engine
#[derive(Debug, Clone, Default)]
pub struct InitCommand {
    /// Engine configuration file; defaults plus environment overrides otherwise
    pub engine_config: Option<PathBuf>,
    /// Replace an existing engine
    pub force: bool,
}

impl InitCommand {
    /// Create and persist the engine
    pub fn run(&self, app: &CliApp) -> CliResult<CommandOutput> {
        let config = match &self.engine_config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        }
        .apply_env_overrides()?;

        let engine = app.initialize(config, self.force)?;
        CommandOutput::success_with_data(
            format!("Initialized engine in {}", app.config().data_dir.display()),
            engine.config(),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSITION COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Position command variants
#[derive(Debug, Clone)]
pub enum PositionCommand {
    /// Deposit collateral
    Deposit {
        /// Account
        account: AccountId,
        /// Collateral amount
        amount: CollateralAmount,
    },
    /// Withdraw collateral
    Withdraw {
        /// Account
        account: AccountId,
        /// Collateral amount
        amount: CollateralAmount,
    },
    /// Mint debt asset
    Mint {
        /// Account
        account: AccountId,
        /// Debt-asset amount
        amount: TokenAmount,
    },
    /// Repay debt
    Burn {
        /// Account
        account: AccountId,
        /// Debt-asset amount; capped at the outstanding debt
        amount: TokenAmount,
    },
    /// Show a position
    Show {
        /// Account
        account: AccountId,
    },
}

impl Executable for PositionCommand {
    fn execute(&self, engine: &mut CliEngine) -> CliResult<CommandOutput> {
        match self {
            PositionCommand::Deposit { account, amount } => {
                let receipt = engine.deposit(*account, *amount)?;
                CommandOutput::success_with_data(
                    format!("Deposited {} collateral for {}", amount, account),
                    &receipt,
                )
            }
            PositionCommand::Withdraw { account, amount } => {
                let receipt = engine.withdraw(*account, *amount)?;
                CommandOutput::success_with_data(
                    format!("Withdrew {} collateral for {}", amount, account),
                    &receipt,
                )
            }
            PositionCommand::Mint { account, amount } => {
                let receipt = engine.mint(*account, *amount)?;
                CommandOutput::success_with_data(format!("Minted {} to {}", amount, account), &receipt)
            }
            PositionCommand::Burn { account, amount } => {
                let receipt = engine.burn(*account, *amount)?;
                let repaid = TokenAmount::from_raw(receipt.amount);
                let output = CommandOutput::success_with_data(
                    format!("Repaid {} for {}", repaid, account),
                    &receipt,
                )?;
                Ok(if repaid < *amount {
                    output.with_warning(format!("Requested {} exceeded the outstanding debt", amount))
                } else {
                    output
                })
            }
            PositionCommand::Show { account } => {
                let position = engine.position(account);
                match engine.health(account) {
                    Ok(health) => CommandOutput::success_with_data(format!("Position of {}", account), &health),
                    Err(e) => Ok(CommandOutput::success_with_data(
                        format!("Position of {}", account),
                        &position,
                    )?
                    .with_warning(format!("Health unavailable: {}", e))),
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Liquidation command variants
#[derive(Debug, Clone)]
pub enum LiquidationCommand {
    /// Liquidate a position
    Liquidate {
        /// Account paying the debt and receiving collateral
        liquidator: AccountId,
        /// Position to liquidate
        account: AccountId,
        /// Debt-asset amount offered
        amount: TokenAmount,
    },
    /// List liquidatable positions, worst first
    List,
    /// Cumulative liquidation statistics
    Stats,
}

impl Executable for LiquidationCommand {
    fn execute(&self, engine: &mut CliEngine) -> CliResult<CommandOutput> {
        match self {
            LiquidationCommand::Liquidate {
                liquidator,
                account,
                amount,
            } => {
                let outcome = engine.liquidate(*liquidator, *account, *amount)?;
                let output = CommandOutput::success_with_data(
                    format!(
                        "Liquidated {}: repaid {}, seized {}",
                        account, outcome.debt_repaid, outcome.collateral_seized
                    ),
                    &outcome,
                )?;
                Ok(if outcome.bad_debt.is_zero() {
                    output
                } else {
                    output.with_warning(format!("{} written off as bad debt", outcome.bad_debt))
                })
            }
            LiquidationCommand::List => {
                let positions = engine.liquidatable_accounts()?;
                CommandOutput::success_with_data(
                    format!("{} liquidatable position(s)", positions.len()),
                    &positions,
                )
            }
            LiquidationCommand::Stats => {
                CommandOutput::success_with_data("Liquidation statistics", engine.liquidation_stats())
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Oracle command variants
#[derive(Debug, Clone)]
pub enum OracleCommand {
    /// Publish a new price at the current time
    SetPrice {
        /// Collateral price in debt-asset units
        price: FixedPoint,
        /// Source label
        source: String,
    },
    /// Show the current price
    Show,
}

#[derive(Serialize)]
struct OracleView {
    price: Option<FixedPoint>,
    updated_at: Option<String>,
    source: Option<String>,
    valid: bool,
    change_bps: i64,
    history_len: usize,
}

impl Executable for OracleCommand {
    fn execute(&self, engine: &mut CliEngine) -> CliResult<CommandOutput> {
        let now = engine.clock().now();
        match self {
            OracleCommand::SetPrice { price, source } => {
                engine
                    .oracle_mut()
                    .update(PriceData::new(*price, now, source.clone()))?;
                Ok(CommandOutput::success(format!("Price set to {}", price)))
            }
            OracleCommand::Show => {
                let feed = engine.oracle();
                let current = feed.current_price();
                let view = OracleView {
                    price: current.map(|p| p.price),
                    updated_at: current.map(|p| format_timestamp(p.timestamp)),
                    source: current.map(|p| p.source.clone()),
                    valid: feed.is_valid(now),
                    change_bps: feed.price_change_bps(),
                    history_len: feed.history().len(),
                };
                let output = CommandOutput::success_with_data("Oracle price", &view)?;
                Ok(if view.valid {
                    output
                } else {
                    output.with_warning("Price is missing or stale; operations will be rejected")
                })
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Token command variants
#[derive(Debug, Clone)]
pub enum TokenCommand {
    /// Balance of an account
    Balance {
        /// Account
        account: AccountId,
    },
    /// Move debt asset between accounts
    Transfer {
        /// Sender
        from: AccountId,
        /// Recipient
        to: AccountId,
        /// Amount
        amount: TokenAmount,
    },
    /// Total supply
    Supply,
}

impl Executable for TokenCommand {
    fn execute(&self, engine: &mut CliEngine) -> CliResult<CommandOutput> {
        match self {
            TokenCommand::Balance { account } => {
                let balance = engine.token().balance_of(account);
                Ok(CommandOutput::success(format!("{} holds {}", account, balance)))
            }
            TokenCommand::Transfer { from, to, amount } => {
                engine.token_mut().transfer(from, to, *amount)?;
                Ok(CommandOutput::success(format!("Transferred {} from {} to {}", amount, from, to)))
            }
            TokenCommand::Supply => {
                let token = engine.token();
                Ok(CommandOutput::success(format!(
                    "Total supply {} across {} holder(s)",
                    token.total_supply(),
                    token.holder_count()
                )))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATUS COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Status command variants
#[derive(Debug, Clone)]
pub enum StatusCommand {
    /// Engine overview
    Overview,
    /// Current utilization and rates
    Rates,
    /// Bring interest current
    Accrue,
}

#[derive(Serialize)]
struct Overview {
    version: &'static str,
    total_collateral: CollateralAmount,
    total_debt: TokenAmount,
    total_debt_shares: crate::core::ledger::DebtShares,
    exchange_rate: FixedPoint,
    last_accrual: String,
    total_reserves: TokenAmount,
    bad_debt: TokenAmount,
    positions: usize,
    state_hash: String,
}

impl Executable for StatusCommand {
    fn execute(&self, engine: &mut CliEngine) -> CliResult<CommandOutput> {
        match self {
            StatusCommand::Overview => {
                let pool = engine.pool();
                let overview = Overview {
                    version: crate::VERSION,
                    total_collateral: engine.vault().total_collateral(),
                    total_debt: TokenAmount::from_raw(pool.total_debt()?),
                    total_debt_shares: pool.total_debt_shares,
                    exchange_rate: pool.exchange_rate,
                    last_accrual: format_timestamp(pool.last_accrual_timestamp),
                    total_reserves: TokenAmount::from_raw(pool.total_reserves),
                    bad_debt: TokenAmount::from_raw(pool.bad_debt),
                    positions: engine.positions().len(),
                    state_hash: engine.state_hash().to_hex(),
                };
                CommandOutput::success_with_data("Engine status", &overview)
            }
            StatusCommand::Rates => {
                let rates = engine.current_rates()?;
                CommandOutput::success_with_data("Current rates", &rates)
            }
            StatusCommand::Accrue => {
                let report = engine.accrue()?;
                CommandOutput::success_with_data(
                    format!("Exchange rate now {}", report.new_rate),
                    &report,
                )
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration command variants
#[derive(Debug, Clone)]
pub enum ConfigCommand {
    /// Show the engine configuration
    Show,
    /// Replace the engine configuration from a JSON file
    Apply {
        /// Configuration file
        path: PathBuf,
    },
}

impl Executable for ConfigCommand {
    fn execute(&self, engine: &mut CliEngine) -> CliResult<CommandOutput> {
        match self {
            ConfigCommand::Show => CommandOutput::success_with_data("Engine configuration", engine.config()),
            ConfigCommand::Apply { path } => {
                let config = EngineConfig::load(path)?;
                let report = engine.update_config(config)?;
                CommandOutput::success_with_data(
                    format!("Configuration applied from {}", path.display()),
                    &report,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::StableToken;
    use crate::oracle::price_feed::PriceFeed;
    use crate::protocol::engine::StablecoinEngine;
    use crate::utils::time::ManualClock;

    fn engine() -> CliEngine {
        let mut engine = StablecoinEngine::new(
            EngineConfig::default(),
            PriceFeed::new(),
            ManualClock::new(1_000),
            StableToken::new(),
        )
        .unwrap();
        Command::Oracle(OracleCommand::SetPrice {
            price: FixedPoint::from_integer(2_000),
            source: "test".into(),
        })
        .execute(&mut engine)
        .unwrap();
        engine
    }

    #[test]
    fn test_mutating_classification() {
        assert!(Command::Status(StatusCommand::Accrue).is_mutating());
        assert!(!Command::Status(StatusCommand::Rates).is_mutating());
        assert!(!Command::Liquidation(LiquidationCommand::List).is_mutating());
        assert!(Command::Position(PositionCommand::Burn {
            account: AccountId::from_label("a"),
            amount: TokenAmount::from_whole(1),
        })
        .is_mutating());
    }

    #[test]
    fn test_burn_warns_when_clamped() {
        let mut engine = engine();
        let alice = AccountId::from_label("alice");
        engine.deposit(alice, CollateralAmount::from_whole(1)).unwrap();
        engine.mint(alice, TokenAmount::from_whole(100)).unwrap();

        let output = Command::Position(PositionCommand::Burn {
            account: alice,
            amount: TokenAmount::from_whole(500),
        })
        .execute(&mut engine)
        .unwrap();
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn test_oracle_show_without_price() {
        let mut engine = StablecoinEngine::new(
            EngineConfig::default(),
            PriceFeed::new(),
            ManualClock::new(1_000),
            StableToken::new(),
        )
        .unwrap();
        let output = Command::Oracle(OracleCommand::Show).execute(&mut engine).unwrap();
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn test_status_overview() {
        let mut engine = engine();
        let output = Command::Status(StatusCommand::Overview)
            .execute(&mut engine)
            .unwrap();
        let data = output.data.unwrap();
        assert_eq!(data["positions"], 0);
        assert_eq!(data["exchange_rate"], "1");
    }
}
