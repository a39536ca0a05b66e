//! MyUSD Command Line Interface.
//!
//! Operator tools for driving a persisted engine from the shell. Each
//! invocation loads the engine from the data directory, runs one command and
//! saves the result.

pub mod commands;
pub mod config;
pub mod output;

pub use commands::*;
pub use config::*;
pub use output::*;

use tracing::debug;

use crate::core::config::EngineConfig;
use crate::core::token::StableToken;
use crate::oracle::price_feed::PriceFeed;
use crate::protocol::engine::StablecoinEngine;
use crate::storage::{FileStore, StateManager};
use crate::utils::time::{Clock, ManualClock, SystemClock};

/// Engine as driven by the CLI
pub type CliEngine = StablecoinEngine<PriceFeed, ManualClock, StableToken>;

// ═══════════════════════════════════════════════════════════════════════════════
// CLI APPLICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// CLI Application state
#[derive(Debug)]
pub struct CliApp {
    /// Configuration
    config: CliConfig,
    /// Output formatter
    output: OutputFormatter,
    /// Fixed time for every operation instead of the wall clock
    timestamp: Option<u64>,
}

impl CliApp {
    /// Create new CLI application
    pub fn new(config: CliConfig) -> Self {
        let output = OutputFormatter::new(config.output).with_color(config.color);
        Self {
            config,
            output,
            timestamp: None,
        }
    }

    /// Pin the operation time
    pub fn with_timestamp(mut self, timestamp: Option<u64>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Get configuration
    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    /// Get output formatter
    pub fn output(&self) -> &OutputFormatter {
        &self.output
    }

    /// Operation time
    pub fn now(&self) -> u64 {
        self.timestamp.unwrap_or_else(|| SystemClock.now())
    }

    /// Open the state store in the data directory
    pub fn state(&self) -> CliResult<StateManager<FileStore>> {
        Ok(StateManager::new(FileStore::open(&self.config.data_dir)?))
    }

    /// Create a fresh engine and persist it
    pub fn initialize(&self, engine_config: EngineConfig, force: bool) -> CliResult<CliEngine> {
        let state = self.state()?;
        if state.is_initialized()? && !force {
            return Err(CliError::AlreadyInitialized(
                self.config.data_dir.display().to_string(),
            ));
        }

        state.clear()?;
        let feed = PriceFeed::with_params(
            self.config.max_price_age_secs,
            self.config.max_price_deviation_bps,
        );
        let engine = StablecoinEngine::new(
            engine_config,
            feed,
            ManualClock::new(self.now()),
            StableToken::new(),
        )?;
        self.save_engine(&state, &engine)?;
        Ok(engine)
    }

    /// Load the persisted engine
    pub fn load_engine(&self, state: &StateManager<FileStore>) -> CliResult<CliEngine> {
        let snapshot = state
            .load_engine()?
            .ok_or_else(|| CliError::NotInitialized(self.config.data_dir.display().to_string()))?;
        let mut feed = state.load_price_feed()?.unwrap_or_default();
        feed.set_limits(
            self.config.max_price_age_secs,
            self.config.max_price_deviation_bps,
        );
        let token = state.load_token()?;

        debug!(positions = snapshot.positions.len(), "engine loaded");
        Ok(StablecoinEngine::from_snapshot(
            snapshot,
            feed,
            ManualClock::new(self.now()),
            token,
        )?)
    }

    /// Persist the engine and its collaborators
    pub fn save_engine(&self, state: &StateManager<FileStore>, engine: &CliEngine) -> CliResult<()> {
        state.save_engine(&engine.snapshot(), self.now())?;
        state.save_price_feed(engine.oracle())?;
        state.save_token(engine.token())?;
        state.flush()?;
        Ok(())
    }

    /// Execute a command against the persisted engine
    pub fn execute(&self, command: Command) -> CliResult<CommandOutput> {
        if let Command::Init(init) = &command {
            return init.run(self);
        }

        let state = self.state()?;
        let mut engine = self.load_engine(&state)?;
        let output = command.execute(&mut engine)?;

        if command.is_mutating() {
            engine.verify_invariants()?;
            self.save_engine(&state, &engine)?;
        }
        Ok(output)
    }
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new(CliConfig::default())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLI RESULT
// ═══════════════════════════════════════════════════════════════════════════════

/// CLI Error types
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No engine in the data directory
    #[error("No engine in {0}; run `myusd init` first")]
    NotInitialized(String),

    /// Engine already present
    #[error("An engine already exists in {0}; pass --force to replace it")]
    AlreadyInitialized(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Engine error
    #[error(transparent)]
    Engine(#[from] crate::error::Error),
}

/// CLI Result type
pub type CliResult<T> = std::result::Result<T, CliError>;

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Command execution output
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Output message
    pub message: String,
    /// Structured data (JSON serializable)
    pub data: Option<serde_json::Value>,
    /// Warnings
    pub warnings: Vec<String>,
}

impl CommandOutput {
    /// Create success output
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
            warnings: Vec::new(),
        }
    }

    /// Create success with data
    pub fn success_with_data<T: serde::Serialize>(message: impl Into<String>, data: &T) -> CliResult<Self> {
        let data = serde_json::to_value(data)
            .map_err(|e| CliError::Engine(crate::error::Error::Serialization(e.to_string())))?;
        Ok(Self {
            message: message.into(),
            data: Some(data),
            warnings: Vec::new(),
        })
    }

    /// Add warning
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Print through a formatter
    pub fn print(&self, output: &OutputFormatter) {
        output.success(&self.message);
        if let Some(data) = &self.data {
            output.data(data);
        }
        for warning in &self.warnings {
            output.warning(warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vault::CollateralAmount;
    use crate::utils::crypto::AccountId;
    use crate::utils::math::FixedPoint;

    fn app(dir: &tempfile::TempDir) -> CliApp {
        CliApp::new(CliConfig::with_data_dir(dir.path())).with_timestamp(Some(1_000))
    }

    #[test]
    fn test_command_output_with_warning() {
        let output = CommandOutput::success("OK")
            .with_warning("Warning 1")
            .with_warning("Warning 2");
        assert_eq!(output.warnings.len(), 2);
    }

    #[test]
    fn test_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let result = app(&dir).execute(Command::Status(StatusCommand::Overview));
        assert!(matches!(result, Err(CliError::NotInitialized(_))));
    }

    #[test]
    fn test_init_twice_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        app.initialize(EngineConfig::default(), false).unwrap();
        assert!(matches!(
            app.initialize(EngineConfig::default(), false),
            Err(CliError::AlreadyInitialized(_))
        ));
        app.initialize(EngineConfig::default(), true).unwrap();
    }

    #[test]
    fn test_price_limits_follow_current_config() {
        let dir = tempfile::tempdir().unwrap();
        app(&dir).initialize(EngineConfig::default(), false).unwrap();
        app(&dir)
            .execute(Command::Oracle(OracleCommand::SetPrice {
                price: FixedPoint::from_integer(2_000),
                source: "test".into(),
            }))
            .unwrap();

        let mut config = CliConfig::with_data_dir(dir.path());
        config.max_price_age_secs = 60;
        let strict = CliApp::new(config).with_timestamp(Some(1_120));
        let state = strict.state().unwrap();
        let engine = strict.load_engine(&state).unwrap();

        assert_eq!(engine.oracle().max_staleness(), 60);
        assert!(engine.health(&AccountId::from_label("alice")).is_err());
    }

    #[test]
    fn test_state_survives_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        let alice = AccountId::from_label("alice");
        app.initialize(EngineConfig::default(), false).unwrap();

        app.execute(Command::Oracle(OracleCommand::SetPrice {
            price: FixedPoint::from_integer(2_000),
            source: "test".into(),
        }))
        .unwrap();
        app.execute(Command::Position(PositionCommand::Deposit {
            account: alice,
            amount: CollateralAmount::from_whole(2),
        }))
        .unwrap();

        let state = app.state().unwrap();
        let engine = app.load_engine(&state).unwrap();
        assert_eq!(engine.position(&alice).collateral, CollateralAmount::from_whole(2));
        assert!(engine.oracle().current_price().is_some());
    }
}
