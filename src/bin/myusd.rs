//! MyUSD CLI
//!
//! Drive a persisted stablecoin engine from the shell.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;

use myusd::cli::{
    CliApp, CliConfig, Command, ConfigCommand, InitCommand, LiquidationCommand, OracleCommand,
    OutputFormat, PositionCommand, StatusCommand, TokenCommand,
};
use myusd::core::token::TokenAmount;
use myusd::core::vault::CollateralAmount;
use myusd::utils::crypto::AccountId;
use myusd::utils::math::FixedPoint;

/// MyUSD - over-collateralized, share-based stablecoin engine
#[derive(Parser)]
#[command(name = "myusd")]
#[command(version = myusd::VERSION)]
#[command(about = "Command-line interface for the MyUSD engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to data directory
    #[arg(short, long, env = "MYUSD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// CLI configuration file
    #[arg(short, long, env = "MYUSD_CLI_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (text, json, json-pretty)
    #[arg(short, long, env = "MYUSD_OUTPUT")]
    output: Option<OutputFormat>,

    /// Run at this unix timestamp instead of the wall clock
    #[arg(short, long, global = true)]
    timestamp: Option<u64>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new engine in the data directory
    Init {
        /// Engine configuration file (JSON)
        #[arg(short, long)]
        engine_config: Option<PathBuf>,

        /// Replace an existing engine
        #[arg(short, long)]
        force: bool,
    },

    /// Deposit collateral
    Deposit {
        /// Account (hex address or label)
        account: String,
        /// Collateral amount, e.g. 1.5
        amount: CollateralAmount,
    },

    /// Withdraw collateral
    Withdraw {
        /// Account (hex address or label)
        account: String,
        /// Collateral amount
        amount: CollateralAmount,
    },

    /// Mint debt asset against collateral
    Mint {
        /// Account (hex address or label)
        account: String,
        /// Debt-asset amount
        amount: TokenAmount,
    },

    /// Repay debt; amounts above the outstanding debt are capped
    Burn {
        /// Account (hex address or label)
        account: String,
        /// Debt-asset amount
        amount: TokenAmount,
    },

    /// Liquidate an unhealthy position
    Liquidate {
        /// Liquidator paying the debt
        liquidator: String,
        /// Position owner
        account: String,
        /// Debt-asset amount offered
        amount: TokenAmount,
    },

    /// Show a position and its health
    Position {
        /// Account (hex address or label)
        account: String,
    },

    /// List liquidatable positions, worst first
    Liquidatable,

    /// Cumulative liquidation statistics
    Liquidations,

    /// Engine status
    Status,

    /// Current utilization and rates
    Rates,

    /// Bring interest current
    Accrue,

    /// Oracle operations
    #[command(subcommand)]
    Oracle(OracleCommands),

    /// Debt-asset balances
    #[command(subcommand)]
    Token(TokenCommands),

    /// Engine configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum OracleCommands {
    /// Publish a price at the current time
    SetPrice {
        /// Collateral price in debt-asset units
        price: FixedPoint,
        /// Source label
        #[arg(short, long, default_value = "manual")]
        source: String,
    },
    /// Show the current price
    Show,
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Balance of an account
    Balance {
        /// Account (hex address or label)
        account: String,
    },
    /// Move debt asset between accounts
    Transfer {
        /// Sender
        from: String,
        /// Recipient
        to: String,
        /// Amount
        amount: TokenAmount,
    },
    /// Total supply
    Supply,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the engine configuration
    Show,
    /// Replace the engine configuration from a JSON file
    Apply {
        /// Configuration file
        path: PathBuf,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════════════════════

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Exit code 2 means the engine rejected the command
fn run(cli: Cli) -> anyhow::Result<i32> {
    let app = build_app(&cli)?;
    let command = to_command(cli.command);

    match app.execute(command) {
        Ok(output) => {
            output.print(app.output());
            Ok(0)
        }
        Err(e) => {
            app.output().error(&e.to_string());
            Ok(2)
        }
    }
}

fn build_app(cli: &Cli) -> anyhow::Result<CliApp> {
    let mut config = match &cli.config {
        Some(path) => CliConfig::load(path)
            .with_context(|| format!("loading CLI configuration from {}", path.display()))?,
        None => CliConfig::default(),
    }
    .apply_env()?;

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(output) = cli.output {
        config.output = output;
    }
    if cli.no_color {
        config.color = false;
    }

    Ok(CliApp::new(config).with_timestamp(cli.timestamp))
}

fn account(input: String) -> AccountId {
    AccountId::parse_or_label(&input)
}

fn to_command(command: Commands) -> Command {
    match command {
        Commands::Init { engine_config, force } => Command::Init(InitCommand { engine_config, force }),
        Commands::Deposit { account: a, amount } => Command::Position(PositionCommand::Deposit {
            account: account(a),
            amount,
        }),
        Commands::Withdraw { account: a, amount } => Command::Position(PositionCommand::Withdraw {
            account: account(a),
            amount,
        }),
        Commands::Mint { account: a, amount } => Command::Position(PositionCommand::Mint {
            account: account(a),
            amount,
        }),
        Commands::Burn { account: a, amount } => Command::Position(PositionCommand::Burn {
            account: account(a),
            amount,
        }),
        Commands::Liquidate {
            liquidator,
            account: a,
            amount,
        } => Command::Liquidation(LiquidationCommand::Liquidate {
            liquidator: account(liquidator),
            account: account(a),
            amount,
        }),
        Commands::Position { account: a } => Command::Position(PositionCommand::Show { account: account(a) }),
        Commands::Liquidatable => Command::Liquidation(LiquidationCommand::List),
        Commands::Liquidations => Command::Liquidation(LiquidationCommand::Stats),
        Commands::Status => Command::Status(StatusCommand::Overview),
        Commands::Rates => Command::Status(StatusCommand::Rates),
        Commands::Accrue => Command::Status(StatusCommand::Accrue),
        Commands::Oracle(OracleCommands::SetPrice { price, source }) => {
            Command::Oracle(OracleCommand::SetPrice { price, source })
        }
        Commands::Oracle(OracleCommands::Show) => Command::Oracle(OracleCommand::Show),
        Commands::Token(TokenCommands::Balance { account: a }) => {
            Command::Token(TokenCommand::Balance { account: account(a) })
        }
        Commands::Token(TokenCommands::Transfer { from, to, amount }) => Command::Token(TokenCommand::Transfer {
            from: account(from),
            to: account(to),
            amount,
        }),
        Commands::Token(TokenCommands::Supply) => Command::Token(TokenCommand::Supply),
        Commands::Config(ConfigCommands::Show) => Command::Config(ConfigCommand::Show),
        Commands::Config(ConfigCommands::Apply { path }) => Command::Config(ConfigCommand::Apply { path }),
    }
}
