//! # MyUSD
//!
//! An over-collateralized stablecoin engine. Borrowers lock collateral and
//! mint a debt asset against it; debt is tracked as shares of a global pool
//! whose exchange rate compounds with a utilization-driven interest rate.
//! Positions that fall below the minimum collateral ratio can be liquidated
//! at a bonus.
//!
//! ## Architecture
//!
//! - **Core**: fixed-point amounts, configuration, the collateral vault, the
//!   share-based debt ledger, exchange-rate accrual and the rate model
//! - **Oracle**: price source trait, a validated price feed and a fixed oracle
//! - **Liquidation**: liquidatable-position discovery and liquidation planning
//! - **Protocol**: the [`StablecoinEngine`](protocol::StablecoinEngine) facade
//!   and its event log
//! - **Storage**: persistence of engine snapshots
//! - **CLI**: operator commands over a persisted engine
//!
//! ## Example
//!
//! ```rust
//! use myusd::prelude::*;
//!
//! let mut engine = StablecoinEngine::new(
//!     EngineConfig::default(),
//!     FixedPriceOracle::new(FixedPoint::from_integer(2_000)),
//!     ManualClock::new(0),
//!     StableToken::new(),
//! )?;
//!
//! let alice = AccountId::from_label("alice");
//! engine.deposit(alice, CollateralAmount::from_whole(1))?;
//! engine.mint(alice, TokenAmount::from_whole(1_000))?;
//!
//! assert!(engine.health(&alice)?.is_healthy());
//! # Ok::<(), myusd::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod liquidation;
pub mod oracle;
pub mod protocol;
pub mod storage;
pub mod utils;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        accrual::{AccrualReport, DebtPool},
        config::{CloseFactor, EngineConfig, LiquidationParams, RateParams, ShortfallPolicy, UtilizationBasis},
        ledger::{DebtLedger, DebtShares},
        position::{Position, PositionHealth, PositionStatus},
        rates::{InterestRateModel, RateSnapshot},
        token::{DebtAssetLedger, StableToken, TokenAmount},
        vault::{CollateralAmount, CollateralVault},
    };
    pub use crate::error::{Error, Result};
    pub use crate::liquidation::engine::{LiquidationEngine, LiquidationOutcome};
    pub use crate::oracle::price_feed::{FixedPriceOracle, PriceData, PriceFeed, PriceOracle};
    pub use crate::protocol::{
        engine::{EngineSnapshot, OperationReceipt, StablecoinEngine},
        events::{EngineEvent, EventLog},
    };
    pub use crate::utils::{
        crypto::{AccountId, Hash},
        math::{FixedPoint, Rounding},
        time::{Clock, ManualClock, SystemClock},
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
