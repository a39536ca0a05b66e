//! Core modules for the MyUSD engine.
//!
//! This module contains the fundamental building blocks:
//! - Configuration and engine parameters
//! - Interest rate model and exchange-rate accrual
//! - Collateral vault and share-based debt ledger
//! - Position health
//! - Debt-asset bookkeeping

pub mod accrual;
pub mod config;
pub mod ledger;
pub mod position;
pub mod rates;
pub mod token;
pub mod vault;

pub use accrual::*;
pub use config::*;
pub use ledger::*;
pub use position::*;
pub use rates::*;
pub use token::*;
pub use vault::*;
