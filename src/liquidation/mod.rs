//! Liquidation module for the MyUSD engine.
//!
//! This module handles liquidations:
//! - Detection of undercollateralized positions, worst first
//! - Repay sizing, collateral seizure and the liquidation bonus
//! - Bad-debt absorption when collateral runs out

pub mod engine;

pub use engine::*;
