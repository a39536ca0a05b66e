//! Protocol module - engine facade and event log.
//!
//! [`StablecoinEngine`] ties the vault, the debt ledger, accrual, the rate
//! model and liquidation together and exposes the atomic operations.

pub mod engine;
pub mod events;

pub use engine::*;
pub use events::*;
