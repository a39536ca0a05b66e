//! Utility modules for the MyUSD engine.
//!
//! This module contains shared utilities used across the engine:
//! - Fixed-point arithmetic
//! - Hashing and account identifiers
//! - Validation helpers
//! - Time sources
//! - Constants

pub mod constants;
pub mod crypto;
pub mod math;
pub mod time;
pub mod validation;

pub use constants::*;
pub use crypto::*;
pub use math::*;
pub use time::*;
pub use validation::*;
