//! Engine constants and default parameters.
//!
//! All engine-wide constants are defined here for easy auditing and modification.
//! Fixed-point values are raw 18-decimal integers (`WAD` = 1.0).

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED POINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Number of decimals in every persisted fixed-point value
pub const WAD_DECIMALS: u32 = 18;

/// One unit in 18-decimal fixed point
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u64 = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// TIME
// ═══════════════════════════════════════════════════════════════════════════════

/// Seconds in a 365-day year, used to turn annual rates into per-second rates
pub const SECONDS_PER_YEAR: u128 = 31_536_000;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERALIZATION DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum collateral ratio - 150%
pub const DEFAULT_MIN_COLLATERAL_RATIO: u128 = 1_500_000_000_000_000_000;

/// Liquidation bonus - 10% of the repaid debt, paid in collateral
pub const DEFAULT_LIQUIDATION_BONUS: u128 = 100_000_000_000_000_000;

/// Close factor for partial liquidations - 50%
pub const DEFAULT_CLOSE_FACTOR: u128 = 500_000_000_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// INTEREST RATE DEFAULTS (annual)
// ═══════════════════════════════════════════════════════════════════════════════

/// Borrow rate at zero utilization - 2%
pub const DEFAULT_BASE_RATE: u128 = 20_000_000_000_000_000;

/// Slope below the kink - 8% at full utilization
pub const DEFAULT_SLOPE_LOW: u128 = 80_000_000_000_000_000;

/// Slope above the kink - 100% per unit of excess utilization
pub const DEFAULT_SLOPE_HIGH: u128 = 1_000_000_000_000_000_000;

/// Kink utilization - 80%
pub const DEFAULT_KINK: u128 = 800_000_000_000_000_000;

/// Share of borrow interest retained as protocol reserve - 10%
pub const DEFAULT_RESERVE_FACTOR: u128 = 100_000_000_000_000_000;

/// Per-second borrow rate ceiling (1000% APR)
pub const MAX_BORROW_RATE_PER_SECOND: u128 = WAD * 10 / SECONDS_PER_YEAR;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum price staleness in seconds (1 hour)
pub const MAX_PRICE_STALENESS_SECS: u64 = 3600;

/// Maximum allowed move between consecutive price updates - 50%
pub const MAX_PRICE_DEVIATION_BPS: u64 = 5_000;

/// Price history kept by a price feed
pub const PRICE_HISTORY_LEN: usize = 100;

// ═══════════════════════════════════════════════════════════════════════════════
// BOOKKEEPING
// ═══════════════════════════════════════════════════════════════════════════════

/// Events kept in memory by default
pub const DEFAULT_MAX_EVENTS: usize = 1000;

/// Length of an account address in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// Length of a hash in bytes (SHA256)
pub const HASH_LENGTH: usize = 32;
