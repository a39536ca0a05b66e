//! Error types for the MyUSD engine.
//!
//! Every public operation either commits completely or returns one of these
//! errors without touching engine state.

use thiserror::Error;

/// Result type alias for MyUSD operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the MyUSD engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Amount Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Amount is zero or otherwise unusable for the operation
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Position Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Withdrawal exceeds the deposit or would leave the position undercollateralized
    #[error("Insufficient collateral: required {required}, available {available}")]
    InsufficientCollateral {
        /// Collateral the operation needs to keep (raw 18-decimal units)
        required: u128,
        /// Collateral the position holds (raw 18-decimal units)
        available: u128,
    },

    /// Mint would push the position below the minimum collateral ratio
    #[error("Mint would leave position undercollateralized: debt {debt}, max debt {max_debt}")]
    UndercollateralizedMint {
        /// Debt after the mint (raw units)
        debt: u128,
        /// Largest debt the collateral supports (raw units)
        max_debt: u128,
    },

    /// Repayment against an account with nothing owed
    #[error("Repayment of {requested} exceeds outstanding debt {outstanding}")]
    ExceedsOutstandingDebt {
        /// Amount the caller tried to repay (raw units)
        requested: u128,
        /// Debt currently owed (raw units)
        outstanding: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Liquidation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Position is healthy and cannot be liquidated
    #[error("Position {0} is healthy and cannot be liquidated")]
    PositionHealthy(String),

    /// Bonus-adjusted seizure exceeds what the position holds
    #[error("Insufficient collateral to seize: required {required}, available {available}")]
    InsufficientCollateralToSeize {
        /// Collateral the liquidation would seize (raw units)
        required: u128,
        /// Collateral the position holds (raw units)
        available: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Oracle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Price is missing, zero, stale or the oracle failed
    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Price deviation too high between consecutive updates
    #[error("Price deviation {deviation_bps} bps exceeds maximum {max_deviation_bps} bps")]
    PriceDeviationTooHigh {
        /// Observed deviation in basis points
        deviation_bps: u64,
        /// Allowed deviation in basis points
        max_deviation_bps: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Collaborator Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Debt-asset balance too small for a debit
    #[error("Insufficient balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        /// Account being debited
        account: String,
        /// Amount requested (raw units)
        required: u128,
        /// Balance held (raw units)
        available: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input or configuration parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ═══════════════════════════════════════════════════════════════════
    // Serialization / Storage Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Shorthand for an overflow in the named operation
    pub fn overflow(operation: impl Into<String>) -> Self {
        Error::Overflow {
            operation: operation.into(),
        }
    }

    /// Shorthand for an underflow in the named operation
    pub fn underflow(operation: impl Into<String>) -> Self {
        Error::Underflow {
            operation: operation.into(),
        }
    }

    /// Returns true for the `InvalidAmount` class, which includes arithmetic overflow
    pub fn is_invalid_amount(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount(_) | Error::Overflow { .. } | Error::Underflow { .. }
        )
    }

    /// Returns true if the caller can fix this by adjusting the request
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientCollateral { .. }
                | Error::UndercollateralizedMint { .. }
                | Error::ExceedsOutstandingDebt { .. }
                | Error::InsufficientCollateralToSeize { .. }
                | Error::InsufficientBalance { .. }
                | Error::OracleUnavailable(_)
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_) | Error::Storage(_) | Error::Deserialization(_)
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Amount errors: 1xxx
            Error::InvalidAmount(_) => 1001,
            Error::Overflow { .. } => 1002,
            Error::Underflow { .. } => 1003,

            // Position errors: 2xxx
            Error::InsufficientCollateral { .. } => 2001,
            Error::UndercollateralizedMint { .. } => 2002,
            Error::ExceedsOutstandingDebt { .. } => 2003,

            // Liquidation errors: 3xxx
            Error::PositionHealthy(_) => 3001,
            Error::InsufficientCollateralToSeize { .. } => 3002,

            // Oracle errors: 4xxx
            Error::OracleUnavailable(_) => 4001,
            Error::PriceDeviationTooHigh { .. } => 4002,

            // Collaborator errors: 5xxx
            Error::InsufficientBalance { .. } => 5001,

            // Validation errors: 6xxx
            Error::InvalidParameter { .. } => 6001,
            Error::InvariantViolation(_) => 6002,

            // Serialization / storage errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,
            Error::Storage(_) => 7003,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::InvalidAmount("".into()).code(),
            Error::overflow("x").code(),
            Error::underflow("x").code(),
            Error::InsufficientCollateral { required: 0, available: 0 }.code(),
            Error::UndercollateralizedMint { debt: 0, max_debt: 0 }.code(),
            Error::ExceedsOutstandingDebt { requested: 0, outstanding: 0 }.code(),
            Error::PositionHealthy("".into()).code(),
            Error::InsufficientCollateralToSeize { required: 0, available: 0 }.code(),
            Error::OracleUnavailable("".into()).code(),
            Error::InvalidParameter { name: "".into(), reason: "".into() }.code(),
            Error::Storage("".into()).code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientCollateral {
            required: 1000,
            available: 500,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_overflow_is_invalid_amount() {
        assert!(Error::overflow("mul").is_invalid_amount());
        assert!(Error::InvalidAmount("zero".into()).is_invalid_amount());
        assert!(!Error::PositionHealthy("0xab".into()).is_invalid_amount());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::InsufficientCollateral { required: 0, available: 0 }.is_recoverable());
        assert!(!Error::InvariantViolation("test".into()).is_recoverable());
    }

    #[test]
    fn test_is_critical() {
        assert!(Error::InvariantViolation("test".into()).is_critical());
        assert!(!Error::PositionHealthy("test".into()).is_critical());
    }
}
