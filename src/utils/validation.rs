//! Input validation utilities.
//!
//! Checks applied to amounts and configuration values before any state is touched.

use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, WAD};

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero
pub fn validate_non_zero(amount: u128, name: &str) -> Result<()> {
    if amount == 0 {
        return Err(Error::InvalidAmount(format!("{} must be greater than zero", name)));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a fraction in `[0, 1]`
pub fn validate_fraction(value: u128, name: &str) -> Result<()> {
    if value > WAD {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!("{} must be between 0 and 1", crate::utils::math::format_wad(value)),
        });
    }
    Ok(())
}

/// Validate a fraction in `(0, 1)` exclusive
pub fn validate_open_fraction(value: u128, name: &str) -> Result<()> {
    if value == 0 || value >= WAD {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!(
                "{} must be strictly between 0 and 1",
                crate::utils::math::format_wad(value)
            ),
        });
    }
    Ok(())
}

/// Validate a fraction in `(0, 1]`
pub fn validate_positive_fraction(value: u128, name: &str) -> Result<()> {
    if value == 0 || value > WAD {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!(
                "{} must be greater than 0 and at most 1",
                crate::utils::math::format_wad(value)
            ),
        });
    }
    Ok(())
}

/// Validate a ratio strictly above 1.0
pub fn validate_ratio_above_one(value: u128, name: &str) -> Result<()> {
    if value <= WAD {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!(
                "{} must be greater than 1",
                crate::utils::math::format_wad(value)
            ),
        });
    }
    Ok(())
}

/// Validate a basis point value does not exceed 100%
pub fn validate_bps(bps: u64, name: &str) -> Result<()> {
    if bps > BPS_DIVISOR {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!("{} bps exceeds {}", bps, BPS_DIVISOR),
        });
    }
    Ok(())
}
