//! Collateral custody.
//!
//! This module manages the vault that holds the collateral asset:
//! - Collateral deposits and withdrawals
//! - Seizure during liquidation
//! - Collateral accounting and valuation
//!
//! Every change is first planned into a [`VaultChange`] without side effects,
//! then applied. The engine only applies once the whole operation is validated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::constants::WAD;
use crate::utils::crypto::{AccountId, Hash};
use crate::utils::math::*;
use crate::utils::validation::validate_non_zero;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL AMOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed collateral amount (18 decimals)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct CollateralAmount(#[serde(with = "wad_serde")] u128);

impl CollateralAmount {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Create from a raw 18-decimal value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from whole units (for convenience)
    pub fn from_whole(units: u64) -> Self {
        Self(units as u128 * WAD)
    }

    /// Get raw value
    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Value in debt-asset units at `price`, rounded down
    pub fn value_at(&self, price: FixedPoint) -> Result<u128> {
        mul_div_down(self.0, price.raw(), WAD)
    }

    /// Saturating subtraction
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Result<Self> {
        checked_add(self.0, other.0, "collateral add").map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        checked_sub(self.0, other.0, "collateral sub").map(Self)
    }
}

impl fmt::Display for CollateralAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_wad(self.0))
    }
}

impl FromStr for CollateralAmount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_wad(s).map(Self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VAULT OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Type of vault operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultOperation {
    /// Deposit collateral into vault
    Deposit,
    /// Withdraw collateral from vault
    Withdraw,
    /// Collateral seized during liquidation
    Seize,
}

/// A validated vault change ready to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultChange {
    /// Type of operation
    pub operation: VaultOperation,
    /// Account affected
    pub account: AccountId,
    /// Amount moved
    pub amount: CollateralAmount,
    /// Account collateral after the change
    pub balance_after: CollateralAmount,
    /// Vault total after the change
    pub total_after: CollateralAmount,
}

// ═══════════════════════════════════════════════════════════════════════════════
// VAULT
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateral held on behalf of every account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralVault {
    /// Total collateral in custody
    total_collateral: CollateralAmount,
    /// Collateral by account; zero balances are not stored
    collateral_by_account: BTreeMap<AccountId, CollateralAmount>,
}

impl CollateralVault {
    /// Create a new vault
    pub fn new() -> Self {
        Self::default()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PLANNING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Plan a deposit for `account`
    pub fn plan_deposit(&self, account: AccountId, amount: CollateralAmount) -> Result<VaultChange> {
        validate_non_zero(amount.raw(), "deposit amount")?;

        Ok(VaultChange {
            operation: VaultOperation::Deposit,
            account,
            amount,
            balance_after: self.collateral_of(&account).checked_add(amount)?,
            total_after: self.total_collateral.checked_add(amount)?,
        })
    }

    /// Plan a withdrawal. Health is checked by the caller.
    pub fn plan_withdraw(&self, account: AccountId, amount: CollateralAmount) -> Result<VaultChange> {
        validate_non_zero(amount.raw(), "withdraw amount")?;

        let current = self.collateral_of(&account);
        if amount > current {
            return Err(Error::InsufficientCollateral {
                required: amount.raw(),
                available: current.raw(),
            });
        }

        Ok(VaultChange {
            operation: VaultOperation::Withdraw,
            account,
            amount,
            balance_after: current.checked_sub(amount)?,
            total_after: self.total_collateral.checked_sub(amount)?,
        })
    }

    /// Plan seizing collateral during liquidation
    pub fn plan_seize(&self, account: AccountId, amount: CollateralAmount) -> Result<VaultChange> {
        let current = self.collateral_of(&account);
        if amount > current {
            return Err(Error::InsufficientCollateralToSeize {
                required: amount.raw(),
                available: current.raw(),
            });
        }

        Ok(VaultChange {
            operation: VaultOperation::Seize,
            account,
            amount,
            balance_after: current.checked_sub(amount)?,
            total_after: self.total_collateral.checked_sub(amount)?,
        })
    }

    /// Commit a planned change
    pub fn apply(&mut self, change: &VaultChange) {
        if change.balance_after.is_zero() {
            self.collateral_by_account.remove(&change.account);
        } else {
            self.collateral_by_account
                .insert(change.account, change.balance_after);
        }
        self.total_collateral = change.total_after;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEPOSIT/WITHDRAW
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit collateral for an account
    pub fn deposit(&mut self, account: AccountId, amount: CollateralAmount) -> Result<VaultChange> {
        let change = self.plan_deposit(account, amount)?;
        self.apply(&change);
        Ok(change)
    }

    /// Withdraw collateral without a health check
    pub fn withdraw(&mut self, account: AccountId, amount: CollateralAmount) -> Result<VaultChange> {
        let change = self.plan_withdraw(account, amount)?;
        self.apply(&change);
        Ok(change)
    }

    /// Seize collateral during liquidation
    pub fn seize(&mut self, account: AccountId, amount: CollateralAmount) -> Result<VaultChange> {
        let change = self.plan_seize(account, amount)?;
        self.apply(&change);
        Ok(change)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get total collateral in vault
    pub fn total_collateral(&self) -> CollateralAmount {
        self.total_collateral
    }

    /// Get collateral for a specific account
    pub fn collateral_of(&self, account: &AccountId) -> CollateralAmount {
        self.collateral_by_account
            .get(account)
            .copied()
            .unwrap_or(CollateralAmount::ZERO)
    }

    /// Accounts holding collateral, in address order
    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &CollateralAmount)> {
        self.collateral_by_account.iter()
    }

    /// Get number of accounts with collateral
    pub fn account_count(&self) -> usize {
        self.collateral_by_account.len()
    }

    /// Get total value of collateral at `price`
    pub fn total_value(&self, price: FixedPoint) -> Result<u128> {
        self.total_collateral.value_at(price)
    }

    /// Verify vault invariant (total == sum of all account collateral)
    pub fn verify_invariant(&self) -> bool {
        self.collateral_by_account
            .values()
            .try_fold(0u128, |acc, c| acc.checked_add(c.raw()))
            .map(|sum| sum == self.total_collateral.raw())
            .unwrap_or(false)
    }

    /// Compute state hash
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        data.extend_from_slice(&self.total_collateral.raw().to_be_bytes());

        for (account, amount) in &self.collateral_by_account {
            data.extend_from_slice(account.as_bytes());
            data.extend_from_slice(&amount.raw().to_be_bytes());
        }

        Hash::sha256(&data)
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Insert collateral directly; used when restoring persisted positions
    pub(crate) fn restore(&mut self, account: AccountId, amount: CollateralAmount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.deposit(account, amount).map(|_| ())
    }
}
