//! Debt-asset bookkeeping.
//!
//! The engine does not own balances of the stable asset. It tells a
//! [`DebtAssetLedger`] to credit borrowers on mint and to debit payers on
//! burn and liquidation. [`StableToken`] is the in-memory implementation used
//! by tests and the CLI:
//! - Balance tracking
//! - Supply management
//! - Transfers between holders

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
// TOKEN AMOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed debt-asset amount (prevents mixing with collateral)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TokenAmount(#[serde(with = "wad_serde")] u128);

impl TokenAmount {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Create from a raw 18-decimal value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from whole units
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

    /// Saturating subtraction
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Result<Self> {
        checked_add(self.0, other.0, "token add").map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        checked_sub(self.0, other.0, "token sub").map(Self)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_wad(self.0))
    }
}

impl FromStr for TokenAmount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_wad(s).map(Self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLABORATOR INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Balance bookkeeping of the debt asset, owned outside the engine
pub trait DebtAssetLedger {
    /// Credit freshly minted debt asset to `account`
    fn credit_account(&mut self, account: &AccountId, amount: TokenAmount) -> Result<()>;

    /// Debit (and retire) debt asset from `account`
    fn debit_account(&mut self, account: &AccountId, amount: TokenAmount) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABLE TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory stable token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableToken {
    /// Total supply
    total_supply: TokenAmount,
    /// Balances by holder; zero balances are not stored
    balances: BTreeMap<AccountId, TokenAmount>,
}

impl StableToken {
    /// Create an empty token
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total supply
    pub fn total_supply(&self) -> TokenAmount {
        self.total_supply
    }

    /// Get balance of an address
    pub fn balance_of(&self, owner: &AccountId) -> TokenAmount {
        self.balances.get(owner).copied().unwrap_or(TokenAmount::ZERO)
    }

    /// Mint new tokens to `to`
    pub fn mint(&mut self, to: &AccountId, amount: TokenAmount) -> Result<()> {
        validate_non_zero(amount.raw(), "mint amount")?;

        let new_balance = self.balance_of(to).checked_add(amount)?;
        let new_supply = self.total_supply.checked_add(amount)?;

        self.balances.insert(*to, new_balance);
        self.total_supply = new_supply;
        Ok(())
    }

    /// Burn tokens held by `from`
    pub fn burn(&mut self, from: &AccountId, amount: TokenAmount) -> Result<()> {
        validate_non_zero(amount.raw(), "burn amount")?;

        let balance = self.balance_of(from);
        if balance < amount {
            return Err(Error::InsufficientBalance {
                account: from.to_hex(),
                required: amount.raw(),
                available: balance.raw(),
            });
        }

        let new_balance = balance.checked_sub(amount)?;
        self.total_supply = self.total_supply.saturating_sub(amount);
        self.set_balance(*from, new_balance);
        Ok(())
    }

    /// Transfer tokens between holders
    pub fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: TokenAmount) -> Result<()> {
        validate_non_zero(amount.raw(), "transfer amount")?;

        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(Error::InsufficientBalance {
                account: from.to_hex(),
                required: amount.raw(),
                available: from_balance.raw(),
            });
        }
        if from == to {
            return Ok(());
        }

        let to_balance = self.balance_of(to).checked_add(amount)?;
        self.set_balance(*from, from_balance.checked_sub(amount)?);
        self.set_balance(*to, to_balance);
        Ok(())
    }

    /// Get number of holders
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// All balances, in address order
    pub fn balances(&self) -> impl Iterator<Item = (&AccountId, &TokenAmount)> {
        self.balances.iter()
    }

    /// Verify supply invariant (total supply == sum of balances)
    pub fn verify_supply_invariant(&self) -> bool {
        self.balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(b.raw()))
            .map(|sum| sum == self.total_supply.raw())
            .unwrap_or(false)
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Compute state hash
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        data.extend_from_slice(&self.total_supply.raw().to_be_bytes());
        for (holder, balance) in &self.balances {
            data.extend_from_slice(holder.as_bytes());
            data.extend_from_slice(&balance.raw().to_be_bytes());
        }
        Hash::sha256(&data)
    }

    fn set_balance(&mut self, holder: AccountId, balance: TokenAmount) {
        if balance.is_zero() {
            self.balances.remove(&holder);
        } else {
            self.balances.insert(holder, balance);
        }
    }
}

impl DebtAssetLedger for StableToken {
    fn credit_account(&mut self, account: &AccountId, amount: TokenAmount) -> Result<()> {
        self.mint(account, amount)
    }

    fn debit_account(&mut self, account: &AccountId, amount: TokenAmount) -> Result<()> {
        self.burn(account, amount)
    }
}
