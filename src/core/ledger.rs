//! Share-based debt ledger.
//!
//! Each account owes a number of debt shares; its debt is those shares valued at
//! the pool's exchange rate. Changes are planned against a pool without side
//! effects and applied later with infallible writes:
//!
//! - Mint: shares rounded **up**, so a borrower never receives debt for free
//! - Burn: shares rounded **down**, and a full repayment clears every share
//! - Write-off: all shares removed, the unpaid remainder becomes bad debt

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::accrual::DebtPool;
use crate::error::{Error, Result};
use crate::utils::crypto::{AccountId, Hash};
use crate::utils::math::{checked_add, checked_sub, format_wad, wad_serde, Rounding};
use crate::utils::validation::validate_non_zero;

// ═══════════════════════════════════════════════════════════════════════════════
// DEBT SHARES
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed debt share count (18 decimals)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct DebtShares(#[serde(with = "wad_serde")] u128);

impl DebtShares {
    /// Zero shares
    pub const ZERO: Self = Self(0);

    /// Create from a raw 18-decimal value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Raw 18-decimal value
    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Result<Self> {
        checked_add(self.0, other.0, "debt shares add").map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        checked_sub(self.0, other.0, "debt shares sub").map(Self)
    }

    /// Minimum of two values
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl fmt::Display for DebtShares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_wad(self.0))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLANNED CHANGES
// ═══════════════════════════════════════════════════════════════════════════════

/// Kind of ledger change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebtChangeKind {
    /// New debt issued
    Mint,
    /// Debt repaid
    Burn,
    /// Position closed; any unpaid remainder written off
    WriteOff,
}

/// A validated ledger change ready to apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtChange {
    /// Kind of change
    pub kind: DebtChangeKind,
    /// Account affected
    pub account: AccountId,
    /// Debt issued or repaid
    #[serde(with = "wad_serde")]
    pub amount: u128,
    /// Shares added or removed
    pub shares: DebtShares,
    /// Debt written off as bad debt
    #[serde(with = "wad_serde")]
    pub written_off: u128,
    /// Account shares after the change
    pub account_shares_after: DebtShares,
    /// Account debt after the change
    #[serde(with = "wad_serde")]
    pub debt_after: u128,
    /// Pool share total after the change
    pub total_shares_after: DebtShares,
    /// Pool bad debt after the change
    #[serde(with = "wad_serde")]
    pub bad_debt_after: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEBT LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-account debt shares
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtLedger {
    /// Shares by account; zero balances are not stored
    shares: BTreeMap<AccountId, DebtShares>,
}

impl DebtLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares owed by an account
    pub fn shares_of(&self, account: &AccountId) -> DebtShares {
        self.shares.get(account).copied().unwrap_or(DebtShares::ZERO)
    }

    /// `debt_shares * exchange_rate`, rounded up
    pub fn current_debt(&self, pool: &DebtPool, account: &AccountId) -> Result<u128> {
        pool.shares_to_debt(self.shares_of(account), Rounding::Up)
    }

    /// Accounts holding shares, in address order
    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &DebtShares)> {
        self.shares.iter()
    }

    /// Number of accounts with debt
    pub fn debtor_count(&self) -> usize {
        self.shares.len()
    }

    /// Sum of every account's shares
    pub fn total_shares(&self) -> Result<DebtShares> {
        self.shares
            .values()
            .try_fold(DebtShares::ZERO, |acc, s| acc.checked_add(*s))
    }

    /// Plan issuing `amount` of new debt to `account`
    pub fn plan_mint(&self, pool: &DebtPool, account: AccountId, amount: u128) -> Result<DebtChange> {
        validate_non_zero(amount, "mint amount")?;

        let shares = pool.debt_to_shares(amount, Rounding::Up)?;
        let account_shares_after = self.shares_of(&account).checked_add(shares)?;
        let total_shares_after = pool.total_debt_shares.checked_add(shares)?;
        let debt_after = pool.shares_to_debt(account_shares_after, Rounding::Up)?;

        Ok(DebtChange {
            kind: DebtChangeKind::Mint,
            account,
            amount,
            shares,
            written_off: 0,
            account_shares_after,
            debt_after,
            total_shares_after,
            bad_debt_after: pool.bad_debt,
        })
    }

    /// Plan repaying up to `amount` of `account`'s debt.
    ///
    /// The amount is clamped to the current debt. Repaying all of it removes
    /// every share the account holds.
    pub fn plan_burn(&self, pool: &DebtPool, account: AccountId, amount: u128) -> Result<DebtChange> {
        validate_non_zero(amount, "repay amount")?;

        let held = self.shares_of(&account);
        let outstanding = pool.shares_to_debt(held, Rounding::Up)?;
        if outstanding == 0 {
            return Err(Error::ExceedsOutstandingDebt {
                requested: amount,
                outstanding,
            });
        }

        let repay = amount.min(outstanding);
        let shares = if repay == outstanding {
            held
        } else {
            pool.debt_to_shares(repay, Rounding::Down)?.min(held)
        };

        let account_shares_after = held.checked_sub(shares)?;
        let total_shares_after = pool.total_debt_shares.checked_sub(shares)?;
        let debt_after = pool.shares_to_debt(account_shares_after, Rounding::Up)?;

        Ok(DebtChange {
            kind: DebtChangeKind::Burn,
            account,
            amount: repay,
            shares,
            written_off: 0,
            account_shares_after,
            debt_after,
            total_shares_after,
            bad_debt_after: pool.bad_debt,
        })
    }

    /// Plan closing `account`: `repaid` is covered, the rest becomes bad debt
    pub fn plan_write_off(&self, pool: &DebtPool, account: AccountId, repaid: u128) -> Result<DebtChange> {
        let held = self.shares_of(&account);
        let outstanding = pool.shares_to_debt(held, Rounding::Up)?;
        let repay = repaid.min(outstanding);
        let written_off = outstanding - repay;

        Ok(DebtChange {
            kind: DebtChangeKind::WriteOff,
            account,
            amount: repay,
            shares: held,
            written_off,
            account_shares_after: DebtShares::ZERO,
            debt_after: 0,
            total_shares_after: pool.total_debt_shares.checked_sub(held)?,
            bad_debt_after: pool.with_bad_debt(written_off)?,
        })
    }

    /// Commit a planned change to the ledger and the pool it was planned against
    pub fn apply(&mut self, pool: &mut DebtPool, change: &DebtChange) {
        if change.account_shares_after.is_zero() {
            self.shares.remove(&change.account);
        } else {
            self.shares.insert(change.account, change.account_shares_after);
        }
        pool.total_debt_shares = change.total_shares_after;
        pool.bad_debt = change.bad_debt_after;
    }

    /// Plan and apply a mint
    pub fn mint(&mut self, pool: &mut DebtPool, account: AccountId, amount: u128) -> Result<DebtChange> {
        let change = self.plan_mint(pool, account, amount)?;
        self.apply(pool, &change);
        Ok(change)
    }

    /// Plan and apply a burn
    pub fn burn(&mut self, pool: &mut DebtPool, account: AccountId, amount: u128) -> Result<DebtChange> {
        let change = self.plan_burn(pool, account, amount)?;
        self.apply(pool, &change);
        Ok(change)
    }

    /// Verify ledger invariant (pool total == sum of account shares)
    pub fn verify_invariant(&self, pool: &DebtPool) -> bool {
        self.total_shares()
            .map(|sum| sum == pool.total_debt_shares)
            .unwrap_or(false)
    }

    /// Compute state hash
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        for (account, shares) in &self.shares {
            data.extend_from_slice(account.as_bytes());
            data.extend_from_slice(&shares.raw().to_be_bytes());
        }
        Hash::sha256(&data)
    }

    /// Insert shares directly; used when restoring persisted positions
    pub(crate) fn restore(&mut self, account: AccountId, shares: DebtShares) {
        if !shares.is_zero() {
            self.shares.insert(account, shares);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::WAD;
    use crate::utils::math::FixedPoint;
    use proptest::prelude::*;

    fn alice() -> AccountId {
        AccountId::from_label("alice")
    }

    fn bob() -> AccountId {
        AccountId::from_label("bob")
    }

    fn whole(n: u64) -> u128 {
        FixedPoint::from_integer(n).raw()
    }

    #[test]
    fn test_mint_at_par() {
        let mut pool = DebtPool::initialize(0);
        let mut ledger = DebtLedger::new();

        let change = ledger.mint(&mut pool, alice(), whole(1_000)).unwrap();
        assert_eq!(change.shares.raw(), whole(1_000));
        assert_eq!(ledger.current_debt(&pool, &alice()).unwrap(), whole(1_000));
        assert_eq!(pool.total_debt_shares.raw(), whole(1_000));
        assert!(ledger.verify_invariant(&pool));
    }

    #[test]
    fn test_mint_rounds_shares_up() {
        let mut pool = DebtPool::initialize(0);
        pool.exchange_rate = FixedPoint::from_raw(3 * WAD);
        let ledger = DebtLedger::new();

        let change = ledger.plan_mint(&pool, alice(), 10).unwrap();
        assert_eq!(change.shares.raw(), 4);
        assert!(change.debt_after >= 10);
    }

    #[test]
    fn test_mint_zero_rejected() {
        let pool = DebtPool::initialize(0);
        let ledger = DebtLedger::new();
        let err = ledger.plan_mint(&pool, alice(), 0).unwrap_err();
        assert!(err.is_invalid_amount());
    }

    #[test]
    fn test_plan_has_no_side_effects() {
        let pool = DebtPool::initialize(0);
        let ledger = DebtLedger::new();
        ledger.plan_mint(&pool, alice(), whole(5)).unwrap();
        assert!(ledger.shares_of(&alice()).is_zero());
        assert!(pool.total_debt_shares.is_zero());
    }

    #[test]
    fn test_partial_burn() {
        let mut pool = DebtPool::initialize(0);
        let mut ledger = DebtLedger::new();
        ledger.mint(&mut pool, alice(), whole(1_000)).unwrap();

        let change = ledger.burn(&mut pool, alice(), whole(400)).unwrap();
        assert_eq!(change.amount, whole(400));
        assert_eq!(ledger.current_debt(&pool, &alice()).unwrap(), whole(600));
        assert!(ledger.verify_invariant(&pool));
    }

    #[test]
    fn test_burn_clamps_to_debt_and_clears_shares() {
        let mut pool = DebtPool::initialize(0);
        let mut ledger = DebtLedger::new();
        ledger.mint(&mut pool, alice(), whole(100)).unwrap();
        pool.exchange_rate = FixedPoint::from_raw(WAD + WAD / 3);

        let debt = ledger.current_debt(&pool, &alice()).unwrap();
        let change = ledger.burn(&mut pool, alice(), whole(1_000)).unwrap();

        assert_eq!(change.amount, debt);
        assert!(ledger.shares_of(&alice()).is_zero());
        assert!(pool.total_debt_shares.is_zero());
        assert_eq!(ledger.debtor_count(), 0);
    }

    #[test]
    fn test_burn_without_debt_rejected() {
        let pool = DebtPool::initialize(0);
        let ledger = DebtLedger::new();
        let err = ledger.plan_burn(&pool, alice(), whole(1)).unwrap_err();
        assert!(matches!(err, Error::ExceedsOutstandingDebt { outstanding: 0, .. }));
    }

    #[test]
    fn test_write_off_records_bad_debt() {
        let mut pool = DebtPool::initialize(0);
        let mut ledger = DebtLedger::new();
        ledger.mint(&mut pool, alice(), whole(1_000)).unwrap();
        ledger.mint(&mut pool, bob(), whole(50)).unwrap();

        let change = ledger.plan_write_off(&pool, alice(), whole(700)).unwrap();
        ledger.apply(&mut pool, &change);

        assert_eq!(change.written_off, whole(300));
        assert_eq!(pool.bad_debt, whole(300));
        assert!(ledger.shares_of(&alice()).is_zero());
        assert_eq!(pool.total_debt_shares.raw(), whole(50));
        assert!(ledger.verify_invariant(&pool));
    }

    #[test]
    fn test_state_hash_deterministic() {
        let mut pool1 = DebtPool::initialize(0);
        let mut pool2 = DebtPool::initialize(0);
        let mut ledger1 = DebtLedger::new();
        let mut ledger2 = DebtLedger::new();

        ledger1.mint(&mut pool1, alice(), whole(1)).unwrap();
        ledger1.mint(&mut pool1, bob(), whole(2)).unwrap();
        ledger2.mint(&mut pool2, bob(), whole(2)).unwrap();
        ledger2.mint(&mut pool2, alice(), whole(1)).unwrap();

        assert_eq!(ledger1.state_hash(), ledger2.state_hash());
    }

    proptest! {
        #[test]
        fn prop_share_sum_matches_pool(
            ops in proptest::collection::vec((any::<bool>(), 0usize..3, 1u64..1_000_000), 1..40),
            rate_bump in 0u128..WAD,
        ) {
            let accounts = [alice(), bob(), AccountId::from_label("carol")];
            let mut pool = DebtPool::initialize(0);
            pool.exchange_rate = FixedPoint::from_raw(WAD + rate_bump);
            let mut ledger = DebtLedger::new();

            for (is_mint, idx, amount) in ops {
                let account = accounts[idx];
                let amount = amount as u128 * 1_000_000_000;
                let _ = if is_mint {
                    ledger.mint(&mut pool, account, amount)
                } else {
                    ledger.burn(&mut pool, account, amount)
                };
                prop_assert!(ledger.verify_invariant(&pool));
            }
        }

        #[test]
        fn prop_mint_then_burn_returns_shares(
            amount in 1u128..1_000_000 * WAD,
            rate_bump in 0u128..WAD,
            prior in 0u128..1_000 * WAD,
        ) {
            let mut pool = DebtPool::initialize(0);
            pool.exchange_rate = FixedPoint::from_raw(WAD + rate_bump);
            let mut ledger = DebtLedger::new();
            if prior > 0 {
                ledger.mint(&mut pool, alice(), prior).unwrap();
            }
            let before = ledger.shares_of(&alice()).raw();

            let minted = ledger.mint(&mut pool, alice(), amount).unwrap();
            ledger.burn(&mut pool, alice(), amount).unwrap();
            let after = ledger.shares_of(&alice()).raw();

            prop_assert!(after >= before);
            prop_assert!(after <= before + 1);
            prop_assert!(after - before < minted.shares.raw() || minted.shares.raw() <= 1);
        }
    }
}
