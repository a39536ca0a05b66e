//! Engine state management with persistence.
//!
//! Layout:
//! - `cfg:meta` store metadata (format version, fixed-point scale, save time)
//! - `cfg:engine` engine configuration
//! - `pool:state` debt pool
//! - `pool:liquidations` liquidation statistics
//! - `pos:<account>` one position per account
//! - `prc:feed` price feed
//! - `bal:<account>` debt-asset balances

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::accrual::DebtPool;
use crate::core::config::EngineConfig;
use crate::core::position::Position;
use crate::core::token::{StableToken, TokenAmount};
use crate::error::{Error, Result};
use crate::liquidation::engine::LiquidationStats;
use crate::oracle::price_feed::PriceFeed;
use crate::protocol::engine::EngineSnapshot;
use crate::storage::backend::{make_key, prefixes, StorageBackend, TypedStore};
use crate::utils::constants::{ADDRESS_LENGTH, WAD_DECIMALS};
use crate::utils::crypto::{AccountId, Hash};

/// Current on-disk format version
pub const STORE_VERSION: u32 = 1;

const META_KEY: &[u8] = b"meta";
const ENGINE_KEY: &[u8] = b"engine";
const POOL_KEY: &[u8] = b"state";
const LIQUIDATIONS_KEY: &[u8] = b"liquidations";
const FEED_KEY: &[u8] = b"feed";

// ═══════════════════════════════════════════════════════════════════════════════
// STORE METADATA
// ═══════════════════════════════════════════════════════════════════════════════

/// Header written alongside every saved engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Format version
    pub version: u32,
    /// Fixed-point scale of every stored amount
    pub decimals: u32,
    /// Time of the last save
    pub saved_at: u64,
}

impl StoreMetadata {
    /// Metadata for the running build
    pub fn current(saved_at: u64) -> Self {
        Self {
            version: STORE_VERSION,
            decimals: WAD_DECIMALS,
            saved_at,
        }
    }

    /// Reject data this build cannot interpret
    pub fn check_compatible(&self) -> Result<()> {
        if self.decimals != WAD_DECIMALS {
            return Err(Error::Deserialization(format!(
                "stored amounts use {} decimals, expected {}",
                self.decimals, WAD_DECIMALS
            )));
        }
        if self.version > STORE_VERSION {
            return Err(Error::Deserialization(format!(
                "store format version {} is newer than supported version {}",
                self.version, STORE_VERSION
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE MANAGER
// ═══════════════════════════════════════════════════════════════════════════════

/// High-level state manager for the engine and its collaborators
pub struct StateManager<B: StorageBackend> {
    /// Underlying storage
    store: TypedStore<B>,
}

impl<B: StorageBackend> StateManager<B> {
    /// Create a new state manager
    pub fn new(backend: B) -> Self {
        Self {
            store: TypedStore::new(backend),
        }
    }

    /// Whether an engine has been saved
    pub fn is_initialized(&self) -> Result<bool> {
        self.store.exists(&make_key(prefixes::CONFIG, META_KEY))
    }

    /// Load the store metadata, if any
    pub fn load_metadata(&self) -> Result<Option<StoreMetadata>> {
        self.store.get(&make_key(prefixes::CONFIG, META_KEY))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ENGINE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Save an engine snapshot, replacing any previous one
    pub fn save_engine(&self, snapshot: &EngineSnapshot, saved_at: u64) -> Result<()> {
        if snapshot.decimals != WAD_DECIMALS {
            return Err(Error::Serialization(format!(
                "snapshot uses {} decimals, expected {}",
                snapshot.decimals, WAD_DECIMALS
            )));
        }

        self.store.set(
            &make_key(prefixes::CONFIG, META_KEY),
            &StoreMetadata::current(saved_at),
        )?;
        self.store
            .set(&make_key(prefixes::CONFIG, ENGINE_KEY), &snapshot.config)?;
        self.store.set(&make_key(prefixes::POOL, POOL_KEY), &snapshot.pool)?;
        self.store.set(
            &make_key(prefixes::POOL, LIQUIDATIONS_KEY),
            &snapshot.liquidation_stats,
        )?;

        self.store.delete_prefix(prefixes::POSITION)?;
        for (account, position) in &snapshot.positions {
            self.store
                .set(&make_key(prefixes::POSITION, account.as_bytes()), position)?;
        }

        debug!(positions = snapshot.positions.len(), "engine state saved");
        Ok(())
    }

    /// Load the saved engine snapshot; `None` when nothing was saved
    pub fn load_engine(&self) -> Result<Option<EngineSnapshot>> {
        let Some(metadata) = self.load_metadata()? else {
            return Ok(None);
        };
        metadata.check_compatible()?;

        let config: EngineConfig = self.require(prefixes::CONFIG, ENGINE_KEY)?;
        let pool: DebtPool = self.require(prefixes::POOL, POOL_KEY)?;
        let liquidation_stats: LiquidationStats = self
            .store
            .get(&make_key(prefixes::POOL, LIQUIDATIONS_KEY))?
            .unwrap_or_default();

        let mut positions = BTreeMap::new();
        for key in self.store.list_prefix(prefixes::POSITION)? {
            let account = account_from_key(&key, prefixes::POSITION)?;
            if let Some(position) = self.store.get::<Position>(&key)? {
                positions.insert(account, position);
            }
        }

        Ok(Some(EngineSnapshot {
            decimals: metadata.decimals,
            config,
            pool,
            positions,
            liquidation_stats,
        }))
    }

    /// Load one stored position
    pub fn load_position(&self, account: &AccountId) -> Result<Option<Position>> {
        self.store
            .get(&make_key(prefixes::POSITION, account.as_bytes()))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PRICE FEED
    // ═══════════════════════════════════════════════════════════════════════════

    /// Save the price feed
    pub fn save_price_feed(&self, feed: &PriceFeed) -> Result<()> {
        self.store.set(&make_key(prefixes::PRICE, FEED_KEY), feed)
    }

    /// Load the price feed
    pub fn load_price_feed(&self) -> Result<Option<PriceFeed>> {
        self.store.get(&make_key(prefixes::PRICE, FEED_KEY))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TOKEN BALANCES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Save every balance of the stable token, replacing previous ones
    pub fn save_token(&self, token: &StableToken) -> Result<()> {
        self.store.delete_prefix(prefixes::BALANCE)?;
        for (holder, balance) in token.balances() {
            self.store
                .set(&make_key(prefixes::BALANCE, holder.as_bytes()), balance)?;
        }
        Ok(())
    }

    /// Rebuild the stable token from stored balances
    pub fn load_token(&self) -> Result<StableToken> {
        let mut token = StableToken::new();
        for key in self.store.list_prefix(prefixes::BALANCE)? {
            let holder = account_from_key(&key, prefixes::BALANCE)?;
            if let Some(balance) = self.store.get::<TokenAmount>(&key)? {
                if !balance.is_zero() {
                    token.mint(&holder, balance)?;
                }
            }
        }
        Ok(token)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // UTILITY METHODS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Flush all pending writes
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    /// Clear all data
    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }

    /// Hash of every stored entry, in key order
    pub fn state_root(&self) -> Result<Hash> {
        let mut data = Vec::new();
        for key in self.store.list_prefix(b"")? {
            if let Some(value) = self.store.backend().get(&key)? {
                data.extend_from_slice(Hash::sha256(&key).as_bytes());
                data.extend_from_slice(Hash::sha256(&value).as_bytes());
            }
        }
        Ok(Hash::sha256(&data))
    }

    fn require<T: serde::de::DeserializeOwned>(&self, prefix: &[u8], key: &[u8]) -> Result<T> {
        let full_key = make_key(prefix, key);
        self.store.get(&full_key)?.ok_or_else(|| {
            Error::Storage(format!(
                "missing entry {}",
                String::from_utf8_lossy(&full_key)
            ))
        })
    }
}

fn account_from_key(key: &[u8], prefix: &[u8]) -> Result<AccountId> {
    let bytes = key
        .get(prefix.len()..)
        .filter(|b| b.len() == ADDRESS_LENGTH)
        .ok_or_else(|| Error::Deserialization(format!("malformed key {}", hex::encode(key))))?;
    let mut arr = [0u8; ADDRESS_LENGTH];
    arr.copy_from_slice(bytes);
    Ok(AccountId::new(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::DebtShares;
    use crate::core::vault::CollateralAmount;
    use crate::oracle::price_feed::PriceData;
    use crate::storage::backend::InMemoryStore;
    use crate::utils::math::FixedPoint;

    fn create_test_manager() -> StateManager<InMemoryStore> {
        StateManager::new(InMemoryStore::new())
    }

    fn sample_snapshot() -> EngineSnapshot {
        let mut positions = BTreeMap::new();
        positions.insert(
            AccountId::from_label("alice"),
            Position::new(CollateralAmount::from_whole(2), DebtShares::from_raw(500)),
        );
        let mut pool = DebtPool::initialize(100);
        pool.total_debt_shares = DebtShares::from_raw(500);

        EngineSnapshot {
            decimals: WAD_DECIMALS,
            config: EngineConfig::default(),
            pool,
            positions,
            liquidation_stats: LiquidationStats::default(),
        }
    }

    #[test]
    fn test_empty_store() {
        let manager = create_test_manager();
        assert!(!manager.is_initialized().unwrap());
        assert!(manager.load_engine().unwrap().is_none());
        assert!(manager.load_price_feed().unwrap().is_none());
        assert_eq!(manager.load_token().unwrap(), StableToken::new());
    }

    #[test]
    fn test_engine_roundtrip() {
        let manager = create_test_manager();
        let snapshot = sample_snapshot();

        manager.save_engine(&snapshot, 200).unwrap();
        assert!(manager.is_initialized().unwrap());
        assert_eq!(manager.load_engine().unwrap(), Some(snapshot));
        assert_eq!(manager.load_metadata().unwrap().unwrap().saved_at, 200);
    }

    #[test]
    fn test_closed_positions_are_removed() {
        let manager = create_test_manager();
        let mut snapshot = sample_snapshot();
        manager.save_engine(&snapshot, 1).unwrap();

        snapshot.positions.clear();
        snapshot.pool.total_debt_shares = DebtShares::ZERO;
        manager.save_engine(&snapshot, 2).unwrap();

        let loaded = manager.load_engine().unwrap().unwrap();
        assert!(loaded.positions.is_empty());
        assert!(manager
            .load_position(&AccountId::from_label("alice"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_scale_mismatch_rejected() {
        let manager = create_test_manager();
        manager.save_engine(&sample_snapshot(), 1).unwrap();

        let mut metadata = manager.load_metadata().unwrap().unwrap();
        metadata.decimals = 8;
        manager
            .store
            .set(&make_key(prefixes::CONFIG, META_KEY), &metadata)
            .unwrap();

        assert!(matches!(
            manager.load_engine(),
            Err(Error::Deserialization(_))
        ));
    }

    #[test]
    fn test_price_feed_and_token_roundtrip() {
        let manager = create_test_manager();

        let mut feed = PriceFeed::new();
        feed.update(PriceData::new(FixedPoint::from_integer(2_000), 10, "manual"))
            .unwrap();
        manager.save_price_feed(&feed).unwrap();
        assert_eq!(manager.load_price_feed().unwrap(), Some(feed));

        let mut token = StableToken::new();
        token
            .mint(&AccountId::from_label("alice"), TokenAmount::from_whole(50))
            .unwrap();
        manager.save_token(&token).unwrap();
        assert_eq!(manager.load_token().unwrap(), token);
    }

    #[test]
    fn test_state_root_changes_with_data() {
        let manager = create_test_manager();
        let empty_root = manager.state_root().unwrap();
        manager.save_engine(&sample_snapshot(), 1).unwrap();
        assert_ne!(manager.state_root().unwrap(), empty_root);
    }
}
