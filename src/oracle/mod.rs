//! Oracle module for the collateral price.
//!
//! The engine reads one price per operation through [`PriceOracle`]. This
//! module provides the trait plus two implementations:
//! - [`FixedPriceOracle`] for tests and scripting
//! - [`PriceFeed`] with staleness, deviation and history checks
//!
//! ## Usage
//!
//! ```rust
//! use myusd::oracle::{PriceData, PriceFeed, PriceOracle};
//! use myusd::utils::math::FixedPoint;
//!
//! let mut feed = PriceFeed::new();
//! feed.update(PriceData::new(FixedPoint::from_integer(2_000), 1_000, "operator")).unwrap();
//! assert_eq!(feed.get_price(1_030).unwrap(), FixedPoint::from_integer(2_000));
//! ```

pub mod price_feed;

pub use price_feed::*;
