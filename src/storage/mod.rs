//! Storage module for persistent engine state.
//!
//! ## Backends
//!
//! - **InMemoryStore**: ephemeral storage for tests
//! - **FileStore**: JSON file persistence used by the CLI
//!
//! ## Usage
//!
//! ```rust,ignore
//! use myusd::storage::{FileStore, StateManager};
//!
//! let manager = StateManager::new(FileStore::open("./data")?);
//! if let Some(snapshot) = manager.load_engine()? {
//!     // rebuild the engine from `snapshot`
//! }
//! ```

pub mod backend;
pub mod state;

pub use backend::*;
pub use state::*;
