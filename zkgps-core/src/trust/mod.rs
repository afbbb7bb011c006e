//! Trust circles: how much location precision each contact may learn.
//!
//! # Architecture
//!
//! ```text
//! TrustCircleManager (in-memory, internally locked)
//!     ├── circles:  id -> TrustCircle
//!     ├── contacts: id -> ContactTrust
//!     └── export/import ──> TrustSnapshot ──> TrustStorage (SQLite)
//! ```
//!
//! # Types
//!
//! - [`TrustCircle`]: a group of contacts at one trust level
//! - [`ContactTrust`]: per-contact circles, override and pause state
//! - [`TrustSnapshot`]: the export/import format
//! - [`TrustCircleManager`]: CRUD and precision resolution
//! - [`TrustStorage`]: snapshot persistence

mod error;
mod manager;
mod storage;
pub mod types;

pub use error::{Result, TrustError};
pub use manager::TrustCircleManager;
pub use storage::TrustStorage;
pub use types::{
    ContactTrust, TrustCircle, TrustCircleConfig, TrustCircleUpdate, TrustLevel, TrustSnapshot,
};
