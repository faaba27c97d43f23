//! Profile subsystem.
//!
//! # Data Flow
//! ```text
//! PUT body
//!     → document.rs (deserialize, validate)
//!     → store.rs (precondition check, persist, swap in memory)
//!
//! GET
//!     → store.rs (cached body + ETag)
//! ```

pub mod document;
pub mod store;

pub use document::{Agent, DocumentError, ProfileDocument};
pub use store::{IfMatch, ProfileStore, StoreError, StoredProfile, WriteOutcome};
