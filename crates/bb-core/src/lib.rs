//! bulletin-board/crates/bb-core/src/lib.rs
//!
//! The central domain logic and interface definitions for the bulletin board:
//! ads, their comments, how they are keyed and how they are persisted.

pub mod clock;
pub mod codec;
pub mod error;
pub mod id;
pub mod memory;
pub mod models;
pub mod repo;
pub mod traits;

// Re-exporting for easier access in other crates
pub use clock::{FixedClock, SystemClock};
pub use error::*;
pub use id::TimestampIdGenerator;
pub use memory::MemoryStore;
pub use models::*;
pub use repo::{AdRepository, AppendMode};
pub use traits::*;
