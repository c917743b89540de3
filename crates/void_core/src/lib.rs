//! # void_core - Void Engine Core
//!
//! Foundational primitives shared by the asset pipeline crates:
//! - **Handles**: typed handles into an append-only [`Pool`]
//! - **Hashing**: deterministic content and name hashes that stay valid on disk

pub mod handle;
pub mod hash;

pub use handle::{Handle, Pool};
pub use hash::{hash_str, FileHash, Hash128};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::handle::{Handle, Pool};
    pub use crate::hash::{hash_str, FileHash, Hash128};
}
