//! File system storage management
//!
//! Handles path validation, the storage engine's lifecycle operations and
//! the registry of recently deleted paths.

pub mod filesystem;
pub mod operations;
pub mod results;
pub mod tombstone;
pub mod validation;

// Re-export commonly used items
pub use operations::FileStore;
pub use results::{EntryKind, StorageUsage, StoredEntry};
pub use tombstone::TombstoneRegistry;
pub use validation::{parent_segments, parse_path, resolve};
