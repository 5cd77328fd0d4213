//! Cloud storage engine
//!
//! File store rooted at a single directory: path validation, streamed and
//! ranged transfers, zip archives of directories, cached thumbnails and the
//! rename/delete lifecycle.

pub mod config;
pub mod error;
pub mod protocol;
pub mod storage;
pub mod thumbnail;
pub mod transfer;
pub mod utils;

pub use config::StoreConfig;
pub use error::StoreError;
pub use storage::FileStore;
