//! Request boundary
//!
//! Handles request parsing, dispatch to the file store, and reply generation.

pub mod handlers;
pub mod requests;
pub mod responses;

pub use handlers::{browse, handle_request};
pub use requests::{Request, RequestBody};
pub use responses::{Listing, Reply, ReplyBody};
