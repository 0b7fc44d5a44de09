//! Request handler module
//!
//! Routes `GET /test` and `GET /headers`; everything else is a 404.

pub mod endpoints;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
