//! HTTP protocol layer module
//!
//! Response builders and conditional request support, decoupled from routing.

pub mod cache;
pub mod response;

// Re-export commonly used items
pub use cache::{check_etag_match, generate_etag};
pub use response::{
    build_304_response, build_404_response, build_500_response, build_ok_response,
    APPLICATION_JSON, TEXT_PLAIN,
};
