//! Protocol implementations.

pub mod link_check;

// Re-export common types
pub use link_check::{
    LINK_CHECK_COMMAND, LINK_CHECK_RESPONSE, LinkCheckError, LinkVerifier, is_link_check_response,
};
