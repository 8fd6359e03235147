pub mod token;
pub mod verify;

pub use token::generate_token;
pub use verify::{require_internal, verify_internal};
