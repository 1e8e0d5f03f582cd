//! Session tokens, redacted secrets, and parsed access-token claims.

pub mod claims;
pub mod token;

pub use claims::*;
pub use token::{secret::*, session::*};
