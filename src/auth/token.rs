//! Bearer token models owned by the token provider.

pub mod secret;
pub mod session;
