//! Authentication module
//!
//! Registration, password login and bearer-token sessions.

mod password;
mod service;

pub use password::{hash_password, hash_token, verify_password};
pub use service::{AuthError, AuthService, AuthSettings, IssuedToken};
