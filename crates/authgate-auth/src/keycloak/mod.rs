//! Identity provider integration.
//!
//! Split along the provider's own API boundary: [`TokenClient`] speaks the
//! OpenID Connect token endpoint, [`UserDirectory`] speaks the admin REST
//! API, and [`CachedTokenClient`] adds an optional TTL cache over service
//! tokens.

mod admin;
mod cache;
mod tokens;

pub use admin::{ResetEmailError, UserDirectory, UserDraft};
pub use cache::CachedTokenClient;
pub use tokens::{IdpTokens, ServiceToken, TokenClient, TokenResponse};
