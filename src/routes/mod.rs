//! Router Module Index
//!
//! Splits the API into two access tiers. Access control is attached per tier with an
//! axum layer in `create_router`.

/// Routes open to anonymous clients: sign-up, sign-in and published-session reads.
pub mod public;

/// Routes behind the `AuthUser` middleware. Ownership of individual sessions is
/// checked inside the handlers.
pub mod authenticated;
