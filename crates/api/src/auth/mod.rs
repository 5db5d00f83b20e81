//! Authentication primitives.
//!
//! - [`jwt`] -- access-token generation and validation. Tokens carry the
//!   caller's tenant, which becomes the request's tenant context.

pub mod jwt;
