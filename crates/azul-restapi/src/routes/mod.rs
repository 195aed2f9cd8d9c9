//! # API Route Modules
//!
//! - `users`: caller self-service (`/v0/users/me`), guarded by the auth
//!   middleware.
//!
//! Routers here are mounted under the configured API prefix by
//! [`crate::app`].

pub mod users;
