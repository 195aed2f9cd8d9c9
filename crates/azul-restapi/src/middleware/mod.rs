//! # HTTP Middleware
//!
//! - [`audit`]: one audit line per request, `X-Username` response header.
//! - [`cors`]: CORS layer built from the configured allow-lists.
//! - [`tracing_layer`]: request spans for application logs.

pub mod audit;
pub mod cors;
pub mod tracing_layer;
