//! HTTP control surface
//!
//! Transport endpoints, session reads and the SSE event feed over the
//! session handle.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, AppContext};
