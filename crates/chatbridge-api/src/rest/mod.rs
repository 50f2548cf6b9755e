//! REST API

pub mod extract;
pub mod handlers;
pub mod router;

pub use router::create_router;
