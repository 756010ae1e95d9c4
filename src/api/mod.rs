//! The status API: health probes and delivery lookups.

pub mod handlers;
pub mod router;

pub use handlers::{ApiDoc, ApiError};
pub use router::create_router;
