//! fnexec Gateway - HTTP control surface for the function runtime

pub mod server;

pub use server::{build_router, start_gateway, ApiError, ExtendedConfig};
