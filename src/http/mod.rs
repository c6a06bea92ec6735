//! HTTP surface: health reporting and the WebSocket entry point

pub mod routes;

pub use routes::build_router;
