//! HTTP command/query surface for the batch engine.

pub mod handlers;
pub mod routes;
pub mod stream;
pub mod types;

pub use handlers::ApiError;
pub use routes::routes;
