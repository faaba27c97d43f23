//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, global layers)
//!     → request.rs (request ID, span)
//!     → middleware/cors.rs (only /profile)
//!     → auth (only PUT/DELETE /profile)
//!     → handlers.rs
//!     → response.rs (error → status code)
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppState, HttpServer};
