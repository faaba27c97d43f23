//! WebID profile server library.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod profile;

pub use config::schema::ServerConfig;
pub use error::ServerError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
