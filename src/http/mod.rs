//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs    (Axum setup, request ID, timeout)
//!     → chain.rs     (body buffering, client address, ordered filters)
//!     → filters/     (one concern each)
//!     → business handler (built-in, or upstream.rs forwarding)
//!     → response hooks back through chain.rs
//!     → Send to client
//! ```

pub mod chain;
pub mod client_ip;
pub mod error;
pub mod filters;
pub mod server;
pub mod upstream;

pub use chain::{filter_chain_middleware, Action, Filter, FilterChain, RequestContext};
pub use error::FilterError;
pub use server::{business_router, HttpServer, ServerError};
