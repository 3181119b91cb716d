//! Network transport subsystem.
//!
//! # Data Flow
//! ```text
//! http::Request<Bytes> from the pipeline
//!     → http.rs (convert to reqwest, race against AbortSignal)
//!     → remote API
//!     → http::Response<Bytes> (body fully buffered)
//! ```
//!
//! # Design Decisions
//! - No retries and no request deadline; only the connect timeout applies
//! - Any `tower::Service` with the same shape can stand in for `HttpTransport`

pub mod http;

pub use self::http::HttpTransport;
