//! Request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! RequestDescriptor (descriptor.rs)
//!     → client.rs (resolve against base URL, assemble the layer stack)
//!     → response.rs (EnvelopeLayer: waits for the response, classifies it)
//!     → request.rs (AuthLayer: bearer token; CleanParamsLayer: drop empty params)
//!     → x-request-id (tower-http)
//!     → transport (reqwest, honours abort.rs signals)
//!     ← envelope.rs (code/message/data, paging)
//! ```

pub mod abort;
pub mod clean;
pub mod client;
pub mod descriptor;
pub mod envelope;
pub mod request;
pub mod response;

pub use abort::{AbortController, AbortSignal};
pub use client::{ApiClient, ApiClientBuilder};
pub use descriptor::{CurrentLocation, RequestBody, RequestDescriptor};
pub use envelope::{Envelope, Page, Paginate};
pub use request::{AuthLayer, CleanParamsLayer};
pub use response::EnvelopeLayer;
