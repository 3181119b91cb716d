//! Authenticated API client pipeline for the merchant console.
//!
//! ```text
//! ApiClient::send(RequestDescriptor)
//!     → EnvelopeLayer → AuthLayer → CleanParamsLayer → x-request-id
//!     → HttpTransport (reqwest)
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod session;
pub mod transport;

pub use config::schema::GatewayConfig;
pub use error::{PipelineError, PipelineResult, TransportError, UnauthorizedSource};
pub use crate::http::{ApiClient, RequestDescriptor};
pub use session::{SessionProvider, SessionStore};
pub use transport::HttpTransport;
