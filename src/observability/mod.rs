//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline layers and the session store produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (request outcome and session expiry counters)
//!
//! Consumers:
//!     → stderr (tracing-subscriber fmt layer)
//!     → whatever metrics recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every outgoing call
//! - Metrics are counters only; no exporter is started by the library

pub mod logging;
pub mod metrics;
