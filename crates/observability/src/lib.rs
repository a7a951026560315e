//! Observability for OpenHedge
//!
//! - Structured logging via tracing
//! - Prometheus metrics with protocol-specific helpers
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("openhedge", LogFormat::Json)?;
//! observability::metrics::init_metrics(9100)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, OpTimer, ProtocolMetrics};
