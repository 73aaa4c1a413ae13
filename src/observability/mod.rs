//! Observability
//!
//! Structured logging setup and the span macros used to instrument the
//! driver and dispatcher tasks.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};

// Span macros for structured logging
pub use logging::{dispatch_span, mqtt_span};
