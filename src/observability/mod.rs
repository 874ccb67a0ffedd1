//! Observability: structured console logging.

mod tracing_init;

pub use tracing_init::*;
