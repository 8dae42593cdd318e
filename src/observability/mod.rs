//! Log subscriber setup for the command-line binary.

mod tracing_init;

pub use tracing_init::{TracingError, build_env_filter, init_tracing};
