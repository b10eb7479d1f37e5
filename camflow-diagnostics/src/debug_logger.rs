//! Structured debug logging setup

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber
#[derive(Debug, Clone)]
pub struct DebugLogger {
    default_directive: String,
}

impl DebugLogger {
    /// Logger whose filter falls back to `default_directive` when `RUST_LOG`
    /// is unset or invalid
    pub fn new(default_directive: impl Into<String>) -> Self {
        Self {
            default_directive: default_directive.into(),
        }
    }

    /// Filter directive used without `RUST_LOG`
    pub fn default_directive(&self) -> &str {
        &self.default_directive
    }

    /// Build the filter from `RUST_LOG` or the default directive
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directive))
    }

    /// Install the subscriber; returns false if one is already installed
    pub fn init(&self) -> bool {
        tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_target(true)
            .try_init()
            .is_ok()
    }

    /// Install with the default `info` directive
    pub fn init_logging() -> bool {
        Self::default().init()
    }
}

impl Default for DebugLogger {
    fn default() -> Self {
        Self::new("info")
    }
}
