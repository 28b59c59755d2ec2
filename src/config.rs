//! Runtime configuration.

/// Tunables of a [`Runtime`](crate::runtime::Runtime).
///
/// # Example
/// ```rust
/// use actorsim::config::RuntimeConfig;
///
/// let config = RuntimeConfig::default()
///     .with_precision(1e-6)
///     .with_strict_deadlock(false);
/// assert!(config.record_trace);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RuntimeConfig {
    /// Timing tolerance in seconds. Completions and timers due within this
    /// distance of the current date are delivered together.
    pub precision: f64,
    /// Keep the in-memory [`TraceEntry`](crate::trace::TraceEntry) log.
    pub record_trace: bool,
    /// Report blocked non-daemon actors at quiescence as an error instead
    /// of a warning.
    pub strict_deadlock: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            precision: 1e-9,
            record_trace: true,
            strict_deadlock: true,
        }
    }
}

impl RuntimeConfig {
    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision.abs();
        self
    }

    pub fn with_record_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }

    pub fn with_strict_deadlock(mut self, strict: bool) -> Self {
        self.strict_deadlock = strict;
        self
    }
}
