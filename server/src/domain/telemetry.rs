//! Exception reporting for absorbed, non-fatal failures

/// Destination for failures that are recorded but do not abort an operation
pub trait ExceptionSink: Send + Sync {
    /// `source` names the component, `subject` the offending record
    fn capture(&self, source: &'static str, subject: &str, message: &str);
}

/// Reports exceptions as `warn` events
#[derive(Debug, Default)]
pub struct TracingExceptionSink;

impl ExceptionSink for TracingExceptionSink {
    fn capture(&self, source: &'static str, subject: &str, message: &str) {
        tracing::warn!(source, subject, error = message, "Captured exception");
    }
}
