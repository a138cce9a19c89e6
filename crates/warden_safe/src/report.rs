//! Deduplicated error reporting.

use core::error::Error;
use std::sync::LazyLock;

use hashbrown::HashMap;
use parking_lot::Mutex;

static GLOBAL: LazyLock<Reporter> = LazyLock::new(Reporter::new);

/// Reports `error` through the process-wide [`Reporter`].
///
/// Returns `true` when this is the first time the error was seen and it was
/// logged.
pub fn report(error: &(dyn Error + 'static)) -> bool {
    GLOBAL.report(error)
}

/// Logs each distinct error once and counts later occurrences.
///
/// Errors are keyed by their `Display` output. The table is bounded: once
/// `capacity` distinct errors are tracked it is reset, so a long-running
/// process keeps reporting new failures instead of growing without limit.
pub struct Reporter {
    seen: Mutex<HashMap<String, u64>>,
    capacity: usize,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    /// Distinct errors tracked before the table is reset.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates a reporter with [`DEFAULT_CAPACITY`](Self::DEFAULT_CAPACITY).
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a reporter tracking at most `capacity` distinct errors.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Records `error`, logging it if it has not been seen before.
    pub fn report(&self, error: &(dyn Error + 'static)) -> bool {
        let key = error.to_string();
        let mut seen = self.seen.lock();

        if let Some(count) = seen.get_mut(&key) {
            *count += 1;
            tracing::trace!(error = %key, occurrences = *count, "repeated error suppressed");
            return false;
        }

        if seen.len() >= self.capacity {
            seen.clear();
        }
        seen.insert(key, 1);
        drop(seen);

        tracing::error!(
            error = %error,
            source = ?error.source().map(ToString::to_string),
            "contained failure in protection callback"
        );
        true
    }

    /// Returns how many times an error with this message was reported.
    #[must_use]
    pub fn occurrences(&self, message: &str) -> u64 {
        self.seen.lock().get(message).copied().unwrap_or(0)
    }

    /// Forgets every recorded error.
    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PanicError;

    #[test]
    fn first_report_is_logged() {
        let reporter = Reporter::new();
        assert!(reporter.report(&PanicError::new("boom")));
        assert_eq!(reporter.occurrences("panic: boom"), 1);
    }

    #[test]
    fn repeats_are_counted_not_logged() {
        let reporter = Reporter::new();
        let error = PanicError::new("boom");

        assert!(reporter.report(&error));
        assert!(!reporter.report(&error));
        assert!(!reporter.report(&error));
        assert_eq!(reporter.occurrences("panic: boom"), 3);
    }

    #[test]
    fn distinct_errors_are_each_logged() {
        let reporter = Reporter::new();
        assert!(reporter.report(&PanicError::new("a")));
        assert!(reporter.report(&PanicError::new("b")));
    }

    #[test]
    fn full_table_is_reset() {
        let reporter = Reporter::with_capacity(2);
        assert!(reporter.report(&PanicError::new("a")));
        assert!(reporter.report(&PanicError::new("b")));
        assert!(reporter.report(&PanicError::new("c")));

        assert_eq!(reporter.occurrences("panic: a"), 0);
        assert_eq!(reporter.occurrences("panic: c"), 1);
        assert!(reporter.report(&PanicError::new("a")));
    }

    #[test]
    fn clear_forgets_errors() {
        let reporter = Reporter::new();
        let error = PanicError::new("boom");
        reporter.report(&error);
        reporter.clear();
        assert!(reporter.report(&error));
    }
}
