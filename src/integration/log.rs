//! Per-attempt integration log
//!
//! One `IntegrationLog` value belongs to one job invocation and is passed
//! by `&mut` through every git step. Its final text is written to the
//! patch's `integration_log`.

use crate::error::Error;
use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt::Write as _;

const FAILURE_BANNER: &str = "******** unexpected error during integration ********";

/// Errors carry no backtrace of their own, so the one recorded points at the
/// job's failure handler rather than at the error's origin
const BACKTRACE_LABEL: &str = "backtrace (captured where the failure was logged, not where it arose):";

/// Captured transcript of one integration attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationLog {
    text: String,
}

impl IntegrationLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a command line and its (already trimmed) output
    pub fn record_command(&mut self, command_line: &str, output: &str) {
        let _ = writeln!(self.text, "$ {command_line}");
        if !output.is_empty() {
            let _ = writeln!(self.text, "{output}");
        }
    }

    /// Record an unexpected error with its source chain and a backtrace of
    /// the logging site
    pub fn record_error(&mut self, err: &Error) {
        self.banner();
        let _ = writeln!(self.text, "{err}");
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            let _ = writeln!(self.text, "caused by: {cause}");
            source = cause.source();
        }
        let _ = writeln!(self.text, "{err:?}");
        self.backtrace();
    }

    /// Record a panic payload caught from the integration attempt
    pub fn record_panic(&mut self, payload: &(dyn Any + Send)) {
        self.banner();
        let _ = writeln!(self.text, "panic: {}", panic_message(payload));
        self.backtrace();
    }

    fn backtrace(&mut self) {
        let _ = writeln!(self.text, "{BACKTRACE_LABEL}\n{}", Backtrace::force_capture());
    }

    fn banner(&mut self) {
        let _ = write!(self.text, "\n\n{FAILURE_BANNER}\n\n");
    }

    /// Log text so far
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Consume the log, returning its text
    pub fn into_string(self) -> String {
        self.text
    }
}

/// Best-effort rendering of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_command_skips_empty_output() {
        let mut log = IntegrationLog::new();
        log.record_command("cd /tmp && git push origin master:main", "");
        log.record_command("cd /tmp && git am /tmp/patch1", "Applying: fix bug");

        assert_eq!(
            log.as_str(),
            "$ cd /tmp && git push origin master:main\n\
             $ cd /tmp && git am /tmp/patch1\nApplying: fix bug\n"
        );
    }

    #[test]
    fn test_record_error_includes_description() {
        let mut log = IntegrationLog::new();
        log.record_error(&Error::Git("failed to run `git clone`: No such file".to_string()));

        assert!(log.as_str().contains(FAILURE_BANNER));
        assert!(log.as_str().contains("failed to run `git clone`: No such file"));
    }

    #[test]
    fn test_backtrace_is_labelled_with_capture_site() {
        let mut log = IntegrationLog::new();
        log.record_error(&Error::Store("connection pool exhausted".to_string()));
        let payload: Box<dyn Any + Send> = Box::new("boom");
        log.record_panic(payload.as_ref());

        assert_eq!(log.as_str().matches(BACKTRACE_LABEL).count(), 2);
        let error_part = &log.as_str()[..log.as_str().find("panic: boom").unwrap()];
        let debug_at = error_part.find("Store(").unwrap();
        assert!(error_part.find(BACKTRACE_LABEL).unwrap() > debug_at);
    }

    #[test]
    fn test_panic_message_handles_string_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
