//! Logging sink and the structured view of a failure handed to it.
//!
//! The dispatcher logs at exactly two call sites:
//!
//! - **info**: client faults (with the failure) and access denials (without)
//! - **error**: server faults, with the correlation id returned to the caller
//!
//! # FailureLog
//!
//! `FailureLog` borrows from the failure and cannot outlive it, so a sink
//! has to consume diagnostics during the call instead of retaining them.
//! Unlike the response body it does include the stack trace and origin;
//! logs are internal.

use crate::{DeclaredField, Failure, FailureType};
use std::borrow::Cow;
use std::fmt;
use uuid::Uuid;

/// Maximum length for any individual field in formatted output (DoS prevention)
const MAX_FIELD_OUTPUT_LEN: usize = 1024;

/// Truncation indicator appended to truncated strings
const TRUNCATION_INDICATOR: &str = "...[TRUNCATED]";

/// Destination of the dispatcher's log events.
///
/// Shared by every concurrent dispatch, hence `Send + Sync`. A panicking sink
/// is not caught by the dispatcher.
pub trait LogSink: Send + Sync {
    /// Informational event, optionally about a failure.
    fn info(&self, message: &str, failure: Option<&Failure>);

    /// Error event correlated with the `logEntryId` sent to the client.
    fn error(&self, message: &str, correlation_id: Uuid, failure: Option<&Failure>);
}

impl<L: LogSink + ?Sized> LogSink for std::sync::Arc<L> {
    #[inline]
    fn info(&self, message: &str, failure: Option<&Failure>) {
        (**self).info(message, failure)
    }

    #[inline]
    fn error(&self, message: &str, correlation_id: Uuid, failure: Option<&Failure>) {
        (**self).error(message, correlation_id, failure)
    }
}

/// Structured log view of a failure.
#[derive(Debug)]
pub struct FailureLog<'a> {
    failure_type: &'a FailureType,
    message: &'a str,
    fields: &'a [DeclaredField],
    stack_trace: Option<&'a str>,
    origin: Option<&'a str>,
    cause: Option<&'a Failure>,
}

impl Failure {
    /// Borrow a structured log view of this failure.
    #[inline]
    pub fn failure_log(&self) -> FailureLog<'_> {
        FailureLog {
            failure_type: self.failure_type(),
            message: self.message(),
            fields: self.fields(),
            stack_trace: self.stack_trace(),
            origin: self.origin(),
            cause: self.cause(),
        }
    }

    /// Callback-style access that keeps the log view from escaping.
    #[inline]
    pub fn with_failure_log<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&FailureLog<'_>) -> R,
    {
        let log = self.failure_log();
        f(&log)
    }
}

impl<'a> FailureLog<'a> {
    /// Write the log line without allocating for short fields.
    ///
    /// Every field is truncated to a bounded length.
    pub fn write_to(&self, f: &mut impl fmt::Write) -> fmt::Result {
        write!(
            f,
            "[{}] message='{}'",
            self.failure_type,
            truncate_with_indicator(self.message)
        )?;

        for (name, value) in self.fields {
            let rendered = value.to_string();
            write!(f, " {}='{}'", name, truncate_with_indicator(&rendered))?;
        }

        if let Some(origin) = self.origin {
            write!(f, " origin='{}'", truncate_with_indicator(origin))?;
        }

        if let Some(cause) = self.cause {
            write!(
                f,
                " cause='{}: {}'",
                cause.failure_type(),
                truncate_with_indicator(cause.message())
            )?;
        }

        if let Some(stack_trace) = self.stack_trace {
            write!(f, " stack_trace='{}'", truncate_with_indicator(stack_trace))?;
        }

        Ok(())
    }

    /// Type descriptor of the failure.
    #[inline]
    pub const fn failure_type(&self) -> &FailureType {
        self.failure_type
    }

    /// Human-readable message.
    #[inline]
    pub const fn message(&self) -> &str {
        self.message
    }

    /// Declared fields, unfiltered.
    #[inline]
    pub const fn fields(&self) -> &[DeclaredField] {
        self.fields
    }

    /// Captured stack trace, if any.
    #[inline]
    pub const fn stack_trace(&self) -> Option<&str> {
        self.stack_trace
    }

    /// Component the failure originated in.
    #[inline]
    pub const fn origin(&self) -> Option<&str> {
        self.origin
    }

    /// Direct cause.
    #[inline]
    pub const fn cause(&self) -> Option<&Failure> {
        self.cause
    }
}

impl fmt::Display for FailureLog<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f)
    }
}

/// `LogSink` backed by `tracing`.
///
/// Emits events with `failure_type`, `failure` and (for errors)
/// `log_entry_id` fields. Install any `tracing` subscriber to collect them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn info(&self, message: &str, failure: Option<&Failure>) {
        match failure {
            Some(failure) => tracing::info!(
                failure_type = failure.failure_type().name(),
                failure = %failure.failure_log(),
                "{}",
                message
            ),
            None => tracing::info!("{}", message),
        }
    }

    fn error(&self, message: &str, correlation_id: Uuid, failure: Option<&Failure>) {
        match failure {
            Some(failure) => tracing::error!(
                log_entry_id = %correlation_id,
                failure_type = failure.failure_type().name(),
                failure = %failure.failure_log(),
                "{}: {}",
                correlation_id,
                message
            ),
            None => tracing::error!(log_entry_id = %correlation_id, "{}: {}", correlation_id, message),
        }
    }
}

/// Truncate a string for display to prevent DoS via extremely long error messages.
///
/// If the string exceeds MAX_FIELD_OUTPUT_LEN, it's truncated with an indicator
/// to make the truncation visible to operators.
///
/// Returns a Cow<str> to avoid allocation when no truncation is needed.
fn truncate_with_indicator(s: &str) -> Cow<'_, str> {
    if s.len() <= MAX_FIELD_OUTPUT_LEN {
        return Cow::Borrowed(s);
    }

    let max_content_len = MAX_FIELD_OUTPUT_LEN.saturating_sub(TRUNCATION_INDICATOR.len());

    // Last valid UTF-8 character boundary at or before the limit
    let mut idx = max_content_len;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }

    if idx == 0 {
        return Cow::Borrowed(TRUNCATION_INDICATOR);
    }

    let mut result = String::with_capacity(idx + TRUNCATION_INDICATOR.len());
    result.push_str(&s[..idx]);
    result.push_str(TRUNCATION_INDICATOR);
    Cow::Owned(result)
}
