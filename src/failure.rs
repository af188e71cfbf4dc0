//! The failure value handed to the dispatcher.
//!
//! A `Failure` is a tagged, owned description of something that went wrong:
//!
//! - a `&'static FailureType` tag (see [`crate::types`])
//! - a human-readable message
//! - fields declared by the concrete failure type (`code`, `field`, ...),
//!   which are part of the public response contract
//! - base diagnostic fields (stack trace, origin, help link, ...), which are
//!   never part of a response body and are zeroized on drop
//! - an optional cause chain and, for aggregates, a list of inner failures
//!
//! # Example
//!
//! ```rust
//! use faultgate::{define_failure_type, definitions, Failure};
//!
//! define_failure_type!(pub INVALID_QUANTITY = "InvalidQuantity" : &definitions::CORE_FAILURE);
//!
//! let failure = Failure::new(&INVALID_QUANTITY, "Quantity must be positive")
//!     .with_field("Code", 7)
//!     .with_field("Field", "quantity")
//!     .with_stack_trace("at orders::validate (src/orders.rs:42)");
//!
//! assert!(failure.is_a(&definitions::CORE_FAILURE));
//! assert_eq!(failure.field("Code"), Some(&serde_json::json!(7)));
//! ```

use crate::definitions;
use crate::FailureType;
use serde_json::Value;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use zeroize::Zeroize;

/// A field declared by a concrete failure type: `(name, value)`.
pub type DeclaredField = (Cow<'static, str>, Value);

/// Diagnostic fields every failure inherits from the generic base type.
///
/// None of these are ever serialized into a response. Owned strings are
/// zeroized on drop.
#[derive(Default)]
struct BaseFields {
    stack_trace: Option<String>,
    origin: Option<String>,
    help_link: Option<String>,
    hresult: Option<i32>,
    data: SmallVec<[(Cow<'static, str>, String); 2]>,
}

impl Zeroize for BaseFields {
    fn zeroize(&mut self) {
        if let Some(s) = self.stack_trace.as_mut() {
            s.zeroize();
        }
        if let Some(s) = self.origin.as_mut() {
            s.zeroize();
        }
        if let Some(s) = self.help_link.as_mut() {
            s.zeroize();
        }
        self.hresult = None;
        for (key, value) in &mut self.data {
            if let Cow::Owned(k) = key {
                k.zeroize();
            }
            value.zeroize();
        }
        self.data.clear();
    }
}

impl Drop for BaseFields {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// A runtime failure to be classified.
///
/// Owned by the caller for the duration of one dispatch. Deliberately not
/// `Clone`: base fields may hold sensitive diagnostics.
pub struct Failure {
    failure_type: &'static FailureType,
    message: Cow<'static, str>,
    fields: SmallVec<[DeclaredField; 4]>,
    base: BaseFields,
    cause: Option<Box<Failure>>,
    inner: Vec<Failure>,
}

impl Failure {
    /// Create a failure of the given type.
    pub fn new(failure_type: &'static FailureType, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            failure_type,
            message: message.into(),
            fields: SmallVec::new(),
            base: BaseFields::default(),
            cause: None,
            inner: Vec::new(),
        }
    }

    /// Create a generic failure (`definitions::FAILURE`).
    #[inline]
    pub fn generic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(&definitions::FAILURE, message)
    }

    /// Create an access-denial failure (`definitions::ACCESS_DENIED`).
    #[inline]
    pub fn access_denied(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(&definitions::ACCESS_DENIED, message)
    }

    /// Create an aggregate failure bundling `inner`.
    pub fn aggregate(
        message: impl Into<Cow<'static, str>>,
        inner: impl IntoIterator<Item = Failure>,
    ) -> Self {
        let mut failure = Self::new(&definitions::AGGREGATE, message);
        failure.inner.extend(inner);
        failure
    }

    /// Attach a declared field. Later fields with the same name are kept as-is.
    pub fn with_field(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Attach the failure that caused this one.
    pub fn with_cause(mut self, cause: Failure) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Append an inner failure (meaningful for aggregates).
    pub fn with_inner(mut self, inner: Failure) -> Self {
        self.inner.push(inner);
        self
    }

    /// Record a stack trace. Never serialized into a response.
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.base.stack_trace = Some(stack_trace.into());
        self
    }

    /// Record the component the failure originated from. Never serialized.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.base.origin = Some(origin.into());
        self
    }

    /// Record a help link. Never serialized.
    pub fn with_help_link(mut self, help_link: impl Into<String>) -> Self {
        self.base.help_link = Some(help_link.into());
        self
    }

    /// Record a numeric result code. Never serialized.
    pub fn with_hresult(mut self, hresult: i32) -> Self {
        self.base.hresult = Some(hresult);
        self
    }

    /// Record an arbitrary diagnostic entry. Never serialized.
    pub fn with_data(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<String>) -> Self {
        self.base.data.push((key.into(), value.into()));
        self
    }

    /// The failure's type tag.
    #[inline]
    pub fn failure_type(&self) -> &'static FailureType {
        self.failure_type
    }

    /// The human-readable message.
    #[inline]
    pub fn message(&self) -> &str {
        self.message.as_ref()
    }

    /// Declared fields in insertion order.
    #[inline]
    pub fn fields(&self) -> &[DeclaredField] {
        &self.fields
    }

    /// First declared field with the given name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| key.as_ref() == name)
            .map(|(_, value)| value)
    }

    /// Recorded stack trace.
    #[inline]
    pub fn stack_trace(&self) -> Option<&str> {
        self.base.stack_trace.as_deref()
    }

    /// Component the failure originated from.
    #[inline]
    pub fn origin(&self) -> Option<&str> {
        self.base.origin.as_deref()
    }

    /// Recorded help link.
    #[inline]
    pub fn help_link(&self) -> Option<&str> {
        self.base.help_link.as_deref()
    }

    /// Recorded numeric result code.
    #[inline]
    pub fn hresult(&self) -> Option<i32> {
        self.base.hresult
    }

    /// Diagnostic data entries.
    pub fn data(&self) -> impl Iterator<Item = (&str, &str)> {
        self.base.data.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    /// The direct cause, if any.
    #[inline]
    pub fn cause(&self) -> Option<&Failure> {
        self.cause.as_deref()
    }

    /// The innermost failure of the cause chain (`self` when there is no cause).
    pub fn root_cause(&self) -> &Failure {
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            current = cause;
        }
        current
    }

    /// True when this failure is `failure_type` or one of its descendants.
    #[inline]
    pub fn is_a(&self, failure_type: &FailureType) -> bool {
        failure_type.is_assignable_from(self.failure_type)
    }

    /// True when this failure bundles inner failures.
    #[inline]
    pub fn is_aggregate(&self) -> bool {
        self.is_a(&definitions::AGGREGATE)
    }

    /// Inner failures of an aggregate (empty otherwise).
    #[inline]
    pub fn inner_failures(&self) -> &[Failure] {
        &self.inner
    }

    /// Consume the failure, keeping only its inner failures.
    pub fn into_inner_failures(self) -> Vec<Failure> {
        self.inner
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("type", &self.failure_type.name())
            .field("message", &self.message)
            .field("fields", &self.fields.len())
            .field("base", &"<REDACTED>")
            .field("cause", &self.cause.as_ref().map(|c| c.failure_type.name()))
            .field("inner", &self.inner.len())
            .finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.failure_type, self.message)
    }
}

impl Error for Failure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn Error + 'static))
    }
}
