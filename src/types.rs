//! Failure type descriptors - explicit ancestry instead of runtime reflection.
//!
//! Every failure carries a `&'static FailureType` tag. A descriptor names the
//! type and points at its parent, so "is this failure an X or a descendant of
//! X" is answered by walking a short parent chain rather than by asking the
//! language about subtyping.
//!
//! # Identity
//!
//! Descriptors are compared by address. Two descriptors that happen to share
//! a name are still different types. For that reason descriptors must live in
//! `static` items (a `const` would be duplicated at every use site and lose
//! its identity); the `define_failure_type!` and `define_failure_types!`
//! macros enforce that.
//!
//! # Example
//!
//! ```rust
//! use faultgate::{define_failure_types, definitions, FailureType};
//!
//! define_failure_types! {
//!     &definitions::CORE_FAILURE => {
//!         ORDER_REJECTED = "OrderRejected",
//!         STOCK_EXHAUSTED = "StockExhausted",
//!     }
//! }
//!
//! assert!(definitions::CORE_FAILURE.is_assignable_from(&ORDER_REJECTED));
//! assert!(!ORDER_REJECTED.is_assignable_from(&STOCK_EXHAUSTED));
//! ```

use std::fmt;
use std::ptr;

/// A statically defined failure type with an optional parent.
///
/// # No-Copy/No-Clone Semantics
///
/// Like error codes, a descriptor is an identity, not a value. It is only
/// ever handled by `&'static` reference.
#[derive(Debug)]
pub struct FailureType {
    name: &'static str,
    parent: Option<&'static FailureType>,
}

impl FailureType {
    /// Create a root descriptor (no parent).
    ///
    /// # Panics
    ///
    /// Panics (at compile time in const contexts) if `name` is empty.
    #[inline]
    pub const fn root(name: &'static str) -> Self {
        assert!(!name.is_empty(), "Failure type name must not be empty");
        Self { name, parent: None }
    }

    /// Create a descriptor that descends from `parent`.
    ///
    /// # Panics
    ///
    /// Panics (at compile time in const contexts) if `name` is empty.
    #[inline]
    pub const fn derived(name: &'static str, parent: &'static FailureType) -> Self {
        assert!(!name.is_empty(), "Failure type name must not be empty");
        Self {
            name,
            parent: Some(parent),
        }
    }

    /// Human-readable type name.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Direct parent, if any.
    #[inline]
    pub const fn parent(&self) -> Option<&'static FailureType> {
        self.parent
    }

    /// Iterate from this type up to its root, starting with `self`.
    #[inline]
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// Number of ancestors above this type (a root has depth 0).
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }

    /// True when a failure of type `other` can be treated as `self`.
    ///
    /// That is the case when `other` is `self` or one of its descendants.
    #[inline]
    pub fn is_assignable_from(&self, other: &FailureType) -> bool {
        other.ancestors().any(|candidate| ptr::eq(candidate, self))
    }
}

impl PartialEq for FailureType {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for FailureType {}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Iterator over a descriptor and its ancestors.
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    next: Option<&'a FailureType>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a FailureType;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent;
        Some(current)
    }
}

/// Define a single failure type as a `static`.
///
/// # Example
///
/// ```rust
/// # use faultgate::{define_failure_type, definitions};
/// define_failure_type!(pub QUOTA_EXCEEDED = "QuotaExceeded" : &definitions::CORE_FAILURE);
/// define_failure_type!(pub PLUGIN_ROOT = "PluginFailure");
///
/// assert_eq!(QUOTA_EXCEEDED.name(), "QuotaExceeded");
/// assert!(PLUGIN_ROOT.parent().is_none());
/// ```
#[macro_export]
macro_rules! define_failure_type {
    ($(#[$meta:meta])* $vis:vis $ident:ident = $name:literal) => {
        $(#[$meta])*
        $vis static $ident: $crate::FailureType = $crate::FailureType::root($name);
    };
    ($(#[$meta:meta])* $vis:vis $ident:ident = $name:literal : $parent:expr) => {
        $(#[$meta])*
        $vis static $ident: $crate::FailureType = $crate::FailureType::derived($name, $parent);
    };
}

/// Define several failure types that share a parent.
///
/// # Example
///
/// ```rust
/// # use faultgate::{define_failure_types, definitions};
/// define_failure_types! {
///     &definitions::FAILURE => {
///         TIMEOUT = "Timeout",
///         UPSTREAM_UNAVAILABLE = "UpstreamUnavailable",
///     }
/// }
///
/// assert!(definitions::FAILURE.is_assignable_from(&TIMEOUT));
/// ```
#[macro_export]
macro_rules! define_failure_types {
    ($parent:expr => { $( $(#[$meta:meta])* $ident:ident = $name:literal ),+ $(,)? }) => {
        $(
            $crate::define_failure_type!($(#[$meta])* pub $ident = $name : $parent);
        )+
    };
}
