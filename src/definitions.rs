//! Built-in failure types the dispatcher recognizes.
//!
//! # Taxonomy
//!
//! ```text
//! Failure                 generic base; every failure type descends from it
//! ├── CoreFailure         business-rule violation marker -> client fault (400)
//! ├── AccessDenied        missing authorization          -> forbidden (403)
//! └── AggregateFailure    bundle of inner failures       -> flattened
//! ```
//!
//! Applications define their own types underneath these with
//! `define_failure_types!`. Anything that does not descend from
//! `CoreFailure`, `AccessDenied` or `AggregateFailure` is a server fault
//! unless the configuration says otherwise.

use crate::{define_failure_type, define_failure_types};

define_failure_type!(
    /// Generic base of every failure type.
    pub FAILURE = "Failure"
);

define_failure_types! {
    &FAILURE => {
        /// Marker for expected business/domain faults.
        CORE_FAILURE = "CoreFailure",
        /// Authorization failure. Always answered with a fixed 403 body.
        ACCESS_DENIED = "AccessDenied",
        /// A failure wrapping a collection of inner failures.
        AGGREGATE = "AggregateFailure",
    }
}
