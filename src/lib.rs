//! # Faultgate
//!
//! Turns a runtime failure into an HTTP status code and a JSON body, after
//! giving a configurable, ordered set of overrides the first say.
//!
//! ## Design Philosophy
//!
//! 1. **Business faults are safe to expose**: their message and declared
//!    fields go back to the caller verbatim
//! 2. **Internal faults reveal nothing**: the caller gets a correlation id,
//!    operators get the full failure in the logs
//! 3. **Authorization failures are opaque**: one fixed body, always
//! 4. **Overrides are explicit and ordered**: an event cascade and a
//!    first-match behavior registry, both evaluated in registration order
//! 5. **Configuration is frozen**: built once at startup, shared read-only
//!
//! ## Pipeline
//!
//! ```text
//! Failure ──► Configuration::run ──► aggregate? ──yes──► recurse per inner failure
//!             (events, then rules)        │
//!                                         no
//!                                         ▼
//!                      behavior decided? ──no──► access denied? ──► 403 Forbidden
//!                                │                     │
//!                               yes              CoreFailure? ──► 400 client fault
//!                                │                     │
//!                                ▼                    else ──► 500 server fault
//!                        emit through the contract filter
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use faultgate::{
//!     define_failure_type, definitions, BufferedResponse, Dispatcher, Environment,
//!     Failure, ResponseSink, TracingLogSink,
//! };
//!
//! define_failure_type!(pub INSUFFICIENT_FUNDS = "InsufficientFunds" : &definitions::CORE_FAILURE);
//!
//! # fn main() -> faultgate::Result<()> {
//! let dispatcher = Dispatcher::builder().log_sink(TracingLogSink).build()?;
//!
//! let mut response = BufferedResponse::default();
//! let failure = Failure::new(&INSUFFICIENT_FUNDS, "Balance too low").with_field("Missing", 42);
//! dispatcher.dispatch(failure, Environment::Production, &mut response)?;
//!
//! assert_eq!(response.status_code(), 400);
//! assert_eq!(response.body(), br#"{"message":"Balance too low","missing":42}"#.to_vec());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuring overrides
//!
//! ```rust
//! use faultgate::{
//!     definitions, BehaviorKind, Configuration, Dispatcher, Environment, Failure,
//!     Interception, TracingLogSink,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> faultgate::Result<()> {
//! let configuration = Arc::new(Configuration::build(|cfg| {
//!     // Unauthenticated rather than forbidden
//!     cfg.add_behavior(&definitions::ACCESS_DENIED, BehaviorKind::ClientFault, 401)
//!         // Tag anything that mentions a deadline as a gateway timeout
//!         .add_event_fn(
//!             |_, failure: &Failure| failure.message().contains("deadline"),
//!             |_, failure| Interception::new(504, failure).with_behavior(BehaviorKind::ServerFault),
//!         );
//! }));
//!
//! let dispatcher = Dispatcher::builder()
//!     .log_sink(TracingLogSink)
//!     .configuration(configuration)
//!     .build()?;
//!
//! let emissions = dispatcher.classify(Failure::generic("deadline exceeded"), Environment::Production)?;
//! assert_eq!(emissions[0].status_code, 504);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::io;
use std::result;

pub mod behavior;
pub mod configuration;
pub mod contract;
pub mod definitions;
pub mod dispatcher;
pub mod events;
pub mod failure;
pub mod logging;
pub mod response;
pub mod ring_buffer;
pub mod types;

pub use behavior::*;
pub use configuration::*;
pub use contract::{FilteredFailure, MAX_DEPTH};
pub use dispatcher::*;
pub use events::*;
pub use failure::*;
pub use logging::*;
pub use response::*;
pub use ring_buffer::RingBufferLogSink;
pub use types::*;

/// Type alias for Results using our error type.
pub type Result<T> = result::Result<T, DispatchError>;

/// Failures of the dispatcher itself or of its collaborators.
///
/// A failure being *classified* never shows up here; it always ends in a
/// response. These variants cover setup mistakes and collaborator errors,
/// which are returned to the caller unmodified.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The dispatcher was built without a log sink.
    #[error("dispatcher requires a log sink")]
    MissingLogSink,

    /// A response body could not be serialized.
    #[error("failed to serialize response body")]
    Serialization(#[from] serde_json::Error),

    /// The response sink rejected a write.
    #[error("response sink rejected the body")]
    ResponseWrite(#[from] io::Error),
}
