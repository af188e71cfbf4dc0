//! Interception events: caller-supplied, eligibility-gated transforms.
//!
//! The event chain is a **cascade**, not a first-match lookup. Every event
//! is offered the running `(status_code, failure, behavior)` accumulator in
//! registration order; each eligible event replaces it with its own output,
//! so later events overwrite earlier ones. Nothing short-circuits.
//!
//! A behavior set by one event survives later events that return `None` for
//! the behavior. Only an event that supplies a behavior changes it.
//!
//! # Example
//!
//! ```rust
//! use faultgate::{BehaviorKind, EventChain, Failure, FnEvent, Interception};
//!
//! let mut chain = EventChain::new();
//! chain.push(FnEvent::new(
//!     |status, _failure: &Failure| status == 200,
//!     |_status, failure| Interception::new(418, failure).with_behavior(BehaviorKind::ClientFault),
//! ));
//!
//! let result = chain.run(200, Failure::generic("teapot"));
//! assert_eq!(result.status_code, 418);
//! assert_eq!(result.behavior, Some(BehaviorKind::ClientFault));
//! ```

use crate::{BehaviorKind, Failure};
use std::fmt;

/// Running state threaded through the event chain.
#[derive(Debug)]
pub struct Interception {
    /// Status code to respond with.
    pub status_code: u16,
    /// Failure to classify; events may replace it.
    pub failure: Failure,
    /// Decided behavior. `None` leaves the choice to default classification.
    pub behavior: Option<BehaviorKind>,
    pub(crate) status_overridden: bool,
}

impl Interception {
    /// Accumulator with no behavior decided yet.
    #[inline]
    pub fn new(status_code: u16, failure: Failure) -> Self {
        Self {
            status_code,
            failure,
            behavior: None,
            status_overridden: false,
        }
    }

    /// True once an event changed the status code or a behavior rule
    /// supplied one. Default classification keeps such a status.
    #[inline]
    pub fn status_overridden(&self) -> bool {
        self.status_overridden
    }

    /// Decide the behavior.
    #[inline]
    pub fn with_behavior(mut self, behavior: BehaviorKind) -> Self {
        self.behavior = Some(behavior);
        self
    }

    /// Offer this accumulator to one event.
    fn apply(self, event: &dyn InterceptionEvent) -> Self {
        if !event.is_eligible(self.status_code, &self.failure) {
            return self;
        }

        let Self {
            status_code,
            failure,
            behavior,
            status_overridden,
        } = self;
        let next = event.intercept(status_code, failure);

        Self {
            behavior: next.behavior.or(behavior),
            status_overridden: status_overridden || next.status_code != status_code,
            ..next
        }
    }
}

/// A pluggable step of the event chain.
///
/// Implementations must be `Send + Sync`: the configuration that owns them is
/// shared by every concurrent dispatch.
pub trait InterceptionEvent: Send + Sync {
    /// Whether `intercept` should run for the current state.
    fn is_eligible(&self, status_code: u16, failure: &Failure) -> bool;

    /// Produce the next state. May replace the failure entirely.
    fn intercept(&self, status_code: u16, failure: Failure) -> Interception;
}

/// Closure-backed `InterceptionEvent`.
pub struct FnEvent<E, I> {
    eligible: E,
    intercept: I,
}

impl<E, I> FnEvent<E, I>
where
    E: Fn(u16, &Failure) -> bool + Send + Sync,
    I: Fn(u16, Failure) -> Interception + Send + Sync,
{
    /// Event gated by `eligible` that runs `intercept`.
    pub fn new(eligible: E, intercept: I) -> Self {
        Self { eligible, intercept }
    }
}

impl<E, I> InterceptionEvent for FnEvent<E, I>
where
    E: Fn(u16, &Failure) -> bool + Send + Sync,
    I: Fn(u16, Failure) -> Interception + Send + Sync,
{
    #[inline]
    fn is_eligible(&self, status_code: u16, failure: &Failure) -> bool {
        (self.eligible)(status_code, failure)
    }

    #[inline]
    fn intercept(&self, status_code: u16, failure: Failure) -> Interception {
        (self.intercept)(status_code, failure)
    }
}

/// Ordered cascade of interception events.
#[derive(Default)]
pub struct EventChain {
    events: Vec<Box<dyn InterceptionEvent>>,
}

impl EventChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event at the end of the cascade.
    pub fn push(&mut self, event: impl InterceptionEvent + 'static) {
        self.events.push(Box::new(event));
    }

    /// Run every event in order over the accumulator.
    pub fn run(&self, status_code: u16, failure: Failure) -> Interception {
        self.events
            .iter()
            .fold(Interception::new(status_code, failure), |acc, event| {
                acc.apply(event.as_ref())
            })
    }

    /// Number of events.
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when no event is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl fmt::Debug for EventChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChain")
            .field("events", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{define_failure_type, definitions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    define_failure_type!(REPLACEMENT = "Replacement" : &definitions::CORE_FAILURE);

    fn always(_: u16, _: &Failure) -> bool {
        true
    }

    fn never(_: u16, _: &Failure) -> bool {
        false
    }

    #[test]
    fn empty_chain_is_identity() {
        let result = EventChain::new().run(200, Failure::generic("x"));
        assert_eq!(result.status_code, 200);
        assert_eq!(result.failure.message(), "x");
        assert!(result.behavior.is_none());
    }

    #[test]
    fn status_change_is_recorded() {
        let mut chain = EventChain::new();
        chain.push(FnEvent::new(always, |_, f| Interception::new(422, f)));
        chain.push(FnEvent::new(always, |s, f| Interception::new(s, f)));

        let result = chain.run(200, Failure::generic("x"));
        assert_eq!(result.status_code, 422);
        assert!(result.status_overridden());
    }

    #[test]
    fn pass_through_event_is_not_an_override() {
        let mut chain = EventChain::new();
        chain.push(FnEvent::new(always, |s, f| Interception::new(s, f)));
        chain.push(FnEvent::new(never, |_, f| Interception::new(409, f)));

        assert!(!chain.run(200, Failure::generic("x")).status_overridden());
    }

    #[test]
    fn later_eligible_event_overwrites_status() {
        let mut chain = EventChain::new();
        chain.push(FnEvent::new(always, |_, f| Interception::new(401, f)));
        chain.push(FnEvent::new(always, |_, f| Interception::new(409, f)));

        assert_eq!(chain.run(200, Failure::generic("x")).status_code, 409);
    }

    #[test]
    fn ineligible_events_are_skipped() {
        let mut chain = EventChain::new();
        chain.push(FnEvent::new(always, |_, f| Interception::new(401, f)));
        chain.push(FnEvent::new(never, |_, f| Interception::new(409, f)));

        assert_eq!(chain.run(200, Failure::generic("x")).status_code, 401);
    }

    #[test]
    fn eligibility_sees_the_running_state() {
        let mut chain = EventChain::new();
        chain.push(FnEvent::new(always, |_, f| Interception::new(422, f)));
        chain.push(FnEvent::new(
            |status, _: &Failure| status == 422,
            |_, f| Interception::new(400, f),
        ));

        assert_eq!(chain.run(200, Failure::generic("x")).status_code, 400);
    }

    #[test]
    fn behavior_survives_events_that_do_not_set_one() {
        let mut chain = EventChain::new();
        chain.push(FnEvent::new(always, |s, f| {
            Interception::new(s, f).with_behavior(BehaviorKind::ClientFault)
        }));
        chain.push(FnEvent::new(always, |_, f| Interception::new(418, f)));

        let result = chain.run(200, Failure::generic("x"));
        assert_eq!(result.status_code, 418);
        assert_eq!(result.behavior, Some(BehaviorKind::ClientFault));
    }

    #[test]
    fn later_behavior_replaces_earlier_one() {
        let mut chain = EventChain::new();
        chain.push(FnEvent::new(always, |s, f| {
            Interception::new(s, f).with_behavior(BehaviorKind::ClientFault)
        }));
        chain.push(FnEvent::new(always, |s, f| {
            Interception::new(s, f).with_behavior(BehaviorKind::ServerFault)
        }));

        let result = chain.run(200, Failure::generic("x"));
        assert_eq!(result.behavior, Some(BehaviorKind::ServerFault));
    }

    #[test]
    fn events_may_replace_the_failure() {
        let mut chain = EventChain::new();
        chain.push(FnEvent::new(
            |_, f: &Failure| f.is_a(&definitions::FAILURE),
            |s, f| Interception::new(s, Failure::new(&REPLACEMENT, format!("wrapped: {}", f.message()))),
        ));

        let result = chain.run(200, Failure::generic("original"));
        assert!(result.failure.is_a(&REPLACEMENT));
        assert_eq!(result.failure.message(), "wrapped: original");
    }

    #[test]
    fn every_eligible_event_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut chain = EventChain::new();
        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            chain.push(FnEvent::new(always, move |s, f| {
                calls.fetch_add(1, Ordering::Relaxed);
                Interception::new(s, f)
            }));
        }

        let _ = chain.run(200, Failure::generic("x"));
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert_eq!(chain.len(), 3);
    }
}
