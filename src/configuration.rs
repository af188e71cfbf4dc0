//! Process-wide dispatcher configuration.
//!
//! A `Configuration` is built exactly once, from a builder callback, and is
//! immutable afterwards. Share it as `Arc<Configuration>`; the read path
//! needs no locking.
//!
//! # Example
//!
//! ```rust
//! use faultgate::{BehaviorKind, Configuration, Failure, Interception, definitions};
//! use std::sync::Arc;
//!
//! let configuration = Arc::new(Configuration::build(|cfg| {
//!     cfg.add_behavior(&definitions::ACCESS_DENIED, BehaviorKind::ClientFault, 401)
//!         .add_event_fn(
//!             |status, _failure: &Failure| status == 200,
//!             |status, failure| Interception::new(status, failure),
//!         );
//! }));
//!
//! assert!(configuration.has_behaviors());
//! assert_eq!(configuration.events().len(), 1);
//! ```

use crate::{
    BehaviorKind, BehaviorRegistry, BehaviorRule, EventChain, Failure, FailureMatcher,
    FailureType, FnEvent, Interception, InterceptionEvent,
};

/// Name of the environment variable read by [`Environment::from_env`].
pub const ENVIRONMENT_VARIABLE: &str = "FAULTGATE_ENVIRONMENT";

/// Deployment mode. Development unlocks verbose, non-redacted payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    /// Compact bodies, no internal details.
    #[default]
    Production,
    /// Indented bodies; server faults carry the filtered root cause.
    Development,
}

impl Environment {
    /// Read [`ENVIRONMENT_VARIABLE`]. Call once at startup.
    pub fn from_env() -> Self {
        Self::from_env_var(ENVIRONMENT_VARIABLE)
    }

    /// Read a custom variable. Unset or non-unicode values mean production.
    pub fn from_env_var(name: &str) -> Self {
        std::env::var(name)
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    /// `"Development"` (any case, surrounding whitespace ignored) selects
    /// development; everything else is production.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("development") {
            Self::Development
        } else {
            Self::Production
        }
    }

    /// True for [`Environment::Development`].
    #[inline]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Immutable set of interception events and behavior rules.
#[derive(Debug, Default)]
pub struct Configuration {
    events: EventChain,
    behaviors: BehaviorRegistry,
}

impl Configuration {
    /// Run `configure` once against a fresh builder and freeze the result.
    pub fn build<F>(configure: F) -> Self
    where
        F: FnOnce(&mut ConfigurationBuilder),
    {
        let mut builder = ConfigurationBuilder::default();
        configure(&mut builder);
        builder.finish()
    }

    /// Registered interception events, in cascade order.
    #[inline]
    pub fn events(&self) -> &EventChain {
        &self.events
    }

    /// Registered behavior rules.
    #[inline]
    pub fn behaviors(&self) -> &BehaviorRegistry {
        &self.behaviors
    }

    /// True when at least one behavior rule was registered.
    #[inline]
    pub fn has_behaviors(&self) -> bool {
        !self.behaviors.is_empty()
    }

    /// First matching behavior rule, in registration order.
    #[inline]
    pub fn validate_behavior(&self, failure: &Failure) -> Option<&BehaviorRule> {
        self.behaviors.resolve(failure)
    }

    /// Event cascade followed by the behavior lookup.
    ///
    /// The lookup matches the failure as it was handed in, before any event
    /// could replace it. A matching rule overwrites the status code and the
    /// behavior after the cascade, never the failure.
    pub fn run(&self, status_code: u16, failure: Failure) -> Interception {
        let rule = if self.has_behaviors() {
            self.validate_behavior(&failure).copied()
        } else {
            None
        };

        let mut interception = self.events.run(status_code, failure);

        if let Some(rule) = rule {
            interception.status_code = rule.status_code();
            interception.behavior = Some(rule.kind());
            interception.status_overridden = true;
        }

        interception
    }
}

/// Collects events and rules while a `Configuration` is being built.
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    events: EventChain,
    behaviors: BehaviorRegistry,
}

impl ConfigurationBuilder {
    /// Register a rule for `failure_type` and all of its descendants.
    pub fn add_behavior(
        &mut self,
        failure_type: &'static FailureType,
        kind: BehaviorKind,
        status_code: u16,
    ) -> &mut Self {
        self.behaviors
            .register(BehaviorRule::for_type(failure_type, kind, status_code));
        self
    }

    /// Register a rule for every failure the predicate accepts.
    pub fn add_behavior_when(
        &mut self,
        predicate: fn(&Failure) -> bool,
        kind: BehaviorKind,
        status_code: u16,
    ) -> &mut Self {
        self.behaviors.register(BehaviorRule::new(
            FailureMatcher::Predicate(predicate),
            kind,
            status_code,
        ));
        self
    }

    /// Append an event to the cascade.
    pub fn add_event(&mut self, event: impl InterceptionEvent + 'static) -> &mut Self {
        self.events.push(event);
        self
    }

    /// Append a closure-backed event to the cascade.
    pub fn add_event_fn<E, I>(&mut self, eligible: E, intercept: I) -> &mut Self
    where
        E: Fn(u16, &Failure) -> bool + Send + Sync + 'static,
        I: Fn(u16, Failure) -> Interception + Send + Sync + 'static,
    {
        self.add_event(FnEvent::new(eligible, intercept))
    }

    fn finish(self) -> Configuration {
        Configuration {
            events: self.events,
            behaviors: self.behaviors,
        }
    }
}
