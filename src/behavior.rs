//! Behavior registry: explicit per-type overrides of the default classification.
//!
//! A `BehaviorRule` says "failures matching X are a client/server fault with
//! status N". Rules are evaluated **in registration order** and the first
//! match wins, even when a later rule is more specific. Registering a general
//! rule before a specific one therefore shadows the specific one; that is
//! part of the contract, not an accident.

use crate::{Failure, FailureType};
use std::fmt;

/// How a failure is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorKind {
    /// Expected fault caused by the caller. Message and declared fields are exposed.
    ClientFault,
    /// Unexpected internal fault. Internals are redacted and a correlation id is logged.
    ServerFault,
}

impl BehaviorKind {
    /// Status code used when nothing more specific was configured.
    #[inline]
    pub const fn default_status_code(self) -> u16 {
        match self {
            Self::ClientFault => 400,
            Self::ServerFault => 500,
        }
    }
}

/// Decides whether a rule applies to a failure.
#[derive(Clone, Copy)]
pub enum FailureMatcher {
    /// Matches the type itself and all of its descendants.
    Type(&'static FailureType),
    /// Matches whatever the predicate accepts.
    Predicate(fn(&Failure) -> bool),
}

impl FailureMatcher {
    /// Check a failure against this matcher.
    #[inline]
    pub fn matches(&self, failure: &Failure) -> bool {
        match self {
            Self::Type(failure_type) => failure.is_a(failure_type),
            Self::Predicate(predicate) => predicate(failure),
        }
    }
}

impl fmt::Debug for FailureMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(failure_type) => f.debug_tuple("Type").field(&failure_type.name()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

/// One registered override.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorRule {
    matcher: FailureMatcher,
    kind: BehaviorKind,
    status_code: u16,
}

impl BehaviorRule {
    /// Rule for an arbitrary matcher.
    pub fn new(matcher: FailureMatcher, kind: BehaviorKind, status_code: u16) -> Self {
        Self {
            matcher,
            kind,
            status_code,
        }
    }

    /// Rule matching a type and its descendants.
    pub fn for_type(failure_type: &'static FailureType, kind: BehaviorKind, status_code: u16) -> Self {
        Self::new(FailureMatcher::Type(failure_type), kind, status_code)
    }

    /// How failures are matched.
    #[inline]
    pub fn matcher(&self) -> &FailureMatcher {
        &self.matcher
    }

    /// Behavior applied on a match.
    #[inline]
    pub const fn kind(&self) -> BehaviorKind {
        self.kind
    }

    /// Status code applied on a match.
    #[inline]
    pub const fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Whether this rule applies to `failure`.
    #[inline]
    pub fn matches(&self, failure: &Failure) -> bool {
        self.matcher.matches(failure)
    }
}

/// Ordered, first-match collection of `BehaviorRule`s.
#[derive(Debug, Default)]
pub struct BehaviorRegistry {
    rules: Vec<BehaviorRule>,
}

impl BehaviorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. No de-duplication is performed.
    pub fn register(&mut self, rule: BehaviorRule) {
        self.rules.push(rule);
    }

    /// First rule, in registration order, that matches `failure`.
    pub fn resolve(&self, failure: &Failure) -> Option<&BehaviorRule> {
        self.rules.iter().find(|rule| rule.matches(failure))
    }

    /// Registered rules, in order.
    #[inline]
    pub fn rules(&self) -> &[BehaviorRule] {
        &self.rules
    }

    /// Number of rules.
    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rule is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{define_failure_types, definitions};

    define_failure_types! {
        &definitions::FAILURE => {
            STORAGE = "Storage",
            NETWORK = "Network",
        }
    }

    define_failure_types! {
        &STORAGE => {
            DISK_FULL = "DiskFull",
        }
    }

    #[test]
    fn default_status_codes() {
        assert_eq!(BehaviorKind::ClientFault.default_status_code(), 400);
        assert_eq!(BehaviorKind::ServerFault.default_status_code(), 500);
    }

    #[test]
    fn general_rule_registered_first_wins() {
        let mut registry = BehaviorRegistry::new();
        registry.register(BehaviorRule::for_type(&STORAGE, BehaviorKind::ServerFault, 503));
        registry.register(BehaviorRule::for_type(&DISK_FULL, BehaviorKind::ClientFault, 507));

        let rule = registry
            .resolve(&Failure::new(&DISK_FULL, "full"))
            .expect("rule should match");
        assert_eq!(rule.status_code(), 503);
        assert_eq!(rule.kind(), BehaviorKind::ServerFault);
    }

    #[test]
    fn specific_rule_registered_first_wins() {
        let mut registry = BehaviorRegistry::new();
        registry.register(BehaviorRule::for_type(&DISK_FULL, BehaviorKind::ClientFault, 507));
        registry.register(BehaviorRule::for_type(&STORAGE, BehaviorKind::ServerFault, 503));

        let rule = registry.resolve(&Failure::new(&DISK_FULL, "full")).expect("rule");
        assert_eq!(rule.status_code(), 507);

        let rule = registry.resolve(&Failure::new(&STORAGE, "io")).expect("rule");
        assert_eq!(rule.status_code(), 503);
    }

    #[test]
    fn unrelated_failure_resolves_to_nothing() {
        let mut registry = BehaviorRegistry::new();
        registry.register(BehaviorRule::for_type(&STORAGE, BehaviorKind::ServerFault, 503));

        assert!(registry.resolve(&Failure::new(&NETWORK, "down")).is_none());
        assert!(BehaviorRegistry::new().resolve(&Failure::generic("x")).is_none());
    }

    #[test]
    fn predicate_rules_share_the_same_order() {
        fn mentions_timeout(failure: &Failure) -> bool {
            failure.message().contains("timeout")
        }

        let mut registry = BehaviorRegistry::new();
        registry.register(BehaviorRule::new(
            FailureMatcher::Predicate(mentions_timeout),
            BehaviorKind::ServerFault,
            504,
        ));
        registry.register(BehaviorRule::for_type(&NETWORK, BehaviorKind::ServerFault, 502));

        let timed_out = Failure::new(&NETWORK, "upstream timeout");
        let refused = Failure::new(&NETWORK, "connection refused");

        assert_eq!(registry.resolve(&timed_out).map(BehaviorRule::status_code), Some(504));
        assert_eq!(registry.resolve(&refused).map(BehaviorRule::status_code), Some(502));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicates_are_kept() {
        let mut registry = BehaviorRegistry::new();
        registry.register(BehaviorRule::for_type(&STORAGE, BehaviorKind::ServerFault, 503));
        registry.register(BehaviorRule::for_type(&STORAGE, BehaviorKind::ClientFault, 409));

        assert_eq!(registry.len(), 2);
        let rule = registry.resolve(&Failure::new(&STORAGE, "x")).expect("rule");
        assert_eq!(rule.status_code(), 503);
    }
}
