//! Overriding the defaults with interception events and behavior rules.
//!
//! Run with: cargo run --example configured_pipeline

use faultgate::{
    define_failure_types, definitions, BehaviorKind, Configuration, Dispatcher, Environment,
    Failure, Interception, InterceptionEvent, RingBufferLogSink,
};
use std::sync::Arc;

define_failure_types! {
    &definitions::CORE_FAILURE => {
        RATE_LIMITED = "RateLimited",
    }
}

define_failure_types! {
    &definitions::FAILURE => {
        UPSTREAM_TIMEOUT = "UpstreamTimeout",
        CONFLICT = "Conflict",
    }
}

/// Answers upstream timeouts with 504 instead of a generic 500.
struct GatewayTimeout;

impl InterceptionEvent for GatewayTimeout {
    fn is_eligible(&self, _status_code: u16, failure: &Failure) -> bool {
        failure.is_a(&UPSTREAM_TIMEOUT)
    }

    fn intercept(&self, _status_code: u16, failure: Failure) -> Interception {
        Interception::new(504, failure).with_behavior(BehaviorKind::ServerFault)
    }
}

fn main() -> faultgate::Result<()> {
    let configuration = Arc::new(Configuration::build(|cfg| {
        cfg.add_event(GatewayTimeout)
            .add_behavior(&RATE_LIMITED, BehaviorKind::ClientFault, 429)
            .add_behavior(&CONFLICT, BehaviorKind::ClientFault, 409)
            .add_behavior(&definitions::ACCESS_DENIED, BehaviorKind::ClientFault, 401);
    }));

    let logs = RingBufferLogSink::new(32, 512);
    let dispatcher = Dispatcher::builder()
        .log_sink(logs.clone())
        .configuration(configuration)
        .build()?;

    println!("=== faultgate: configured pipeline ===\n");

    let batch = Failure::aggregate(
        "checkout failed",
        [
            Failure::new(&RATE_LIMITED, "Slow down").with_field("RetryAfterSeconds", 30),
            Failure::new(&CONFLICT, "Cart was modified concurrently"),
            Failure::new(&UPSTREAM_TIMEOUT, "payment gateway"),
            Failure::access_denied("not signed in"),
        ],
    );

    for emission in dispatcher.classify(batch, Environment::Development)? {
        println!(
            "{} {:?}\n{}\n",
            emission.status_code,
            emission.kind,
            String::from_utf8_lossy(&emission.body)
        );
    }

    println!("--- captured log entries (oldest first) ---");
    for entry in logs.get_chronological() {
        println!(
            "{:?} {} {}",
            entry.severity,
            entry.message,
            entry.failure_message.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
