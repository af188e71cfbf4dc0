//! Basic usage of faultgate with the default classification rules.
//!
//! Run with: cargo run --example basic_usage
//! Set FAULTGATE_ENVIRONMENT=Development to see root causes in 500 bodies.

use faultgate::{
    define_failure_types, definitions, BufferedResponse, Dispatcher, Environment, Failure,
    ResponseSink, TracingLogSink,
};
use tracing::Level;

define_failure_types! {
    &definitions::CORE_FAILURE => {
        /// A withdrawal larger than the available balance.
        INSUFFICIENT_FUNDS = "InsufficientFunds",
    }
}

define_failure_types! {
    &definitions::FAILURE => {
        /// The ledger store did not answer.
        LEDGER_UNAVAILABLE = "LedgerUnavailable",
    }
}

fn main() -> faultgate::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let env = Environment::from_env();
    let dispatcher = Dispatcher::builder().log_sink(TracingLogSink).build()?;

    println!("=== faultgate: default classification ({:?}) ===\n", env);

    let failures = vec![
        Failure::new(&INSUFFICIENT_FUNDS, "Balance too low for this withdrawal")
            .with_field("Requested", 250)
            .with_field("Available", 120)
            .with_stack_trace("at accounts::withdraw"),
        Failure::access_denied("account belongs to another customer"),
        Failure::new(&LEDGER_UNAVAILABLE, "ledger did not answer within 5s")
            .with_cause(Failure::generic("connection refused").with_field("Port", 5432)),
    ];

    for failure in failures {
        let label = failure.to_string();
        let mut response = BufferedResponse::default();
        dispatcher.dispatch(failure, env, &mut response)?;

        println!("{}", label);
        println!("  -> {}", response.status_code());
        println!("  -> {}\n", String::from_utf8_lossy(&response.body()));
    }

    Ok(())
}
