#![no_main]

use faultgate::{definitions, Dispatcher, Environment, Failure, RingBufferLogSink};
use libfuzzer_sys::fuzz_target;

// Arbitrary messages through every default class and both environments.
fuzz_target!(|data: &[u8]| {
    let Some((selector, rest)) = data.split_first() else {
        return;
    };
    let message = String::from_utf8_lossy(rest).into_owned();

    let failure = match selector % 4 {
        0 => Failure::new(&definitions::CORE_FAILURE, message),
        1 => Failure::access_denied(message),
        2 => Failure::aggregate("batch", [Failure::generic(message)]),
        _ => Failure::generic(message),
    };
    let env = if selector & 0x80 != 0 {
        Environment::Development
    } else {
        Environment::Production
    };

    let Ok(dispatcher) = Dispatcher::builder().log_sink(RingBufferLogSink::new(4, 256)).build() else {
        return;
    };

    if let Ok(emissions) = dispatcher.classify(failure, env) {
        for emission in emissions {
            assert!(emission.json().is_ok());
        }
    }
});
