#![no_main]

use faultgate::{definitions, Failure, FilteredFailure};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fn has_null_property(value: &Value) -> bool {
    match value {
        Value::Object(entries) => entries.values().any(|v| v.is_null() || has_null_property(v)),
        Value::Array(items) => items.iter().any(has_null_property),
        _ => false,
    }
}

// Arbitrary JSON as a declared field: the filtered body must always
// serialize, keep the message and carry no null properties.
fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    let failure = Failure::new(&definitions::CORE_FAILURE, "fuzz").with_field("Payload", value);

    let Ok(body) = serde_json::to_value(FilteredFailure::new(&failure)) else {
        return;
    };

    assert_eq!(body["message"], "fuzz");
    assert!(!has_null_property(&body));
});
