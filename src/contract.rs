//! Contract filter: what of a failure may appear in a response body.
//!
//! # Rules
//!
//! - The message is always written (as `message`).
//! - Members every failure inherits from the generic base type (stack trace,
//!   origin, help link, result code, diagnostic data, inner failure, target
//!   site) are never written. A declared field whose name collides with one
//!   of those members is dropped as well.
//! - Fields declared by the concrete failure type are written normally.
//!
//! # Serialization policy
//!
//! Applied by everything this module renders:
//!
//! - property names are camelCased (`Code` -> `code`, `HResult` -> `hResult`)
//! - `null` properties are omitted, at every nesting level
//! - arrays and objects nested deeper than [`MAX_DEPTH`] are not expanded
//! - output is indented only in development deployments
//!
//! Failures are owned trees and declared values are `serde_json::Value`s, so
//! a reference cycle cannot be built in the first place.

use crate::{Environment, Failure};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;

/// Deepest nesting level that is still expanded. The failure object itself is level 1.
pub const MAX_DEPTH: usize = 10;

/// Base-type members that are never exposed (camelCased).
pub const BASE_MEMBERS: &[&str] = &[
    "message",
    "stackTrace",
    "source",
    "helpLink",
    "hResult",
    "data",
    "innerException",
    "targetSite",
];

/// Whether a declared field with this name may be written.
///
/// `message` is listed as a base member because the failure's own message
/// is always written first; a declared field of the same name would
/// duplicate the key.
pub fn is_exposed(field_name: &str) -> bool {
    let name = camel_case(field_name);
    !BASE_MEMBERS.contains(&name.as_ref())
}

/// Serialization view of a failure with the contract applied.
#[derive(Debug, Clone, Copy)]
pub struct FilteredFailure<'a> {
    failure: &'a Failure,
    depth: usize,
}

impl<'a> FilteredFailure<'a> {
    /// View `failure` as a top-level object.
    #[inline]
    pub fn new(failure: &'a Failure) -> Self {
        Self::at_depth(failure, 1)
    }

    /// View `failure` as an object nested at `depth`.
    #[inline]
    pub fn at_depth(failure: &'a Failure, depth: usize) -> Self {
        Self { failure, depth }
    }

    /// The underlying failure.
    #[inline]
    pub fn failure(&self) -> &'a Failure {
        self.failure
    }
}

impl Serialize for FilteredFailure<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("message", self.failure.message())?;

        for (name, value) in self.failure.fields() {
            if value.is_null() || !is_exposed(name) || !expandable(value, self.depth + 1) {
                continue;
            }
            map.serialize_entry(
                camel_case(name).as_ref(),
                &Pruned {
                    value,
                    depth: self.depth + 1,
                },
            )?;
        }

        map.end()
    }
}

/// A declared value with null omission and the depth cap applied.
struct Pruned<'a> {
    value: &'a Value,
    depth: usize,
}

impl Serialize for Pruned<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let child = self.depth + 1;
        match self.value {
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(None)?;
                for item in items.iter().filter(|item| expandable(item, child)) {
                    seq.serialize_element(&Pruned {
                        value: item,
                        depth: child,
                    })?;
                }
                seq.end()
            }
            Value::Object(entries) => {
                let mut map = serializer.serialize_map(None)?;
                for (key, value) in entries {
                    if value.is_null() || !expandable(value, child) {
                        continue;
                    }
                    map.serialize_entry(
                        camel_case(key).as_ref(),
                        &Pruned {
                            value,
                            depth: child,
                        },
                    )?;
                }
                map.end()
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

#[inline]
fn expandable(value: &Value, depth: usize) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_)) || depth <= MAX_DEPTH
}

/// camelCase a property name the way JSON contracts conventionally do.
///
/// The leading run of uppercase characters is lowercased, except that when
/// the run is followed by more text its last character is kept, since it
/// starts the next word (`URLValue` -> `urlValue`). Names that do not start
/// with an uppercase character are returned unchanged.
pub fn camel_case(name: &str) -> Cow<'_, str> {
    let upper_run = name.chars().take_while(|c| c.is_uppercase()).count();
    if upper_run == 0 {
        return Cow::Borrowed(name);
    }

    let total = name.chars().count();
    let lowered = if upper_run == total {
        upper_run
    } else {
        (upper_run - 1).max(1)
    };

    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        if i < lowered {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Serialize a response body: compact in production, indented in development.
pub fn render<T: Serialize + ?Sized>(value: &T, env: Environment) -> serde_json::Result<Vec<u8>> {
    if env.is_development() {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    }
}
