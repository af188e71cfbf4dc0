//! The classification pipeline.
//!
//! # Steps
//!
//! 1. **Configuration pass**: the event cascade, then the behavior registry
//!    (skipped entirely when no configuration was supplied).
//! 2. **Aggregate flattening**: an aggregate's own behavior is discarded and
//!    every inner failure goes through the full pipeline, each one writing
//!    its own status and body to the same response. The last write is the
//!    observable one; earlier writes are not rolled back.
//! 3. **Default classification** (no behavior from step 1): access denial is
//!    answered with a fixed 403 body; `CoreFailure` descendants become client
//!    faults (400); everything else is a server fault (500). A status code
//!    that step 1 changed without deciding a behavior is kept. Inner failures
//!    of an aggregate also keep a status the aggregate's own step 1 changed.
//! 4. **Emission**: client faults log at info and expose the filtered
//!    failure; server faults log at error under a fresh correlation id and
//!    expose only that id (plus the filtered root cause in development).
//!
//! The dispatcher never turns a classified failure into an `Err`. Only its
//! collaborators (serialization, the response sink) can fail a dispatch.
//!
//! Flattening recurses without a depth bound; callers that accept
//! arbitrarily nested aggregates from untrusted sources should cap them
//! before dispatching.

use crate::contract::{self, FilteredFailure};
use crate::response::{CONTENT_TYPE_JSON, FORBIDDEN_STATUS};
use crate::{
    definitions, BehaviorKind, BufferedResponse, Classification, Configuration, DispatchError,
    Environment, Failure, ForbiddenBody, Interception, InternalErrorPayload, LogSink,
    ResponseKind, ResponseSink, Result,
};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Logged at info for client faults.
pub const CLIENT_FAULT_LOG_MESSAGE: &str = "a business rule was violated";

/// Logged at info for access denials.
pub const ACCESS_DENIED_LOG_MESSAGE: &str = "access to a protected resource was denied";

/// Logged at error for server faults.
pub const SERVER_FAULT_LOG_MESSAGE: &str = "an unexpected failure occurred";

/// Turns failures into status codes and JSON bodies.
///
/// Cheap to share: holds the log sink and an `Arc` to the configuration.
pub struct Dispatcher {
    log_sink: Box<dyn LogSink>,
    configuration: Option<Arc<Configuration>>,
}

impl Dispatcher {
    /// Start building a dispatcher.
    #[inline]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// The configuration in use, if any.
    #[inline]
    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_deref()
    }

    /// Classify `failure`, writing status and body to `response`.
    ///
    /// Returns every emission in order. Non-aggregates produce exactly one;
    /// an aggregate produces one per inner failure (none when it is empty,
    /// in which case only the step 1 status code is written).
    pub fn dispatch<R>(&self, failure: Failure, env: Environment, response: &mut R) -> Result<Vec<Classification>>
    where
        R: ResponseSink + ?Sized,
    {
        let mut emissions = Vec::new();
        self.dispatch_into(failure, env, response, false, &mut emissions)?;
        Ok(emissions)
    }

    /// Classify `failure` against a fresh `200 OK` in-memory response.
    pub fn classify(&self, failure: Failure, env: Environment) -> Result<Vec<Classification>> {
        let mut response = BufferedResponse::default();
        self.dispatch(failure, env, &mut response)
    }

    fn dispatch_into<R>(
        &self,
        failure: Failure,
        env: Environment,
        response: &mut R,
        inherited_override: bool,
        emissions: &mut Vec<Classification>,
    ) -> Result<()>
    where
        R: ResponseSink + ?Sized,
    {
        let Interception {
            status_code,
            failure,
            behavior,
            status_overridden,
        } = self.intercept(response.status_code(), failure);
        let status_overridden = status_overridden || inherited_override;
        response.set_status_code(status_code);

        if failure.is_aggregate() {
            for inner in failure.into_inner_failures() {
                self.dispatch_into(inner, env, response, status_overridden, emissions)?;
            }
            return Ok(());
        }

        let emission = match behavior {
            Some(kind) => self.emit(kind, status_code, &failure, env)?,
            None => self.classify_default(status_overridden, status_code, &failure, env)?,
        };

        response.set_status_code(emission.status_code);
        response.write_body(CONTENT_TYPE_JSON, &emission.body)?;
        emissions.push(emission);

        Ok(())
    }

    /// Step 1. A missing configuration leaves everything untouched.
    fn intercept(&self, status_code: u16, failure: Failure) -> Interception {
        match self.configuration.as_deref() {
            Some(configuration) => configuration.run(status_code, failure),
            None => Interception::new(status_code, failure),
        }
    }

    /// Step 3.
    fn classify_default(
        &self,
        status_overridden: bool,
        status_code: u16,
        failure: &Failure,
        env: Environment,
    ) -> Result<Classification> {
        if failure.is_a(&definitions::ACCESS_DENIED) {
            return self.emit_forbidden(env);
        }

        let kind = if failure.is_a(&definitions::CORE_FAILURE) {
            BehaviorKind::ClientFault
        } else {
            BehaviorKind::ServerFault
        };

        let status_code = if status_overridden {
            status_code
        } else {
            kind.default_status_code()
        };

        self.emit(kind, status_code, failure, env)
    }

    /// Step 4.
    fn emit(
        &self,
        kind: BehaviorKind,
        status_code: u16,
        failure: &Failure,
        env: Environment,
    ) -> Result<Classification> {
        match kind {
            BehaviorKind::ClientFault => {
                self.log_sink.info(CLIENT_FAULT_LOG_MESSAGE, Some(failure));

                Ok(Classification {
                    status_code,
                    kind: ResponseKind::ClientFault,
                    body: contract::render(&FilteredFailure::new(failure), env)?,
                })
            }
            BehaviorKind::ServerFault => {
                let log_entry_id = Uuid::new_v4();
                self.log_sink
                    .error(SERVER_FAULT_LOG_MESSAGE, log_entry_id, Some(failure));

                let payload = InternalErrorPayload {
                    log_entry_id,
                    exception: env
                        .is_development()
                        .then(|| FilteredFailure::at_depth(failure.root_cause(), 2)),
                };

                Ok(Classification {
                    status_code,
                    kind: ResponseKind::ServerFault,
                    body: contract::render(&payload, env)?,
                })
            }
        }
    }

    fn emit_forbidden(&self, env: Environment) -> Result<Classification> {
        self.log_sink.info(ACCESS_DENIED_LOG_MESSAGE, None);

        Ok(Classification {
            status_code: FORBIDDEN_STATUS,
            kind: ResponseKind::Forbidden,
            body: contract::render(&ForbiddenBody::default(), env)?,
        })
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("log_sink", &"<dyn LogSink>")
            .field("configuration", &self.configuration)
            .finish()
    }
}

/// Builder for [`Dispatcher`]. A log sink is mandatory.
#[derive(Default)]
pub struct DispatcherBuilder {
    log_sink: Option<Box<dyn LogSink>>,
    configuration: Option<Arc<Configuration>>,
}

impl DispatcherBuilder {
    /// Destination of every log event. Required.
    pub fn log_sink(mut self, log_sink: impl LogSink + 'static) -> Self {
        self.log_sink = Some(Box::new(log_sink));
        self
    }

    /// Use `configuration`. Without one, only the default rules apply.
    pub fn configuration(mut self, configuration: impl Into<Arc<Configuration>>) -> Self {
        self.configuration = Some(configuration.into());
        self
    }

    /// Finish the dispatcher.
    ///
    /// # Errors
    ///
    /// `DispatchError::MissingLogSink` when no log sink was supplied.
    pub fn build(self) -> Result<Dispatcher> {
        let log_sink = self.log_sink.ok_or(DispatchError::MissingLogSink)?;

        Ok(Dispatcher {
            log_sink,
            configuration: self.configuration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring_buffer::{RingBufferLogSink, Severity};
    use crate::{define_failure_types, FnEvent};
    use serde_json::{json, Value};

    define_failure_types! {
        &definitions::CORE_FAILURE => {
            OUT_OF_STOCK = "OutOfStock",
        }
    }

    define_failure_types! {
        &definitions::FAILURE => {
            DATABASE = "Database",
        }
    }

    fn dispatcher(configuration: Option<Configuration>) -> (Dispatcher, RingBufferLogSink) {
        let sink = RingBufferLogSink::new(64, 1024);
        let mut builder = Dispatcher::builder().log_sink(sink.clone());
        if let Some(configuration) = configuration {
            builder = builder.configuration(configuration);
        }
        (builder.build().expect("dispatcher"), sink)
    }

    fn single(emissions: Vec<Classification>) -> (Classification, Value) {
        assert_eq!(emissions.len(), 1);
        let emission = emissions.into_iter().next().expect("one emission");
        let json = emission.json().expect("json body");
        (emission, json)
    }

    #[test]
    fn missing_log_sink_fails_fast() {
        let err = Dispatcher::builder().build().expect_err("must fail");
        assert!(matches!(err, DispatchError::MissingLogSink));
    }

    #[test]
    fn unknown_failure_is_a_server_fault() {
        let (dispatcher, sink) = dispatcher(None);
        let mut response = BufferedResponse::default();

        let emissions = dispatcher
            .dispatch(Failure::new(&DATABASE, "connection reset"), Environment::Production, &mut response)
            .expect("dispatch");
        let (emission, body) = single(emissions);

        assert_eq!(emission.status_code, 500);
        assert_eq!(emission.kind, ResponseKind::ServerFault);
        assert_eq!(response.status_code(), 500);
        assert_eq!(response.content_type(), Some(CONTENT_TYPE_JSON));
        assert!(body["exception"].is_null());

        let id: Uuid = body["logEntryId"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .expect("uuid log entry id");
        let logged = sink.get_recent(1);
        assert_eq!(logged[0].severity, Severity::Error);
        assert_eq!(logged[0].correlation_id, Some(id));
    }

    #[test]
    fn core_failure_is_a_client_fault() {
        let (dispatcher, sink) = dispatcher(None);
        let failure = Failure::new(&OUT_OF_STOCK, "No stock left").with_field("Sku", "A-1");

        let (emission, body) = single(dispatcher.classify(failure, Environment::Production).expect("dispatch"));

        assert_eq!(emission.status_code, 400);
        assert_eq!(emission.kind, ResponseKind::ClientFault);
        assert_eq!(body, json!({ "message": "No stock left", "sku": "A-1" }));
        assert_eq!(sink.get_recent(1)[0].severity, Severity::Info);
    }

    #[test]
    fn access_denied_is_forbidden() {
        let (dispatcher, sink) = dispatcher(None);

        let (emission, body) = single(
            dispatcher
                .classify(Failure::access_denied("token expired"), Environment::Development)
                .expect("dispatch"),
        );

        assert_eq!(emission.status_code, 403);
        assert_eq!(emission.kind, ResponseKind::Forbidden);
        assert_eq!(
            body,
            json!({ "key": "Forbidden", "message": "Access to this resource is forbidden." })
        );
        let logged = sink.get_recent(1);
        assert_eq!(logged[0].message.as_ref(), ACCESS_DENIED_LOG_MESSAGE);
        assert!(logged[0].failure_type.is_none());
    }

    #[test]
    fn event_behavior_preempts_access_denial() {
        let configuration = Configuration::build(|cfg| {
            cfg.add_event(FnEvent::new(
                |_, f: &Failure| f.is_a(&definitions::ACCESS_DENIED),
                |_, f| Interception::new(401, f).with_behavior(BehaviorKind::ClientFault),
            ));
        });
        let (dispatcher, _) = dispatcher(Some(configuration));

        let (emission, body) = single(
            dispatcher
                .classify(Failure::access_denied("login required"), Environment::Production)
                .expect("dispatch"),
        );

        assert_eq!(emission.status_code, 401);
        assert_eq!(emission.kind, ResponseKind::ClientFault);
        assert_eq!(body, json!({ "message": "login required" }));
    }

    #[test]
    fn status_only_event_keeps_its_status() {
        let configuration = Configuration::build(|cfg| {
            cfg.add_event_fn(|_, _: &Failure| true, |_, f| Interception::new(422, f));
        });
        let (dispatcher, _) = dispatcher(Some(configuration));

        let (emission, _) = single(
            dispatcher
                .classify(Failure::new(&OUT_OF_STOCK, "x"), Environment::Production)
                .expect("dispatch"),
        );
        assert_eq!(emission.status_code, 422);
        assert_eq!(emission.kind, ResponseKind::ClientFault);
    }

    #[test]
    fn aggregate_inner_failures_keep_an_event_status() {
        let configuration = Configuration::build(|cfg| {
            cfg.add_event_fn(|_, _: &Failure| true, |_, f| Interception::new(422, f));
        });
        let (dispatcher, _) = dispatcher(Some(configuration));

        let (direct, _) = single(
            dispatcher
                .classify(Failure::new(&DATABASE, "a"), Environment::Production)
                .expect("dispatch"),
        );
        let wrapped = dispatcher
            .classify(
                Failure::aggregate("b", [Failure::new(&DATABASE, "a")]),
                Environment::Production,
            )
            .expect("dispatch");

        assert_eq!(direct.status_code, 422);
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].status_code, 422);
        assert_eq!(wrapped[0].kind, ResponseKind::ServerFault);
    }

    #[test]
    fn aggregate_without_overrides_uses_defaults() {
        let (dispatcher, _) = dispatcher(None);
        let mut response = BufferedResponse::new(418);

        let emissions = dispatcher
            .dispatch(
                Failure::aggregate("b", [Failure::new(&OUT_OF_STOCK, "a"), Failure::new(&DATABASE, "c")]),
                Environment::Production,
                &mut response,
            )
            .expect("dispatch");

        assert_eq!(emissions[0].status_code, 400);
        assert_eq!(emissions[1].status_code, 500);
    }

    #[test]
    fn registry_behavior_overrides_defaults() {
        let configuration = Configuration::build(|cfg| {
            cfg.add_behavior(&DATABASE, BehaviorKind::ClientFault, 409);
        });
        let (dispatcher, _) = dispatcher(Some(configuration));

        let (emission, body) = single(
            dispatcher
                .classify(Failure::new(&DATABASE, "duplicate key"), Environment::Production)
                .expect("dispatch"),
        );

        assert_eq!(emission.status_code, 409);
        assert_eq!(emission.kind, ResponseKind::ClientFault);
        assert_eq!(body, json!({ "message": "duplicate key" }));
    }

    #[test]
    fn development_exposes_root_cause() {
        let (dispatcher, _) = dispatcher(None);
        let failure = Failure::new(&DATABASE, "query failed")
            .with_cause(Failure::generic("socket closed").with_field("Port", 5432).with_stack_trace("secret"));

        let (emission, body) = single(dispatcher.classify(failure, Environment::Development).expect("dispatch"));

        assert_eq!(body["exception"], json!({ "message": "socket closed", "port": 5432 }));
        assert!(emission.body.contains(&b'\n'));
        assert!(!String::from_utf8_lossy(&emission.body).contains("secret"));
    }

    #[test]
    fn aggregate_writes_each_inner_failure() {
        let (dispatcher, _) = dispatcher(None);
        let mut response = BufferedResponse::default();
        let failure = Failure::aggregate(
            "batch",
            [Failure::new(&OUT_OF_STOCK, "first"), Failure::new(&DATABASE, "second")],
        );

        let emissions = dispatcher
            .dispatch(failure, Environment::Production, &mut response)
            .expect("dispatch");

        assert_eq!(emissions.len(), 2);
        assert_eq!(emissions[0].status_code, 400);
        assert_eq!(emissions[1].status_code, 500);
        assert_eq!(response.status_code(), 500);
        assert_eq!(response.writes().len(), 2);
        assert_eq!(response.last_write(), Some(emissions[1].body.as_slice()));
    }

    #[test]
    fn empty_aggregate_only_sets_status() {
        let configuration = Configuration::build(|cfg| {
            cfg.add_behavior(&definitions::AGGREGATE, BehaviorKind::ServerFault, 503);
        });
        let (dispatcher, _) = dispatcher(Some(configuration));
        let mut response = BufferedResponse::default();

        let emissions = dispatcher
            .dispatch(Failure::aggregate("nothing", Vec::<Failure>::new()), Environment::Production, &mut response)
            .expect("dispatch");

        assert!(emissions.is_empty());
        assert!(response.writes().is_empty());
        assert_eq!(response.status_code(), 503);
    }

    #[test]
    fn response_write_errors_propagate() {
        struct BrokenPipe(u16);

        impl ResponseSink for BrokenPipe {
            fn status_code(&self) -> u16 {
                self.0
            }
            fn set_status_code(&mut self, status_code: u16) {
                self.0 = status_code;
            }
            fn write_body(&mut self, _: &str, _: &[u8]) -> std::io::Result<()> {
                Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            }
        }

        let (dispatcher, _) = dispatcher(None);
        let err = dispatcher
            .dispatch(Failure::generic("x"), Environment::Production, &mut BrokenPipe(200))
            .expect_err("write must fail");

        assert!(matches!(err, DispatchError::ResponseWrite(_)));
    }
}
