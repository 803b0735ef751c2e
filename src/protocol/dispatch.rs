//! Method dispatch.
//!
//! Routes are a static table keyed by exact method name. Each route names
//! its lifecycle [`Event`] and, for methods that answer, a handler producing
//! the `result` value.

use serde_json::Value;
use tracing::{debug, warn};

use super::envelope::{Envelope, Response};
use super::fixture::Fixture;
use super::lifecycle::{Event, Lifecycle, Phase};
use crate::error::Result;

/// Produces the `result` of a request.
pub type Handler = fn(&Fixture, Option<&Value>) -> Result<Value>;

/// One entry in the route table.
pub struct Route {
    pub method: &'static str,
    pub event: Event,
    /// `None` for methods that never reply.
    pub handler: Option<Handler>,
}

/// Every method the fixture recognizes.
pub const ROUTES: &[Route] = &[
    Route {
        method: "build/initialize",
        event: Event::Initialize,
        handler: Some(initialize),
    },
    Route {
        method: "build/initialized",
        event: Event::Initialized,
        handler: None,
    },
    Route {
        method: "build/shutdown",
        event: Event::Shutdown,
        handler: Some(shutdown),
    },
    Route {
        method: "build/exit",
        event: Event::Exit,
        handler: None,
    },
    Route {
        method: "buildTarget/sources",
        event: Event::Query,
        handler: Some(sources),
    },
];

/// Find the route for `method`.
pub fn lookup(method: &str) -> Option<&'static Route> {
    ROUTES.iter().find(|route| route.method == method)
}

fn initialize(fixture: &Fixture, _params: Option<&Value>) -> Result<Value> {
    Ok(serde_json::to_value(fixture.initialize_result())?)
}

fn shutdown(_fixture: &Fixture, _params: Option<&Value>) -> Result<Value> {
    Ok(Value::Null)
}

fn sources(fixture: &Fixture, _params: Option<&Value>) -> Result<Value> {
    Ok(serde_json::to_value(fixture.sources_result())?)
}

/// What the session loop should do after one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Write this response.
    Reply(Response),
    /// Write nothing and keep reading.
    NoReply,
    /// Write nothing and stop reading.
    Exit,
}

/// Applies lifecycle rules and routes messages to handlers.
pub struct Dispatcher {
    fixture: Fixture,
    lifecycle: Lifecycle,
}

impl Dispatcher {
    pub fn new(fixture: Fixture, lifecycle: Lifecycle) -> Self {
        Dispatcher { fixture, lifecycle }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn dispatch(&mut self, envelope: Envelope) -> Result<Outcome> {
        let method = envelope.method();

        let route = match lookup(method) {
            Some(route) => route,
            None => {
                return Ok(match envelope {
                    Envelope::Request(req) => {
                        debug!(method = %req.method, id = %req.id, "Unhandled request");
                        Outcome::Reply(Response::unhandled_method(req.id, &req.method))
                    }
                    Envelope::Notification(note) => {
                        debug!(method = %note.method, "Ignoring notification");
                        Outcome::NoReply
                    }
                });
            }
        };

        if let Err(rejection) = self.lifecycle.check(route.event) {
            warn!(
                method,
                phase = %self.lifecycle.phase(),
                reason = rejection.message(),
                "Rejected out-of-order message"
            );
            return Ok(match envelope {
                Envelope::Request(req) => Outcome::Reply(Response::error(
                    req.id,
                    rejection.code(),
                    rejection.message(),
                )),
                Envelope::Notification(_) => Outcome::NoReply,
            });
        }

        let from = self.lifecycle.phase();
        let to = self.lifecycle.apply(route.event);
        if from != to {
            debug!(method, from = %from, to = %to, "Phase changed");
        }

        if to == Phase::Exited {
            return Ok(Outcome::Exit);
        }

        match (envelope, route.handler) {
            (Envelope::Request(req), Some(handler)) => {
                debug!(method = %req.method, id = %req.id, "Handling request");
                let result = handler(&self.fixture, req.params.as_ref())?;
                Ok(Outcome::Reply(Response::result(req.id, result)))
            }
            _ => Ok(Outcome::NoReply),
        }
    }
}
