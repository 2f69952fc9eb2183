//! Handler registries.
//!
//! A [`Session`] owns three registries shared by every connection:
//! request handlers keyed by DAP command string, response-sent hooks keyed
//! by the `TypeId` of the response type, and inbound event handlers keyed by
//! event name. Registration is generic over the typed payloads; the
//! registries store type-erased closures that deserialize the arguments,
//! invoke the typed handler, and serialize the result.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use serde_json::Value;

use crate::connection::Connection;
use crate::protocol::{Error, Event, HandlerResult, Request};

/// The typed outcome handed to a response-sent hook: the response that was
/// written, or the error that was reported instead.
pub type ResponseOrError<'a, T> = Result<&'a T, &'a Error>;

/// What the dispatch thread runs for one request: invokes the handler and
/// yields the serialized body (or the error), plus a thunk to run after the
/// response bytes are on the wire.
pub(crate) struct Outcome {
    pub(crate) result: Result<Value, Error>,
    pub(crate) after_send: Box<dyn FnOnce(&Connection) + Send>,
}

pub(crate) type Invocation = Box<dyn FnOnce() -> Outcome + Send>;
pub(crate) type EventInvocation = Box<dyn FnOnce(&Connection) + Send>;

/// The result of resolving an inbound request against the registry on the
/// receive thread, before it is handed to the dispatch thread.
pub(crate) enum Prepared {
    /// The handler is ready to invoke.
    Invoke(Invocation),
    /// No handler is registered for the command.
    NoHandler,
    /// The arguments failed to deserialize into the handler's declared
    /// argument type.
    Invalid(String),
}

type PrepareFn = Arc<dyn Fn(Option<&Value>) -> Result<Invocation, String> + Send + Sync>;
type SentHook = Arc<dyn Fn(&Connection, Result<&dyn Any, &Error>) + Send + Sync>;
type EventPrepareFn = Arc<dyn Fn(Option<&Value>) -> Result<EventInvocation, String> + Send + Sync>;

#[derive(Default)]
struct Registries {
    requests: RwLock<HashMap<&'static str, PrepareFn>>,
    response_sent: RwLock<HashMap<TypeId, Vec<SentHook>>>,
    events: RwLock<HashMap<&'static str, EventPrepareFn>>,
}

/// A shared registry of request handlers, response-sent hooks, and event
/// handlers. Cheap to clone; every connection of a server shares one.
#[derive(Clone, Default)]
pub struct Session {
    registries: Arc<Registries>,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Session {
        Session::default()
    }

    /// Register the handler for request type `R`, replacing any previous
    /// handler for the same command.
    ///
    /// The handler runs on the dispatch thread of whichever connection the
    /// request arrived on; handlers for one connection execute strictly in
    /// arrival order. Returning `Err` produces a `success=false` response
    /// carrying the error message.
    pub fn on_request<R, F>(&self, handler: F)
    where
        R: Request,
        F: Fn(R) -> HandlerResult<R::Response> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let registries = Arc::downgrade(&self.registries);
        let prepare: PrepareFn = Arc::new(move |arguments: Option<&Value>| {
            let args: R = match arguments {
                Some(value) => {
                    serde_json::from_value(value.clone()).map_err(|e| e.to_string())?
                }
                None => R::default(),
            };
            let handler = handler.clone();
            let registries = registries.clone();
            Ok(Box::new(move || run_handler(&*handler, args, registries)) as Invocation)
        });
        self.registries
            .requests
            .write()
            .expect("request registry poisoned")
            .insert(R::COMMAND, prepare);
    }

    /// Register a hook invoked after a response of type `R::Response` has
    /// been framed and written (or its error reported). Multiple hooks for
    /// one response type all run, in registration order.
    pub fn on_response_sent<R, F>(&self, hook: F)
    where
        R: Request,
        F: Fn(&Connection, ResponseOrError<'_, R::Response>) + Send + Sync + 'static,
    {
        let erased: SentHook = Arc::new(move |conn, outcome| match outcome {
            Ok(any) => {
                if let Some(typed) = any.downcast_ref::<R::Response>() {
                    hook(conn, Ok(typed));
                }
            }
            Err(error) => hook(conn, Err(error)),
        });
        self.registries
            .response_sent
            .write()
            .expect("response-sent registry poisoned")
            .entry(TypeId::of::<R::Response>())
            .or_default()
            .push(erased);
    }

    /// Register the handler for inbound events of type `E`, replacing any
    /// previous handler for the same event name.
    pub fn on_event<E, F>(&self, handler: F)
    where
        E: Event,
        F: Fn(&Connection, E) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let prepare: EventPrepareFn = Arc::new(move |body: Option<&Value>| {
            let event: E = match body {
                Some(value) => {
                    serde_json::from_value(value.clone()).map_err(|e| e.to_string())?
                }
                None => E::default(),
            };
            let handler = handler.clone();
            Ok(Box::new(move |conn: &Connection| handler(conn, event)) as EventInvocation)
        });
        self.registries
            .events
            .write()
            .expect("event registry poisoned")
            .insert(E::EVENT, prepare);
    }

    pub(crate) fn prepare_request(&self, command: &str, arguments: Option<&Value>) -> Prepared {
        let prepare = {
            let requests = self
                .registries
                .requests
                .read()
                .expect("request registry poisoned");
            match requests.get(command) {
                Some(prepare) => prepare.clone(),
                None => return Prepared::NoHandler,
            }
        };
        match prepare(arguments) {
            Ok(invocation) => Prepared::Invoke(invocation),
            Err(reason) => Prepared::Invalid(reason),
        }
    }

    pub(crate) fn prepare_event(
        &self,
        event: &str,
        body: Option<&Value>,
    ) -> Option<Result<EventInvocation, String>> {
        let prepare = {
            let events = self
                .registries
                .events
                .read()
                .expect("event registry poisoned");
            events.get(event).cloned()?
        };
        Some(prepare(body))
    }
}

fn run_handler<R, F>(handler: &F, args: R, registries: Weak<Registries>) -> Outcome
where
    R: Request,
    F: Fn(R) -> HandlerResult<R::Response>,
{
    match handler(args) {
        Ok(response) => match serde_json::to_value(&response) {
            Ok(body) => Outcome {
                result: Ok(body),
                after_send: Box::new(move |conn| {
                    notify_sent(&registries, conn, TypeId::of::<R::Response>(), Ok(&response));
                }),
            },
            Err(e) => {
                let error = Error::new(format!("failed to serialize response: {e}"));
                let after = error.clone();
                Outcome {
                    result: Err(error),
                    after_send: Box::new(move |conn| {
                        notify_sent::<R::Response>(
                            &registries,
                            conn,
                            TypeId::of::<R::Response>(),
                            Err(&after),
                        );
                    }),
                }
            }
        },
        Err(error) => {
            let after = error.clone();
            Outcome {
                result: Err(error),
                after_send: Box::new(move |conn| {
                    notify_sent::<R::Response>(
                        &registries,
                        conn,
                        TypeId::of::<R::Response>(),
                        Err(&after),
                    );
                }),
            }
        }
    }
}

fn notify_sent<T: Any>(
    registries: &Weak<Registries>,
    conn: &Connection,
    type_id: TypeId,
    outcome: Result<&T, &Error>,
) {
    let Some(registries) = registries.upgrade() else {
        return;
    };
    let hooks: Vec<SentHook> = {
        let map = registries
            .response_sent
            .read()
            .expect("response-sent registry poisoned");
        match map.get(&type_id) {
            Some(hooks) => hooks.clone(),
            None => return,
        }
    };
    let erased = outcome.map(|value| value as &dyn Any);
    for hook in hooks {
        hook(conn, erased);
    }
}
