//! One connection to a debugger client.
//!
//! Each accepted socket runs two dedicated threads. The receive thread
//! blocks on the socket, frames and parses messages, and either enqueues a
//! prepared handler invocation for the dispatch thread or resolves an entry
//! in the pending-response table. The dispatch thread drains the inbound
//! channel and executes handlers one at a time, so handlers for a given
//! connection run strictly in arrival order. Sending happens synchronously
//! on the caller's thread, serialized by a single outbound mutex that also
//! guards the sequence counter and the pending-response table.

use std::collections::HashMap;
use std::io::BufReader;
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use serde_json::{Map, Value};

use crate::framing::{self, TransportError};
use crate::protocol::{Error, Event, Request};
use crate::session::{EventInvocation, Invocation, Prepared, Session};

/// A live connection to one client. Cheap to clone; all clones refer to the
/// same socket and threads.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    stream: TcpStream,
    session: Session,
    outbound: Mutex<Outbound>,
    threads: Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

struct Outbound {
    writer: TcpStream,
    next_seq: i64,
    pending: HashMap<i64, PendingResponse>,
}

struct PendingResponse {
    complete: Box<dyn FnOnce(Result<&Value, Error>) + Send>,
}

enum Item {
    Request {
        request_seq: i64,
        command: String,
        invocation: Invocation,
    },
    Event(EventInvocation),
}

impl Connection {
    /// Take ownership of an accepted socket and start the receive and
    /// dispatch threads.
    pub fn begin(stream: TcpStream, session: Session) -> Result<Connection, TransportError> {
        let reader = stream.try_clone()?;
        let writer = stream.try_clone()?;
        let inner = Arc::new(Inner {
            stream,
            session,
            outbound: Mutex::new(Outbound {
                writer,
                next_seq: 1,
                pending: HashMap::new(),
            }),
            threads: Mutex::new(None),
        });
        let connection = Connection {
            inner: inner.clone(),
        };

        let (tx, rx) = crossbeam_channel::unbounded();

        let recv_conn = connection.clone();
        let recv_thread = thread::spawn(move || recv_conn.recv_loop(reader, tx));

        let dispatch_conn = connection.clone();
        let dispatch_thread = thread::spawn(move || dispatch_conn.dispatch_loop(rx));

        *inner.threads.lock().unwrap() = Some((recv_thread, dispatch_thread));
        Ok(connection)
    }

    /// Shut the connection down: close the socket (which closes the inbound
    /// channel behind it) and join both threads. Idempotent.
    pub fn end(&self) {
        let _ = self.inner.stream.shutdown(Shutdown::Both);
        let handles = self.inner.threads.lock().unwrap().take();
        if let Some((recv, dispatch)) = handles {
            let _ = recv.join();
            let _ = dispatch.join();
        }
    }

    /// Send an event to this client.
    pub fn send_event<E: Event>(&self, event: &E) -> Result<(), TransportError> {
        let body = serde_json::to_value(event)?;
        let mut message = Map::new();
        message.insert("type".into(), "event".into());
        message.insert("event".into(), E::EVENT.into());
        if !is_empty_body(&body) {
            message.insert("body".into(), body);
        }
        self.send_message(message)
    }

    /// Send a request to this client.
    ///
    /// `on_response` is invoked from the receive thread when the matching
    /// response arrives, with the deserialized response body or the error
    /// the client reported. The pending-response entry is installed before
    /// the request bytes are written, so a response can never arrive ahead
    /// of its continuation.
    pub fn send_request<R, F>(&self, request: &R, on_response: F) -> Result<(), TransportError>
    where
        R: Request,
        F: FnOnce(Result<R::Response, Error>) + Send + 'static,
    {
        let arguments = serde_json::to_value(request)?;
        let complete = Box::new(move |outcome: Result<&Value, Error>| match outcome {
            Ok(body) => match serde_json::from_value::<R::Response>(body.clone()) {
                Ok(response) => on_response(Ok(response)),
                Err(e) => on_response(Err(Error::new(format!(
                    "failed to deserialize response: {e}"
                )))),
            },
            Err(error) => on_response(Err(error)),
        });

        let mut out = self.inner.outbound.lock().unwrap();
        let seq = out.next_seq;
        out.next_seq += 1;
        out.pending.insert(seq, PendingResponse { complete });

        let mut message = Map::new();
        message.insert("seq".into(), seq.into());
        message.insert("type".into(), "request".into());
        message.insert("command".into(), R::COMMAND.into());
        if !is_empty_body(&arguments) {
            message.insert("arguments".into(), arguments);
        }
        let result = write_message(&mut out, &message);
        if result.is_err() {
            out.pending.remove(&seq);
        }
        result
    }

    fn send_message(&self, mut message: Map<String, Value>) -> Result<(), TransportError> {
        let mut out = self.inner.outbound.lock().unwrap();
        let seq = out.next_seq;
        out.next_seq += 1;
        message.insert("seq".into(), seq.into());
        write_message(&mut out, &message)
    }

    fn send_success_response(
        &self,
        request_seq: i64,
        command: &str,
        body: &Value,
    ) -> Result<(), TransportError> {
        let mut message = Map::new();
        message.insert("type".into(), "response".into());
        message.insert("request_seq".into(), request_seq.into());
        message.insert("success".into(), true.into());
        message.insert("command".into(), command.into());
        if !is_empty_body(body) {
            message.insert("body".into(), body.clone());
        }
        self.send_message(message)
    }

    fn send_error_response(
        &self,
        request_seq: i64,
        command: &str,
        reason: &str,
    ) -> Result<(), TransportError> {
        let mut message = Map::new();
        message.insert("type".into(), "response".into());
        message.insert("request_seq".into(), request_seq.into());
        message.insert("success".into(), false.into());
        message.insert("command".into(), command.into());
        message.insert("message".into(), reason.into());
        self.send_message(message)
    }

    fn recv_loop(&self, reader: TcpStream, tx: Sender<Item>) {
        let mut reader = BufReader::new(reader);
        loop {
            let payload = match framing::read_frame(&mut reader) {
                Ok(payload) => payload,
                Err(TransportError::Closed) => break,
                Err(e) => {
                    log::error!("closing connection: {e}");
                    break;
                }
            };
            if let Err(e) = self.process_payload(&payload, &tx) {
                log::error!("closing connection: {e}");
                break;
            }
        }
        // Make sure a wire error also stops the writer half, then let the
        // sender drop so the dispatch thread drains out.
        let _ = self.inner.stream.shutdown(Shutdown::Both);
    }

    fn process_payload(&self, payload: &[u8], tx: &Sender<Item>) -> Result<(), TransportError> {
        let message: Value = serde_json::from_slice(payload)?;
        let kind = message
            .get("type")
            .and_then(Value::as_str)
            .ok_or(TransportError::MissingField("type"))?;
        let seq = message
            .get("seq")
            .and_then(Value::as_i64)
            .ok_or(TransportError::MissingField("seq"))?;

        match kind {
            "request" => self.process_request(&message, seq, tx),
            "response" => self.process_response(&message),
            "event" => self.process_event(&message, tx),
            other => Err(TransportError::UnknownMessageType(other.to_string())),
        }
    }

    fn process_request(
        &self,
        message: &Value,
        seq: i64,
        tx: &Sender<Item>,
    ) -> Result<(), TransportError> {
        let command = message
            .get("command")
            .and_then(Value::as_str)
            .ok_or(TransportError::MissingField("command"))?;
        let arguments = message.get("arguments");

        match self.inner.session.prepare_request(command, arguments) {
            Prepared::Invoke(invocation) => {
                let item = Item::Request {
                    request_seq: seq,
                    command: command.to_string(),
                    invocation,
                };
                if tx.send(item).is_err() {
                    return Err(TransportError::Closed);
                }
                Ok(())
            }
            Prepared::NoHandler => {
                log::error!("no handler registered for command {command:?}");
                self.send_error_response(seq, command, "no handler")
            }
            Prepared::Invalid(reason) => {
                log::error!("failed to deserialize {command:?} arguments: {reason}");
                self.send_error_response(seq, command, &reason)
            }
        }
    }

    fn process_response(&self, message: &Value) -> Result<(), TransportError> {
        let request_seq = message
            .get("request_seq")
            .and_then(Value::as_i64)
            .ok_or(TransportError::MissingField("request_seq"))?;
        let success = message
            .get("success")
            .and_then(Value::as_bool)
            .ok_or(TransportError::MissingField("success"))?;

        let pending = self.inner.outbound.lock().unwrap().pending.remove(&request_seq);
        let Some(pending) = pending else {
            log::error!("dropping response for unknown request_seq {request_seq}");
            return Ok(());
        };

        if success {
            let body = message
                .get("body")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));
            (pending.complete)(Ok(&body));
        } else {
            let reason = message
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            (pending.complete)(Err(Error::new(reason)));
        }
        Ok(())
    }

    fn process_event(&self, message: &Value, tx: &Sender<Item>) -> Result<(), TransportError> {
        let event = message
            .get("event")
            .and_then(Value::as_str)
            .ok_or(TransportError::MissingField("event"))?;
        let body = message.get("body");

        match self.inner.session.prepare_event(event, body) {
            Some(Ok(invocation)) => {
                if tx.send(Item::Event(invocation)).is_err() {
                    return Err(TransportError::Closed);
                }
            }
            Some(Err(reason)) => {
                log::error!("failed to deserialize {event:?} event body: {reason}");
            }
            None => {
                log::warn!("dropping event {event:?}: no handler registered");
            }
        }
        Ok(())
    }

    fn dispatch_loop(&self, rx: Receiver<Item>) {
        while let Ok(item) = rx.recv() {
            match item {
                Item::Request {
                    request_seq,
                    command,
                    invocation,
                } => {
                    let outcome = invocation();
                    let sent = match &outcome.result {
                        Ok(body) => self.send_success_response(request_seq, &command, body),
                        Err(error) => {
                            self.send_error_response(request_seq, &command, &error.message)
                        }
                    };
                    match sent {
                        Ok(()) => (outcome.after_send)(self),
                        Err(e) => log::error!("failed to send {command:?} response: {e}"),
                    }
                }
                Item::Event(invocation) => invocation(self),
            }
        }
    }
}

fn write_message(out: &mut Outbound, message: &Map<String, Value>) -> Result<(), TransportError> {
    let payload = serde_json::to_vec(message)?;
    framing::write_frame(&mut out.writer, &payload)
}

/// Acks and empty event bodies serialize to `null` or `{}`; both are
/// omitted from the enclosing message.
fn is_empty_body(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
