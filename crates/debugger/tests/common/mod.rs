//! A minimal synchronous DAP client used by the integration tests.
//!
//! Talks to the server over a real `TcpStream` with the standard
//! Content-Length framing. Events arriving while a response is awaited are
//! stashed and handed out later by [`DapClient::event`].

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use serde_json::{json, Value};

pub struct DapClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    next_seq: i64,
    stashed_events: VecDeque<Value>,
}

impl DapClient {
    pub fn connect(port: u16) -> DapClient {
        let stream = TcpStream::connect(("127.0.0.1", port)).expect("connect to debug server");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        DapClient {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
            next_seq: 1,
            stashed_events: VecDeque::new(),
        }
    }

    /// Send a request without waiting for the response. Returns the seq it
    /// was sent with.
    pub fn send_request(&mut self, command: &str, arguments: Value) -> i64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let message = json!({
            "seq": seq,
            "type": "request",
            "command": command,
            "arguments": arguments,
        });
        let payload = message.to_string();
        write!(
            self.writer,
            "Content-Length: {}\r\n\r\n{payload}",
            payload.len()
        )
        .unwrap();
        seq
    }

    /// Read messages until the response to `seq` arrives, stashing any
    /// events seen on the way.
    pub fn read_response(&mut self, seq: i64) -> Value {
        loop {
            let message = self.read_message();
            match message["type"].as_str() {
                Some("event") => self.stashed_events.push_back(message),
                Some("response") if message["request_seq"] == seq => return message,
                other => panic!("unexpected message while awaiting response: {other:?}"),
            }
        }
    }

    /// Send a request and wait for its response.
    pub fn request(&mut self, command: &str, arguments: Value) -> Value {
        let seq = self.send_request(command, arguments);
        let response = self.read_response(seq);
        assert_eq!(response["command"], command);
        assert_eq!(response["request_seq"], seq);
        response
    }

    /// The next event named `name`, from the stash or the stream.
    pub fn event(&mut self, name: &str) -> Value {
        if let Some(index) = self
            .stashed_events
            .iter()
            .position(|event| event["event"] == name)
        {
            return self.stashed_events.remove(index).unwrap();
        }
        loop {
            let message = self.read_message();
            assert_eq!(message["type"], "event", "expected event, got {message}");
            if message["event"] == name {
                return message;
            }
            self.stashed_events.push_back(message);
        }
    }

    /// Perform the initialize handshake: request, response, and the
    /// trailing initialized event. Returns the initialize response.
    pub fn initialize(&mut self, client_id: &str) -> Value {
        let response = self.request("initialize", json!({ "clientID": client_id }));
        assert_eq!(response["success"], true);
        self.event("initialized");
        response
    }

    fn read_message(&mut self) -> Value {
        let mut content_length = None;
        loop {
            let mut line = String::new();
            self.reader.read_line(&mut line).expect("read header line");
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some(value) = line.strip_prefix("Content-Length:") {
                content_length = Some(value.trim().parse::<usize>().unwrap());
            }
        }
        let mut payload = vec![0u8; content_length.expect("Content-Length header")];
        self.reader.read_exact(&mut payload).expect("read payload");
        serde_json::from_slice(&payload).unwrap()
    }
}
