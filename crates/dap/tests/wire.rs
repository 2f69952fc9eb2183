//! End-to-end tests for the wire layer: a real listening server on an
//! ephemeral port, with the test playing the client over a plain
//! `TcpStream`.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use dap::protocol::{Error, Event, Request};
use dap::server::Server;
use dap::session::Session;

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct PingArguments {
    message: String,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
struct PingResponse {
    echo: String,
}

impl Request for PingArguments {
    const COMMAND: &'static str = "ping";
    type Response = PingResponse;
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct FailArguments {}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct FailResponse {}

impl Request for FailArguments {
    const COMMAND: &'static str = "fail";
    type Response = FailResponse;
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct NudgeEvent {
    detail: String,
}

impl Event for NudgeEvent {
    const EVENT: &'static str = "nudge";
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct QueryArguments {
    question: String,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct QueryResponse {
    answer: String,
}

impl Request for QueryArguments {
    const COMMAND: &'static str = "query";
    type Response = QueryResponse;
}

/// A minimal synchronous DAP client.
struct TestClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    next_seq: i64,
}

impl TestClient {
    fn connect(port: u16) -> TestClient {
        let stream = TcpStream::connect(("127.0.0.1", port)).expect("connect to server");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        TestClient {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
            next_seq: 1,
        }
    }

    fn send_raw(&mut self, payload: &str) {
        write!(
            self.writer,
            "Content-Length: {}\r\n\r\n{payload}",
            payload.len()
        )
        .unwrap();
    }

    fn send_request(&mut self, command: &str, arguments: Value) -> i64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let message = json!({
            "seq": seq,
            "type": "request",
            "command": command,
            "arguments": arguments,
        });
        self.send_raw(&message.to_string());
        seq
    }

    fn read_message(&mut self) -> Value {
        let mut content_length = None;
        loop {
            let mut line = String::new();
            self.reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some(value) = line.strip_prefix("Content-Length:") {
                content_length = Some(value.trim().parse::<usize>().unwrap());
            }
        }
        let mut payload = vec![0u8; content_length.expect("Content-Length header")];
        self.reader.read_exact(&mut payload).unwrap();
        serde_json::from_slice(&payload).unwrap()
    }

    fn at_eof(&mut self) -> bool {
        let mut byte = [0u8; 1];
        matches!(self.reader.read(&mut byte), Ok(0))
    }
}

fn ping_server() -> Server {
    let session = Session::new();
    session.on_request::<PingArguments, _>(|args| {
        Ok(PingResponse {
            echo: args.message,
        })
    });
    session.on_request::<FailArguments, _>(|_| Err(Error::new("always fails")));
    Server::bind(0, session).expect("bind server")
}

#[test]
fn request_gets_matching_response() {
    let server = ping_server();
    let mut client = TestClient::connect(server.local_port());

    let seq = client.send_request("ping", json!({"message": "hello"}));
    let response = client.read_message();

    assert_eq!(response["type"], "response");
    assert_eq!(response["request_seq"], seq);
    assert_eq!(response["command"], "ping");
    assert_eq!(response["success"], true);
    assert_eq!(response["body"]["echo"], "hello");
}

#[test]
fn handler_error_becomes_failure_response() {
    let server = ping_server();
    let mut client = TestClient::connect(server.local_port());

    let seq = client.send_request("fail", json!({}));
    let response = client.read_message();

    assert_eq!(response["request_seq"], seq);
    assert_eq!(response["success"], false);
    assert_eq!(response["message"], "always fails");
}

#[test]
fn unknown_command_is_not_fatal() {
    let server = ping_server();
    let mut client = TestClient::connect(server.local_port());

    let seq = client.send_request("restart", json!({}));
    let response = client.read_message();
    assert_eq!(response["request_seq"], seq);
    assert_eq!(response["success"], false);
    assert_eq!(response["message"], "no handler");

    // The connection survives and keeps serving.
    let seq = client.send_request("ping", json!({"message": "still here"}));
    let response = client.read_message();
    assert_eq!(response["request_seq"], seq);
    assert_eq!(response["body"]["echo"], "still here");
}

#[test]
fn malformed_arguments_produce_failure_response() {
    let server = ping_server();
    let mut client = TestClient::connect(server.local_port());

    let seq = client.send_request("ping", json!({"message": 42}));
    let response = client.read_message();
    assert_eq!(response["request_seq"], seq);
    assert_eq!(response["success"], false);
}

#[test]
fn responses_execute_in_request_order() {
    let server = ping_server();
    let mut client = TestClient::connect(server.local_port());

    let first = client.send_request("ping", json!({"message": "one"}));
    let second = client.send_request("ping", json!({"message": "two"}));
    let third = client.send_request("ping", json!({"message": "three"}));

    assert_eq!(client.read_message()["request_seq"], first);
    assert_eq!(client.read_message()["request_seq"], second);
    assert_eq!(client.read_message()["request_seq"], third);
}

#[test]
fn outbound_seq_is_strictly_monotonic() {
    let server = ping_server();
    let mut client = TestClient::connect(server.local_port());

    client.send_request("ping", json!({"message": "a"}));
    client.send_request("ping", json!({"message": "b"}));
    let first = client.read_message()["seq"].as_i64().unwrap();
    let second = client.read_message()["seq"].as_i64().unwrap();
    assert!(second > first);
}

#[test]
fn broadcast_reaches_the_client() {
    let server = ping_server();
    let mut client = TestClient::connect(server.local_port());

    // Make sure the connection is established before broadcasting.
    client.send_request("ping", json!({"message": "sync"}));
    client.read_message();

    server.broadcast_event(&NudgeEvent {
        detail: "wake up".to_string(),
    });
    let event = client.read_message();
    assert_eq!(event["type"], "event");
    assert_eq!(event["event"], "nudge");
    assert_eq!(event["body"]["detail"], "wake up");
}

#[test]
fn server_sent_request_resolves_continuation() {
    let session = Session::new();
    let (tx, rx) = mpsc::channel();
    session.on_request::<PingArguments, _>(|args| {
        Ok(PingResponse {
            echo: args.message,
        })
    });
    // After the ping response goes out, ask the client a question and
    // capture the answer through the pending-response table.
    session.on_response_sent::<PingArguments, _>(move |conn, _outcome| {
        let tx = tx.clone();
        conn.send_request(
            &QueryArguments {
                question: "ready?".to_string(),
            },
            move |result: Result<QueryResponse, Error>| {
                tx.send(result).unwrap();
            },
        )
        .unwrap();
    });
    let server = Server::bind(0, session).expect("bind server");
    let mut client = TestClient::connect(server.local_port());

    client.send_request("ping", json!({"message": "go"}));
    let response = client.read_message();
    assert_eq!(response["command"], "ping");

    let request = client.read_message();
    assert_eq!(request["type"], "request");
    assert_eq!(request["command"], "query");
    assert_eq!(request["arguments"]["question"], "ready?");

    let reply = json!({
        "seq": 99,
        "type": "response",
        "request_seq": request["seq"],
        "success": true,
        "command": "query",
        "body": {"answer": "yes"},
    });
    client.send_raw(&reply.to_string());

    let answer = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(answer.answer, "yes");
}

#[test]
fn failed_reverse_response_reports_error() {
    let session = Session::new();
    let (tx, rx) = mpsc::channel();
    session.on_request::<PingArguments, _>(|args| {
        Ok(PingResponse {
            echo: args.message,
        })
    });
    session.on_response_sent::<PingArguments, _>(move |conn, _outcome| {
        let tx = tx.clone();
        conn.send_request(
            &QueryArguments {
                question: "ready?".to_string(),
            },
            move |result: Result<QueryResponse, Error>| {
                tx.send(result).unwrap();
            },
        )
        .unwrap();
    });
    let server = Server::bind(0, session).expect("bind server");
    let mut client = TestClient::connect(server.local_port());

    client.send_request("ping", json!({"message": "go"}));
    client.read_message();
    let request = client.read_message();

    let reply = json!({
        "seq": 99,
        "type": "response",
        "request_seq": request["seq"],
        "success": false,
        "command": "query",
        "message": "not today",
    });
    client.send_raw(&reply.to_string());

    let answer = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(answer.unwrap_err().message, "not today");
}

#[test]
fn zero_length_frame_closes_connection() {
    let server = ping_server();
    let mut client = TestClient::connect(server.local_port());

    client.writer.write_all(b"Content-Length: 0\r\n\r\n").unwrap();
    assert!(client.at_eof());

    // Other connections are unaffected.
    let mut second = TestClient::connect(server.local_port());
    let seq = second.send_request("ping", json!({"message": "alive"}));
    assert_eq!(second.read_message()["request_seq"], seq);
}

#[test]
fn unknown_message_type_closes_connection() {
    let server = ping_server();
    let mut client = TestClient::connect(server.local_port());

    client.send_raw(&json!({"seq": 1, "type": "gibberish"}).to_string());
    assert!(client.at_eof());
}
