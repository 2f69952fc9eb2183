//! Variable inspection: scopes, nested containers, paging, and evaluate.

mod common;

use std::sync::Arc;

use common::DapClient;
use debugger::{constant, Context, DebugServer, File, Location};
use serde_json::json;

fn at(file: &Arc<File>, line: i32) -> Location {
    Location {
        line,
        file: file.clone(),
    }
}

/// Park an instrumented thread on a breakpoint with `x = 7` and
/// `y = { a = 1.5 }` in its locals, then let the test inspect it.
struct StoppedFixture {
    client: DapClient,
    thread_id: i64,
    nested_id: i64,
    worker: std::thread::JoinHandle<()>,
    _server: Arc<DebugServer>,
}

fn stopped_fixture() -> StoppedFixture {
    let ctx = Context::new();
    let server = DebugServer::create(&ctx, 0).unwrap();
    let file = server.create_virtual_file("a.glsl", "...\n");
    file.add_breakpoint(5);
    let nested = server.create_variable_container();
    nested.put("a", constant(1.5f32));
    let nested_id = i64::from(nested.id);

    let mut client = DapClient::connect(server.local_port());
    client.initialize("code");

    let worker = {
        let ctx = ctx.clone();
        let file = file.clone();
        std::thread::spawn(move || {
            let mut lock = ctx.lock();
            let thread = lock.current_thread();
            thread.enter(&mut lock, &file, "shade");
            drop(lock);
            let locals = thread.locals().unwrap();
            locals.put("x", constant(7i32));
            locals.put("y", nested);
            let arguments = thread.arguments().unwrap();
            arguments.put("uv", constant(0.25f32));
            thread.update(at(&file, 5));
        })
    };

    let stopped = client.event("stopped");
    let thread_id = stopped["body"]["threadId"].as_i64().unwrap();
    StoppedFixture {
        client,
        thread_id,
        nested_id,
        worker,
        _server: server,
    }
}

impl StoppedFixture {
    fn finish(mut self) {
        self.client
            .request("continue", json!({"threadId": self.thread_id}));
        self.worker.join().unwrap();
    }
}

#[test]
fn scopes_report_locals_arguments_registers() {
    let mut f = stopped_fixture();

    let response = f
        .client
        .request("stackTrace", json!({"threadId": f.thread_id}));
    let frames = response["body"]["stackFrames"].as_array().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["name"], "shade");
    let frame_id = frames[0]["id"].as_i64().unwrap();

    let response = f.client.request("scopes", json!({"frameId": frame_id}));
    let scopes = response["body"]["scopes"].as_array().unwrap();
    let names: Vec<&str> = scopes
        .iter()
        .map(|scope| scope["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["locals", "arguments", "registers"]);
    for scope in scopes {
        assert_eq!(scope["presentationHint"], scope["name"]);
        assert!(scope["variablesReference"].as_i64().unwrap() > 0);
    }

    f.finish();
}

#[test]
fn variables_expose_nested_containers() {
    let mut f = stopped_fixture();

    let response = f
        .client
        .request("stackTrace", json!({"threadId": f.thread_id}));
    let frame_id = response["body"]["stackFrames"][0]["id"].as_i64().unwrap();
    let response = f.client.request("scopes", json!({"frameId": frame_id}));
    let locals_ref = response["body"]["scopes"][0]["variablesReference"]
        .as_i64()
        .unwrap();

    let response = f
        .client
        .request("variables", json!({"variablesReference": locals_ref}));
    let variables = response["body"]["variables"].as_array().unwrap();
    assert_eq!(variables.len(), 2);

    assert_eq!(variables[0]["name"], "x");
    assert_eq!(variables[0]["evaluateName"], "x");
    assert_eq!(variables[0]["value"], "7");
    assert_eq!(variables[0]["type"], "int");
    assert_eq!(variables[0]["variablesReference"], 0);

    assert_eq!(variables[1]["name"], "y");
    assert_eq!(variables[1]["variablesReference"], f.nested_id);

    // Descend into the nested container.
    let response = f
        .client
        .request("variables", json!({"variablesReference": f.nested_id}));
    let variables = response["body"]["variables"].as_array().unwrap();
    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0]["name"], "a");
    assert_eq!(variables[0]["type"], "float");
    assert_eq!(variables[0]["value"], "1.500000");
    assert_eq!(variables[0]["variablesReference"], 0);

    f.finish();
}

#[test]
fn variables_honor_start_and_count() {
    let mut f = stopped_fixture();

    let response = f
        .client
        .request("stackTrace", json!({"threadId": f.thread_id}));
    let frame_id = response["body"]["stackFrames"][0]["id"].as_i64().unwrap();
    let response = f.client.request("scopes", json!({"frameId": frame_id}));
    let locals_ref = response["body"]["scopes"][0]["variablesReference"]
        .as_i64()
        .unwrap();

    let response = f.client.request(
        "variables",
        json!({"variablesReference": locals_ref, "start": 1}),
    );
    let variables = response["body"]["variables"].as_array().unwrap();
    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0]["name"], "y");

    let response = f.client.request(
        "variables",
        json!({"variablesReference": locals_ref, "count": 1}),
    );
    let variables = response["body"]["variables"].as_array().unwrap();
    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0]["name"], "x");

    f.finish();
}

#[test]
fn evaluate_searches_locals_then_arguments() {
    let mut f = stopped_fixture();

    let response = f
        .client
        .request("stackTrace", json!({"threadId": f.thread_id}));
    let frame_id = response["body"]["stackFrames"][0]["id"].as_i64().unwrap();

    let response = f
        .client
        .request("evaluate", json!({"expression": "x", "frameId": frame_id}));
    assert_eq!(response["success"], true);
    assert_eq!(response["body"]["result"], "7");
    assert_eq!(response["body"]["type"], "int");

    // Found in the arguments scope.
    let response = f
        .client
        .request("evaluate", json!({"expression": "uv", "frameId": frame_id}));
    assert_eq!(response["body"]["result"], "0.250000");

    let response = f.client.request(
        "evaluate",
        json!({"expression": "missing", "frameId": frame_id}),
    );
    assert_eq!(response["success"], false);
    assert_eq!(response["message"], "Could not evaluate expression");

    f.finish();
}
