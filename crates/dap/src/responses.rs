//! DAP Responses.
//!
//! One body struct per command that returns data. Commands whose responses
//! are plain acks use `()` as their response type, which serializes to
//! `null` and is omitted from the response message entirely.

use serde::{Deserialize, Serialize};

use crate::types::{Breakpoint, Capabilities, Scope, StackFrame, Thread, Variable};

/// The body of an `initialize` response: the capability set of this server.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(transparent)]
pub struct InitializeResponse {
    /// The capabilities advertised to the client.
    pub capabilities: Capabilities,
}

/// The body of a `configurationDone` response. An empty ack.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct ConfigurationDoneResponse {}

/// The body of a `disconnect` response. An empty ack.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct DisconnectResponse {}

/// The body of a `launch` response. An empty ack.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct LaunchResponse {}

/// The body of a `setExceptionBreakpoints` response. An empty ack.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct SetExceptionBreakpointsResponse {}

/// The body of a `pause` response. An empty ack; the stop itself is
/// reported through a `stopped` event.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct PauseResponse {}

/// The body of a `next` response. An empty ack; the stop itself is
/// reported through a `stopped` event once the step completes.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct NextResponse {}

/// The body of a `stepIn` response. An empty ack.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct StepInResponse {}

/// The body of a `stepOut` response. An empty ack.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct StepOutResponse {}

/// The body of a `setBreakpoints` response. Contains one entry per
/// requested breakpoint, in request order.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct SetBreakpointsResponse {
    /// The breakpoints, verified when they bound to a registered file.
    pub breakpoints: Vec<Breakpoint>,
}

/// The body of a `setFunctionBreakpoints` response. Contains one entry per
/// requested function breakpoint, in request order.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct SetFunctionBreakpointsResponse {
    /// The breakpoints. Function breakpoints always bind.
    pub breakpoints: Vec<Breakpoint>,
}

/// The body of a `threads` response.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct ThreadsResponse {
    /// Every live thread known to the debugger.
    pub threads: Vec<Thread>,
}

/// The body of a `stackTrace` response. Frames are ordered top of stack
/// first, the reverse of the debugger's internal bottom-first order.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponse {
    /// The frames of the requested thread's call stack.
    pub stack_frames: Vec<StackFrame>,
    /// The total number of frames available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<i64>,
}

/// The body of a `scopes` response.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct ScopesResponse {
    /// The frame's scopes: locals, arguments, registers, in that order.
    pub scopes: Vec<Scope>,
}

/// The body of a `variables` response.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct VariablesResponse {
    /// The children of the requested variable reference.
    pub variables: Vec<Variable>,
}

/// The body of a `source` response.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct SourceResponse {
    /// The content of the virtual file.
    pub content: String,
}

/// The body of a `continue` response.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ContinueResponse {
    /// True if every thread was resumed rather than the single requested
    /// one.
    pub all_threads_continued: bool,
}

/// The body of an `evaluate` response.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    /// The display value of the evaluated expression.
    pub result: String,
    /// The type of the result.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    /// Structured results would carry a child reference here; name lookups
    /// report 0.
    pub variables_reference: i64,
}
