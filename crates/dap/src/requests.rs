//! DAP Requests.
//!
//! One argument struct per supported command, each tied to its response body
//! through the [`Request`] trait. Argument structs derive `Default` so that
//! a request arriving without an `arguments` object still constructs.

use serde::{Deserialize, Serialize};

use crate::protocol::Request;
use crate::responses::{
    ConfigurationDoneResponse, ContinueResponse, DisconnectResponse, EvaluateResponse,
    InitializeResponse, LaunchResponse, NextResponse, PauseResponse, ScopesResponse,
    SetBreakpointsResponse, SetExceptionBreakpointsResponse, SetFunctionBreakpointsResponse,
    SourceResponse, StackTraceResponse, StepInResponse, StepOutResponse, ThreadsResponse,
    VariablesResponse,
};
use crate::types::{FunctionBreakpoint, Source, SourceBreakpoint};

/// Arguments for the `initialize` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InitializeArguments {
    /// The identity of the connecting client. Certain workarounds are
    /// activated when this is `"visualstudio"`.
    #[serde(rename = "clientID", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// If present and false the client expects lines to start at 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_start_at1: Option<bool>,
}

impl Request for InitializeArguments {
    const COMMAND: &'static str = "initialize";
    type Response = InitializeResponse;
}

/// Arguments for the `configurationDone` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct ConfigurationDoneArguments {}

impl Request for ConfigurationDoneArguments {
    const COMMAND: &'static str = "configurationDone";
    type Response = ConfigurationDoneResponse;
}

/// Arguments for the `disconnect` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct DisconnectArguments {
    /// If true the debuggee should be terminated. The debuggee here is the
    /// driver itself, which stays alive regardless.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminate_debuggee: Option<bool>,
}

impl Request for DisconnectArguments {
    const COMMAND: &'static str = "disconnect";
    type Response = DisconnectResponse;
}

/// Arguments for the `launch` request. The debuggee is already running
/// in-process, so this is an ack.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct LaunchArguments {
    /// If true the client does not intend to debug.
    #[serde(rename = "noDebug", skip_serializing_if = "Option::is_none")]
    pub no_debug: Option<bool>,
}

impl Request for LaunchArguments {
    const COMMAND: &'static str = "launch";
    type Response = LaunchResponse;
}

/// Arguments for the `setExceptionBreakpoints` request. Shader programs
/// have no exceptions; accepted and ignored.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct SetExceptionBreakpointsArguments {
    /// The requested exception filters.
    #[serde(default)]
    pub filters: Vec<String>,
}

impl Request for SetExceptionBreakpointsArguments {
    const COMMAND: &'static str = "setExceptionBreakpoints";
    type Response = SetExceptionBreakpointsResponse;
}

/// Arguments for the `setFunctionBreakpoints` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct SetFunctionBreakpointsArguments {
    /// The new, complete set of function breakpoints. Replaces any
    /// previously set.
    #[serde(default)]
    pub breakpoints: Vec<FunctionBreakpoint>,
}

impl Request for SetFunctionBreakpointsArguments {
    const COMMAND: &'static str = "setFunctionBreakpoints";
    type Response = SetFunctionBreakpointsResponse;
}

/// Arguments for the `setBreakpoints` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct SetBreakpointsArguments {
    /// The source to set breakpoints in.
    pub source: Source,
    /// The new, complete set of line breakpoints for this source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakpoints: Option<Vec<SourceBreakpoint>>,
}

impl Request for SetBreakpointsArguments {
    const COMMAND: &'static str = "setBreakpoints";
    type Response = SetBreakpointsResponse;
}

/// Arguments for the `threads` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct ThreadsArguments {}

impl Request for ThreadsArguments {
    const COMMAND: &'static str = "threads";
    type Response = ThreadsResponse;
}

/// Arguments for the `stackTrace` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceArguments {
    /// The thread whose stack to report.
    pub thread_id: i64,
}

impl Request for StackTraceArguments {
    const COMMAND: &'static str = "stackTrace";
    type Response = StackTraceResponse;
}

/// Arguments for the `scopes` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ScopesArguments {
    /// The frame whose scopes to report.
    pub frame_id: i64,
}

impl Request for ScopesArguments {
    const COMMAND: &'static str = "scopes";
    type Response = ScopesResponse;
}

/// Arguments for the `variables` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VariablesArguments {
    /// The reference previously handed out in a scope or structured
    /// variable.
    pub variables_reference: i64,
    /// Index of the first variable to return. Defaults to 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// If present, the maximum number of variables to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

impl Request for VariablesArguments {
    const COMMAND: &'static str = "variables";
    type Response = VariablesResponse;
}

/// Arguments for the `source` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SourceArguments {
    /// The reference of the virtual file whose content to fetch.
    pub source_reference: i64,
}

impl Request for SourceArguments {
    const COMMAND: &'static str = "source";
    type Response = SourceResponse;
}

/// Arguments for the `pause` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PauseArguments {
    /// The thread to pause. If it names no live thread every thread is
    /// paused.
    pub thread_id: i64,
}

impl Request for PauseArguments {
    const COMMAND: &'static str = "pause";
    type Response = PauseResponse;
}

/// Arguments for the `continue` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ContinueArguments {
    /// The thread to resume. If it names no live thread every thread is
    /// resumed.
    pub thread_id: i64,
}

impl Request for ContinueArguments {
    const COMMAND: &'static str = "continue";
    type Response = ContinueResponse;
}

/// Arguments for the `next` (step over) request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NextArguments {
    /// The thread to step.
    pub thread_id: i64,
}

impl Request for NextArguments {
    const COMMAND: &'static str = "next";
    type Response = NextResponse;
}

/// Arguments for the `stepIn` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StepInArguments {
    /// The thread to step.
    pub thread_id: i64,
}

impl Request for StepInArguments {
    const COMMAND: &'static str = "stepIn";
    type Response = StepInResponse;
}

/// Arguments for the `stepOut` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StepOutArguments {
    /// The thread to step.
    pub thread_id: i64,
}

impl Request for StepOutArguments {
    const COMMAND: &'static str = "stepOut";
    type Response = StepOutResponse;
}

/// Arguments for the `evaluate` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArguments {
    /// The expression to evaluate. Only plain variable names are supported,
    /// looked up in the frame's locals, arguments, then registers.
    pub expression: String,
    /// The frame to evaluate in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
}

impl Request for EvaluateArguments {
    const COMMAND: &'static str = "evaluate";
    type Response = EvaluateResponse;
}
