//! DAP Types. Data structures used as part of the protocol.

use serde::{Deserialize, Serialize};

/// Capabilities are sent as part of the initialize response and tell the
/// client about specific features the adapter supports. The shader debugger
/// is quite limited and doesn't support many features a more sophisticated
/// debugger might.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// The adapter supports breaking on function entry by function name.
    pub supports_function_breakpoints: bool,
    /// The client may send a `configurationDone` request when it has
    /// completed its configuration.
    pub supports_configuration_done_request: bool,
}

/// A source file.
///
/// Sent by the client in `setBreakpoints` requests and sent by the server
/// inside stack frames, scopes, and breakpoints.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// The short name of the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The full path to the file. Only populated for physical files; clients
    /// fetch the content from disk themselves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// For virtual files, the reference used with the `source` request to
    /// fetch the content from the server. Physical files leave this unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<i64>,
}

/// A breakpoint location in a `setBreakpoints` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct SourceBreakpoint {
    /// The line for this breakpoint.
    pub line: i64,
}

/// A function-name breakpoint in a `setFunctionBreakpoints` request.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct FunctionBreakpoint {
    /// The name of the function to break on entry to.
    pub name: String,
}

/// Breakpoints are sent back in `setBreakpoints` and
/// `setFunctionBreakpoints` responses, indicating whether each requested
/// breakpoint could actually be bound.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Breakpoint {
    /// True if the breakpoint was bound to a known file. Breakpoints against
    /// files the runtime has not registered yet are reported unverified and
    /// applied when the file appears.
    pub verified: bool,
    /// The source the breakpoint was requested against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// The line number the breakpoint is on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
}

/// A single frame of a thread's call stack, sent in `stackTrace` responses.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct StackFrame {
    /// The server-assigned frame id, used by `scopes` requests.
    pub id: i64,
    /// The name of the function executing in this frame.
    pub name: String,
    /// The source file for this frame, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// The current line within the frame.
    pub line: i64,
    /// The current column. The debugger only tracks lines, so this is
    /// always 0.
    pub column: i64,
}

/// A scope, sent as part of a `scopes` response.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// The name of the scope (locals, arguments, registers).
    pub name: String,
    /// A hint for how the client should present this scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_hint: Option<String>,
    /// The reference to fetch this scope's variables with a `variables`
    /// request.
    pub variables_reference: i64,
    /// The source file this scope belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

/// A variable, sent as part of a `variables` response.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// The name of the variable.
    pub name: String,
    /// The expression that evaluates to this variable. Always the plain
    /// name here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluate_name: Option<String>,
    /// The display value of the variable.
    pub value: String,
    /// The type of the variable.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    /// If nonzero, the variable is structured and its children can be
    /// fetched with a `variables` request using this reference.
    pub variables_reference: i64,
}

/// A thread, sent as part of a `threads` response.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Thread {
    /// The server-assigned thread id.
    pub id: i64,
    /// The name of the thread.
    pub name: String,
}
