//! DAP Events.
//!
//! Events are sent at arbitrary times from the server to the client,
//! interleaved between responses. Each body struct carries its wire name
//! through the [`Event`] trait.

use serde::{Deserialize, Serialize};

use crate::protocol::Event;

/// Sent after the initialize response to tell the client it may begin
/// configuration (breakpoints etc).
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct InitializedEvent {}

impl Event for InitializedEvent {
    const EVENT: &'static str = "initialized";
}

/// The reason a thread stopped, reported in [`StoppedEvent`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoppedReason {
    /// Stopped on a line breakpoint.
    Breakpoint,
    /// Stopped because a step completed.
    Step,
    /// Stopped on an explicit pause request.
    Pause,
    /// Stopped on entry to a function with a function breakpoint.
    #[serde(rename = "function breakpoint")]
    FunctionBreakpoint,
}

impl Default for StoppedReason {
    fn default() -> StoppedReason {
        StoppedReason::Breakpoint
    }
}

/// Sent when a thread transitions to the paused state.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEvent {
    /// Why the thread stopped.
    pub reason: StoppedReason,
    /// The thread that stopped. For all-thread stops this is omitted,
    /// except for Visual Studio clients which require it to be filled with
    /// an arbitrary live thread.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    /// True when every thread stopped, not just `thread_id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_threads_stopped: Option<bool>,
}

/// Sent when a thread is started or exited.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEvent {
    /// `"started"` or `"exited"`.
    pub reason: String,
    /// The thread in question.
    pub thread_id: i64,
}

impl Event for ThreadEvent {
    const EVENT: &'static str = "thread";
}

impl Event for StoppedEvent {
    const EVENT: &'static str = "stopped";
}
