//! # Shader debugger
//!
//! The driver's debug subsystem. Instrumented shader code registers source
//! files, threads, stack frames, and variables with a [`Context`], and
//! reports every source-location change through [`Thread::update`]; a
//! [`DebugServer`] exposes the lot to external debugger UIs over the Debug
//! Adapter Protocol and drives each thread's run/step/pause state machine
//! from client commands.
//!
//! The instrumented code and the client race freely: threads block inside
//! [`Thread::update`] while paused, and the server resumes them from its
//! dispatch threads. All shared objects carry dense integer ids and are
//! registered weakly, so the runtime can drop a stack frame and have its
//! scopes and variables vanish without coordinating with the server.

pub mod context;
pub mod file;
pub mod id;
pub mod server;
pub mod thread;
pub mod variable;
pub mod weak_map;

pub use context::{Context, ContextLock, EventListener};
pub use file::File;
pub use id::Id;
pub use server::{init_logger, DebugServer, DEFAULT_PORT};
pub use thread::{Frame, Location, Scope, State, Thread};
pub use variable::{constant, Kind, Type, Value, Variable, VariableContainer};
