//! The DAP server wired to the debug context.
//!
//! [`DebugServer`] registers a handler for every supported command,
//! translating between wire types and the object model, and implements
//! [`EventListener`] to turn thread transitions into `stopped` and
//! `thread` events broadcast to every client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};

use flexi_logger::{FileSpec, FlexiLoggerError, Logger, LoggerHandle};

use dap::events::{InitializedEvent, StoppedEvent, StoppedReason, ThreadEvent};
use dap::requests::{
    ConfigurationDoneArguments, ContinueArguments, DisconnectArguments, EvaluateArguments,
    InitializeArguments, LaunchArguments, NextArguments, PauseArguments, ScopesArguments,
    SetBreakpointsArguments, SetExceptionBreakpointsArguments, SetFunctionBreakpointsArguments,
    SourceArguments, StackTraceArguments, StepInArguments, StepOutArguments, ThreadsArguments,
    VariablesArguments,
};
use dap::responses::{
    ConfigurationDoneResponse, ContinueResponse, DisconnectResponse, EvaluateResponse,
    InitializeResponse, LaunchResponse, NextResponse, PauseResponse, ScopesResponse,
    SetBreakpointsResponse, SetExceptionBreakpointsResponse, SetFunctionBreakpointsResponse,
    SourceResponse, StackTraceResponse, StepInResponse, StepOutResponse, ThreadsResponse,
    VariablesResponse,
};
use dap::server::ServerError;
use dap::types as wire;
use dap::{Error, Session};

use crate::context::{Context, ContextLock, EventListener};
use crate::file::File;
use crate::id::Id;
use crate::thread::{Scope, Thread};
use crate::variable::VariableContainer;

/// The port clients connect to unless overridden.
pub const DEFAULT_PORT: u16 = 19020;

/// Environment variable overriding the port used by [`DebugServer::get`].
const PORT_ENV_VAR: &str = "DEBUGGER_PORT";

static LOGGER: Mutex<Option<LoggerHandle>> = Mutex::new(None);

static INSTANCE: Mutex<Option<Weak<DebugServer>>> = Mutex::new(None);

/// One-shot gate the embedding runtime waits on until the client has
/// finished configuring breakpoints.
struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn new() -> Gate {
        Gate {
            open: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }
}

struct ServerInner {
    ctx: Arc<Context>,
    wire: dap::Server,
    client_is_visual_studio: AtomicBool,
    configuration_done: Gate,
}

/// The debug server: a listening DAP endpoint bound to one [`Context`].
pub struct DebugServer {
    inner: Arc<ServerInner>,
    // Keeps the context's weak listener entry alive for our lifetime.
    listener: Arc<dyn EventListener>,
}

impl DebugServer {
    /// The process-wide server, created on first use.
    ///
    /// Binds [`DEFAULT_PORT`] (or `DEBUGGER_PORT` from the environment) and
    /// then *blocks* until a client has connected and sent
    /// `configurationDone`, so that breakpoints are in place before any
    /// shader executes.
    pub fn get() -> Result<Arc<DebugServer>, ServerError> {
        let server = {
            let mut instance = INSTANCE.lock().unwrap();
            if let Some(server) = instance.as_ref().and_then(Weak::upgrade) {
                return Ok(server);
            }
            let _ = init_logger();
            let port = std::env::var(PORT_ENV_VAR)
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_PORT);
            let server = DebugServer::create(&Context::new(), port)?;
            *instance = Some(Arc::downgrade(&server));
            server
        };
        log::info!("waiting for debugger configuration...");
        server.wait_for_configuration();
        Ok(server)
    }

    /// Create a server on an explicit context and port. Pass port 0 for an
    /// ephemeral port. Does not wait for the client.
    pub fn create(ctx: &Arc<Context>, port: u16) -> Result<Arc<DebugServer>, ServerError> {
        let session = Session::new();
        let wire = dap::Server::bind(port, session.clone())?;
        let inner = Arc::new(ServerInner {
            ctx: ctx.clone(),
            wire,
            client_is_visual_studio: AtomicBool::new(false),
            configuration_done: Gate::new(),
        });
        register_handlers(&session, &inner);

        let listener: Arc<dyn EventListener> = inner.clone();
        ctx.add_listener(&listener);

        Ok(Arc::new(DebugServer { inner, listener }))
    }

    /// The context this server exposes.
    pub fn context(&self) -> &Arc<Context> {
        &self.inner.ctx
    }

    /// The port clients connect to.
    pub fn local_port(&self) -> u16 {
        self.inner.wire.local_port()
    }

    /// Block until a client has sent `configurationDone`.
    pub fn wait_for_configuration(&self) {
        self.inner.configuration_done.wait();
    }

    /// The [`Thread`] for the calling OS thread, created on first use.
    pub fn current_thread(&self) -> Arc<Thread> {
        self.inner.ctx.lock().current_thread()
    }

    /// Look up a file by id.
    pub fn file(&self, id: Id<File>) -> Option<Arc<File>> {
        self.inner.ctx.lock().file(id)
    }

    /// Register an in-memory source file.
    pub fn create_virtual_file(&self, name: &str, source: &str) -> Arc<File> {
        self.inner.ctx.lock().create_virtual_file(name, source)
    }

    /// Register an on-disk source file by path.
    pub fn create_physical_file(&self, path: &str, source: Option<&str>) -> Arc<File> {
        self.inner.ctx.lock().create_physical_file(path, source)
    }

    /// Create a container for structured values.
    pub fn create_variable_container(&self) -> Arc<VariableContainer> {
        self.inner.ctx.lock().create_variable_container()
    }
}

impl Drop for DebugServer {
    fn drop(&mut self) {
        self.inner.ctx.remove_listener(&self.listener);
        self.inner.wire.end();
    }
}

impl EventListener for ServerInner {
    fn on_thread_started(&self, thread: Id<Thread>) {
        self.wire.broadcast_event(&ThreadEvent {
            reason: "started".to_string(),
            thread_id: thread.into(),
        });
    }

    fn on_thread_stepped(&self, thread: Id<Thread>) {
        self.broadcast_stop(StoppedReason::Step, thread);
    }

    fn on_line_breakpoint_hit(&self, thread: Id<Thread>) {
        self.broadcast_stop(StoppedReason::Breakpoint, thread);
    }

    fn on_function_breakpoint_hit(&self, thread: Id<Thread>) {
        self.broadcast_stop(StoppedReason::FunctionBreakpoint, thread);
    }
}

impl ServerInner {
    fn broadcast_stop(&self, reason: StoppedReason, thread: Id<Thread>) {
        self.wire.broadcast_event(&StoppedEvent {
            reason,
            thread_id: Some(thread.into()),
            all_threads_stopped: None,
        });
    }

    fn visual_studio(&self) -> bool {
        self.client_is_visual_studio.load(Ordering::SeqCst)
    }

    /// Convert a file to its wire source. Virtual files are addressed by
    /// `sourceReference`, physical files by path.
    fn source(&self, file: &File) -> wire::Source {
        let mut name = file.name.clone();
        if self.visual_studio() && file.is_virtual() {
            // WORKAROUND:
            // https://github.com/microsoft/VSDebugAdapterHost/issues/15
            name = name.replace('.', "_");
        }
        if file.is_virtual() {
            wire::Source {
                name: Some(name),
                path: None,
                source_reference: Some(file.id.into()),
            }
        } else {
            wire::Source {
                name: Some(name),
                path: Some(file.path()),
                source_reference: None,
            }
        }
    }

    fn scope(&self, name: &str, scope: &Scope) -> wire::Scope {
        wire::Scope {
            name: name.to_string(),
            presentation_hint: Some(name.to_string()),
            variables_reference: scope.variables.id.into(),
            source: Some(self.source(&scope.file)),
        }
    }

    /// Resolve a request's source to a registered file: by
    /// `sourceReference` first, then by matching path, then by matching
    /// name.
    fn file(&self, lock: &ContextLock<'_>, source: &wire::Source) -> Option<Arc<File>> {
        if let Some(reference) = source.source_reference {
            if let Some(file) = Id::from_wire(reference).and_then(|id| lock.file(id)) {
                return Some(file);
            }
        }
        let files = lock.files();
        if let Some(path) = &source.path {
            return files.into_iter().find(|file| &file.path() == path);
        }
        if let Some(name) = &source.name {
            return files.into_iter().find(|file| &file.name == name);
        }
        None
    }

    fn thread(&self, lock: &ContextLock<'_>, thread_id: i64) -> Option<Arc<Thread>> {
        Id::from_wire(thread_id).and_then(|id| lock.thread(id))
    }
}

fn register_handlers(session: &Session, inner: &Arc<ServerInner>) {
    let server = Arc::downgrade(inner);

    let weak = server.clone();
    session.on_request::<InitializeArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let is_visual_studio = args.client_id.as_deref() == Some("visualstudio");
        inner
            .client_is_visual_studio
            .store(is_visual_studio, Ordering::SeqCst);
        Ok(InitializeResponse {
            capabilities: wire::Capabilities {
                supports_function_breakpoints: true,
                supports_configuration_done_request: true,
            },
        })
    });

    // The initialized event must trail the initialize response.
    session.on_response_sent::<InitializeArguments, _>(|conn, outcome| {
        if outcome.is_ok() {
            if let Err(e) = conn.send_event(&InitializedEvent {}) {
                log::error!("failed to send initialized event: {e}");
            }
        }
    });

    let weak = server.clone();
    session.on_request::<ConfigurationDoneArguments, _>(move |_args| {
        let inner = upgrade(&weak)?;
        inner.configuration_done.open();
        Ok(ConfigurationDoneResponse {})
    });

    session.on_request::<DisconnectArguments, _>(|_args| Ok(DisconnectResponse {}));
    session.on_request::<LaunchArguments, _>(|_args| Ok(LaunchResponse {}));
    session.on_request::<SetExceptionBreakpointsArguments, _>(|_args| {
        Ok(SetExceptionBreakpointsResponse {})
    });

    let weak = server.clone();
    session.on_request::<SetFunctionBreakpointsArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let mut lock = inner.ctx.lock();
        lock.clear_function_breakpoints();
        let mut breakpoints = Vec::with_capacity(args.breakpoints.len());
        for bp in &args.breakpoints {
            lock.add_function_breakpoint(&bp.name);
            breakpoints.push(wire::Breakpoint {
                verified: true,
                source: None,
                line: None,
            });
        }
        Ok(SetFunctionBreakpointsResponse { breakpoints })
    });

    let weak = server.clone();
    session.on_request::<SetBreakpointsArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let mut lock = inner.ctx.lock();
        let requested = args.breakpoints.unwrap_or_default();

        let mut verified = false;
        if let Some(file) = inner.file(&lock, &args.source) {
            file.clear_breakpoints();
            for bp in &requested {
                if let Ok(line) = i32::try_from(bp.line) {
                    file.add_breakpoint(line);
                }
            }
            verified = true;
        } else if let Some(name) = &args.source.name {
            let lines = requested
                .iter()
                .filter_map(|bp| i32::try_from(bp.line).ok())
                .collect();
            lock.add_pending_breakpoints(name, lines);
        }

        let breakpoints = requested
            .iter()
            .map(|bp| wire::Breakpoint {
                verified,
                source: Some(args.source.clone()),
                line: Some(bp.line),
            })
            .collect();
        Ok(SetBreakpointsResponse { breakpoints })
    });

    let weak = server.clone();
    session.on_request::<ThreadsArguments, _>(move |_args| {
        let inner = upgrade(&weak)?;
        let lock = inner.ctx.lock();
        let threads = lock
            .threads()
            .into_iter()
            .map(|thread| {
                let mut name = thread.name();
                if inner.visual_studio() {
                    // WORKAROUND:
                    // https://github.com/microsoft/VSDebugAdapterHost/issues/15
                    name = name.replace('.', "_");
                }
                wire::Thread {
                    id: thread.id.into(),
                    name,
                }
            })
            .collect();
        Ok(ThreadsResponse { threads })
    });

    let weak = server.clone();
    session.on_request::<StackTraceArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let lock = inner.ctx.lock();
        let thread = inner
            .thread(&lock, args.thread_id)
            .ok_or_else(|| Error::new(format!("Thread {} not found", args.thread_id)))?;

        let stack = thread.stack();
        let stack_frames = stack
            .iter()
            .rev()
            .map(|frame| {
                let location = frame.location();
                wire::StackFrame {
                    id: frame.id.into(),
                    name: frame.function.clone(),
                    source: location.as_ref().map(|loc| inner.source(&loc.file)),
                    line: location.as_ref().map_or(0, |loc| loc.line as i64),
                    column: 0,
                }
            })
            .collect();
        Ok(StackTraceResponse {
            stack_frames,
            total_frames: Some(stack.len() as i64),
        })
    });

    let weak = server.clone();
    session.on_request::<ScopesArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let lock = inner.ctx.lock();
        let frame = Id::from_wire(args.frame_id)
            .and_then(|id| lock.frame(id))
            .ok_or_else(|| Error::new(format!("Frame {} not found", args.frame_id)))?;

        Ok(ScopesResponse {
            scopes: vec![
                inner.scope("locals", &frame.locals),
                inner.scope("arguments", &frame.arguments),
                inner.scope("registers", &frame.registers),
            ],
        })
    });

    let weak = server.clone();
    session.on_request::<VariablesArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let lock = inner.ctx.lock();
        let container = Id::from_wire(args.variables_reference)
            .and_then(|id| lock.container(id))
            .ok_or_else(|| {
                Error::new(format!(
                    "VariablesReference {} not found",
                    args.variables_reference
                ))
            })?;

        let start = usize::try_from(args.start.unwrap_or(0)).unwrap_or(0);
        let mut variables = Vec::new();
        container.for_each(start, |variable| {
            if let Some(count) = args.count {
                if variables.len() >= count as usize {
                    return;
                }
            }
            let reference = variable
                .value
                .container()
                .map_or(0, |child| child.id.into());
            variables.push(wire::Variable {
                name: variable.name.clone(),
                evaluate_name: Some(variable.name.clone()),
                value: variable.value.string(),
                ty: Some(variable.value.ty().name()),
                variables_reference: reference,
            });
        });
        Ok(VariablesResponse { variables })
    });

    let weak = server.clone();
    session.on_request::<SourceArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let lock = inner.ctx.lock();
        let file = Id::from_wire(args.source_reference)
            .and_then(|id| lock.file(id))
            .ok_or_else(|| Error::new(format!("Source {} not found", args.source_reference)))?;
        if !file.is_virtual() {
            return Err(Error::new(format!(
                "Source {} is not a virtual file",
                args.source_reference
            )));
        }
        Ok(SourceResponse {
            content: file.source().unwrap_or_default().to_string(),
        })
    });

    let weak = server.clone();
    session.on_request::<PauseArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let lock = inner.ctx.lock();
        let mut event = StoppedEvent {
            reason: StoppedReason::Pause,
            thread_id: None,
            all_threads_stopped: None,
        };
        if let Some(thread) = inner.thread(&lock, args.thread_id) {
            thread.pause();
            event.thread_id = Some(args.thread_id);
        } else {
            let threads = lock.threads();
            for thread in &threads {
                thread.pause();
            }
            event.all_threads_stopped = Some(true);
            if inner.visual_studio() {
                // WORKAROUND:
                // https://github.com/microsoft/VSDebugAdapterHost/issues/11
                event.thread_id = threads.first().map(|thread| thread.id.into());
            }
        }
        inner.wire.broadcast_event(&event);
        Ok(PauseResponse {})
    });

    let weak = server.clone();
    session.on_request::<ContinueArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let lock = inner.ctx.lock();
        if let Some(thread) = inner.thread(&lock, args.thread_id) {
            thread.resume();
            Ok(ContinueResponse {
                all_threads_continued: false,
            })
        } else {
            for thread in lock.threads() {
                thread.resume();
            }
            Ok(ContinueResponse {
                all_threads_continued: true,
            })
        }
    });

    let weak = server.clone();
    session.on_request::<NextArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let lock = inner.ctx.lock();
        let thread = inner
            .thread(&lock, args.thread_id)
            .ok_or_else(|| Error::new(format!("Unknown thread {}", args.thread_id)))?;
        thread.step_over();
        Ok(NextResponse {})
    });

    let weak = server.clone();
    session.on_request::<StepInArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let lock = inner.ctx.lock();
        let thread = inner
            .thread(&lock, args.thread_id)
            .ok_or_else(|| Error::new(format!("Unknown thread {}", args.thread_id)))?;
        thread.step_in();
        Ok(StepInResponse {})
    });

    let weak = server.clone();
    session.on_request::<StepOutArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let lock = inner.ctx.lock();
        let thread = inner
            .thread(&lock, args.thread_id)
            .ok_or_else(|| Error::new(format!("Unknown thread {}", args.thread_id)))?;
        thread.step_out();
        Ok(StepOutResponse {})
    });

    let weak = server;
    session.on_request::<EvaluateArguments, _>(move |args| {
        let inner = upgrade(&weak)?;
        let lock = inner.ctx.lock();
        if let Some(frame_id) = args.frame_id {
            let frame = Id::from_wire(frame_id)
                .and_then(|id| lock.frame(id))
                .ok_or_else(|| Error::new(format!("Unknown frame {frame_id}")))?;
            for scope in [&frame.locals, &frame.arguments, &frame.registers] {
                if let Some(variable) = scope.variables.find(&args.expression) {
                    return Ok(EvaluateResponse {
                        result: variable.value.string(),
                        ty: Some(variable.value.ty().name()),
                        variables_reference: 0,
                    });
                }
            }
        }
        Err(Error::new("Could not evaluate expression"))
    });
}

fn upgrade(weak: &Weak<ServerInner>) -> Result<Arc<ServerInner>, Error> {
    weak.upgrade().ok_or_else(|| Error::new("server shut down"))
}

/// Initialize file-based logging under `DebuggerLogs/`, honoring
/// `RUST_LOG`-style filtering from the environment. Idempotent; failures
/// leave logging disabled.
pub fn init_logger() -> Result<(), FlexiLoggerError> {
    let mut logger = LOGGER.lock().unwrap();
    if logger.is_some() {
        return Ok(());
    }
    let handle = Logger::try_with_env_or_str("info")?
        .log_to_file(FileSpec::default().directory("DebuggerLogs"))
        .start()?;
    logger.replace(handle);
    Ok(())
}
