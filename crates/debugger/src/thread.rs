//! Shader threads, stack frames, and the execution-control state machine.
//!
//! One [`Thread`] exists per OS thread running instrumented shader code.
//! The instrumented side drives it through [`Thread::enter`],
//! [`Thread::update`], and [`Thread::exit`]; the debug server drives it
//! through [`Thread::pause`], [`Thread::resume`], and the step variants.
//! The two meet at a mutex-and-condvar rendezvous: while a thread is
//! paused, the OS thread executing it is parked inside `update` until a
//! client command changes the state.

use std::sync::{Arc, Condvar, Mutex, Weak};

use crate::context::{Broadcast, ContextLock, EventListener};
use crate::file::File;
use crate::id::Id;
use crate::variable::VariableContainer;

/// A position in a source file.
#[derive(Clone)]
pub struct Location {
    /// The one-based line number.
    pub line: i32,
    /// The file.
    pub file: Arc<File>,
}

/// A named bucket of variables attached to a frame: arguments, locals, or
/// registers.
pub struct Scope {
    /// The scope's dense id.
    pub id: Id<Scope>,
    /// The file the scope's frame executes in.
    pub file: Arc<File>,
    /// The variables in this scope.
    pub variables: Arc<VariableContainer>,
}

impl Scope {
    pub(crate) fn new(
        id: Id<Scope>,
        file: Arc<File>,
        variables: Arc<VariableContainer>,
    ) -> Arc<Scope> {
        Arc::new(Scope {
            id,
            file,
            variables,
        })
    }
}

/// A single activation of a function on a thread's call stack.
pub struct Frame {
    /// The frame's dense id.
    pub id: Id<Frame>,
    /// The name of the function executing in this frame.
    pub function: String,
    /// The argument scope.
    pub arguments: Arc<Scope>,
    /// The locals scope.
    pub locals: Arc<Scope>,
    /// The registers scope.
    pub registers: Arc<Scope>,
    location: Mutex<Option<Location>>,
}

impl Frame {
    pub(crate) fn new(
        id: Id<Frame>,
        function: String,
        arguments: Arc<Scope>,
        locals: Arc<Scope>,
        registers: Arc<Scope>,
    ) -> Arc<Frame> {
        Arc::new(Frame {
            id,
            function,
            arguments,
            locals,
            registers,
            location: Mutex::new(None),
        })
    }

    /// The frame's current source location. `None` until the first
    /// `update` in this frame.
    pub fn location(&self) -> Option<Location> {
        self.location.lock().unwrap().clone()
    }

    fn set_location(&self, location: Location) {
        *self.location.lock().unwrap() = Some(location);
    }
}

/// The execution state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Executing freely; only breakpoints stop it.
    Running,
    /// Executing until the step stop-condition fires.
    Stepping,
    /// Parked inside `update` until resumed or stepped.
    Paused,
}

struct ExecState {
    frames: Vec<Arc<Frame>>,
    state: State,
    // The frame a step should stop in, or None to stop at the next update.
    pause_at: Option<Weak<Frame>>,
}

/// A thread of instrumented shader execution.
pub struct Thread {
    /// The thread's dense id.
    pub id: Id<Thread>,
    name: Mutex<String>,
    exec: Mutex<ExecState>,
    state_cv: Condvar,
    broadcast: Arc<Broadcast>,
}

impl Thread {
    pub(crate) fn new(id: Id<Thread>, name: String, broadcast: Arc<Broadcast>) -> Arc<Thread> {
        Arc::new(Thread {
            id,
            name: Mutex::new(name),
            exec: Mutex::new(ExecState {
                frames: Vec::new(),
                state: State::Running,
                pause_at: None,
            }),
            state_cv: Condvar::new(),
            broadcast,
        })
    }

    /// Rename the thread.
    pub fn set_name(&self, name: &str) {
        *self.name.lock().unwrap() = name.to_string();
    }

    /// The thread's name.
    pub fn name(&self) -> String {
        self.name.lock().unwrap().clone()
    }

    /// Push a new frame for `function`, executing in `file`.
    ///
    /// If `function` matches a function breakpoint the thread transitions
    /// to paused before its first `update` in the new frame, and the stop
    /// is announced to listeners.
    pub fn enter(&self, lock: &mut ContextLock<'_>, file: &Arc<File>, function: &str) {
        let frame = lock.create_frame(file, function);
        let hit = lock.is_function_breakpoint(function);

        {
            let mut exec = self.exec.lock().unwrap();
            exec.frames.push(frame);
            if hit {
                exec.state = State::Paused;
            }
        }
        if hit {
            self.broadcast.on_function_breakpoint_hit(self.id);
        }
    }

    /// Pop the top frame.
    pub fn exit(&self) {
        self.exec.lock().unwrap().frames.pop();
    }

    /// Report that execution reached `location`.
    ///
    /// Called by the instrumented code on every source-line change. Writes
    /// the location into the top frame, tests line breakpoints when
    /// running, applies the step stop-condition when stepping, and parks
    /// the calling thread while the resulting state is paused.
    pub fn update(&self, location: Location) {
        let (top, was_running) = {
            let exec = self.exec.lock().unwrap();
            (exec.frames.last().cloned(), exec.state == State::Running)
        };
        let Some(top) = top else {
            return;
        };
        top.set_location(location.clone());

        // The breakpoint test takes the file's own mutex, so it runs with
        // the state lock released.
        if was_running && location.file.has_breakpoint(location.line) {
            let mut exec = self.exec.lock().unwrap();
            if exec.state == State::Running {
                exec.state = State::Paused;
                drop(exec);
                self.broadcast.on_line_breakpoint_hit(self.id);
            }
        }

        let mut exec = self.exec.lock().unwrap();
        let state = exec.state;
        match state {
            State::Paused => {
                self.wait_while_paused(exec);
            }
            State::Stepping => {
                let stop = match &exec.pause_at {
                    None => true,
                    Some(weak) => match weak.upgrade() {
                        Some(frame) => Arc::ptr_eq(&frame, &top),
                        // The target frame is gone; stop here.
                        None => true,
                    },
                };
                if stop {
                    exec.state = State::Paused;
                    drop(exec);
                    self.broadcast.on_thread_stepped(self.id);

                    let exec = self.exec.lock().unwrap();
                    let mut exec = self.wait_while_paused_locked(exec);
                    exec.pause_at = None;
                }
            }
            State::Running => {}
        }
    }

    fn wait_while_paused(&self, exec: std::sync::MutexGuard<'_, ExecState>) {
        let _guard = self.wait_while_paused_locked(exec);
    }

    fn wait_while_paused_locked<'a>(
        &self,
        mut exec: std::sync::MutexGuard<'a, ExecState>,
    ) -> std::sync::MutexGuard<'a, ExecState> {
        while exec.state == State::Paused {
            exec = self.state_cv.wait(exec).unwrap();
        }
        exec
    }

    /// The current call stack, bottom of stack first.
    pub fn stack(&self) -> Vec<Arc<Frame>> {
        self.exec.lock().unwrap().frames.clone()
    }

    /// The thread's execution state.
    pub fn state(&self) -> State {
        self.exec.lock().unwrap().state
    }

    /// The registers of the top frame.
    pub fn registers(&self) -> Option<Arc<VariableContainer>> {
        self.top_scope(|frame| frame.registers.variables.clone())
    }

    /// The locals of the top frame.
    pub fn locals(&self) -> Option<Arc<VariableContainer>> {
        self.top_scope(|frame| frame.locals.variables.clone())
    }

    /// The arguments of the top frame.
    pub fn arguments(&self) -> Option<Arc<VariableContainer>> {
        self.top_scope(|frame| frame.arguments.variables.clone())
    }

    fn top_scope(
        &self,
        f: impl Fn(&Frame) -> Arc<VariableContainer>,
    ) -> Option<Arc<VariableContainer>> {
        self.exec.lock().unwrap().frames.last().map(|frame| f(frame))
    }

    /// Resume free execution, unparking the thread if it was paused.
    pub fn resume(&self) {
        let mut exec = self.exec.lock().unwrap();
        exec.state = State::Running;
        drop(exec);
        self.state_cv.notify_all();
    }

    /// Ask the thread to pause. It parks at its next `update`.
    pub fn pause(&self) {
        self.exec.lock().unwrap().state = State::Paused;
    }

    /// Step to the next update, entering calls.
    pub fn step_in(&self) {
        let mut exec = self.exec.lock().unwrap();
        exec.state = State::Stepping;
        exec.pause_at = None;
        drop(exec);
        self.state_cv.notify_all();
    }

    /// Step to the next update in the current frame, running over calls.
    pub fn step_over(&self) {
        let mut exec = self.exec.lock().unwrap();
        exec.state = State::Stepping;
        exec.pause_at = exec.frames.last().map(Arc::downgrade);
        drop(exec);
        self.state_cv.notify_all();
    }

    /// Run until execution returns to the parent frame. With only one
    /// frame on the stack, stop at the next update instead.
    pub fn step_out(&self) {
        let mut exec = self.exec.lock().unwrap();
        exec.state = State::Stepping;
        exec.pause_at = match exec.frames.len() {
            0 | 1 => None,
            len => Some(Arc::downgrade(&exec.frames[len - 2])),
        };
        drop(exec);
        self.state_cv.notify_all();
    }
}
