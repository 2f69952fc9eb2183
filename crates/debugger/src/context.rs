//! The debug context: every object the debugger knows about.
//!
//! A [`Context`] owns the per-kind id counters, the weak registries that
//! resolve wire ids back to live objects, the pending- and
//! function-breakpoint tables, and the listener fan-out for thread events.
//! All of it sits behind one session-level mutex; [`Context::lock`] returns
//! a [`ContextLock`] guard whose methods do the actual work, and call
//! chains that need the lock take the guard as a parameter rather than
//! re-locking.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::thread::ThreadId;

use crate::file::{split_path, File};
use crate::id::{Id, IdAllocator};
use crate::thread::{Frame, Scope, Thread};
use crate::variable::VariableContainer;
use crate::weak_map::WeakMap;

/// Receives notifications when instrumented threads start, stop, and step.
///
/// The debug server implements this to turn thread transitions into DAP
/// events. Listeners are held weakly; a dropped listener just stops
/// receiving.
pub trait EventListener: Send + Sync {
    /// A new thread made its first call into the debugger.
    fn on_thread_started(&self, _thread: Id<Thread>) {}
    /// A step completed and the thread paused.
    fn on_thread_stepped(&self, _thread: Id<Thread>) {}
    /// A line breakpoint was hit and the thread paused.
    fn on_line_breakpoint_hit(&self, _thread: Id<Thread>) {}
    /// A function breakpoint was hit and the thread paused.
    fn on_function_breakpoint_hit(&self, _thread: Id<Thread>) {}
}

/// Fans one notification out to every registered listener.
pub(crate) struct Broadcast {
    listeners: RwLock<Vec<Weak<dyn EventListener>>>,
}

impl Broadcast {
    fn new() -> Arc<Broadcast> {
        Arc::new(Broadcast {
            listeners: RwLock::new(Vec::new()),
        })
    }

    fn add(&self, listener: &Arc<dyn EventListener>) {
        let mut listeners = self.listeners.write().unwrap();
        listeners.retain(|weak| weak.strong_count() > 0);
        listeners.push(Arc::downgrade(listener));
    }

    fn remove(&self, listener: &Arc<dyn EventListener>) {
        let target = Arc::as_ptr(listener) as *const ();
        self.listeners
            .write()
            .unwrap()
            .retain(|weak| weak.as_ptr() as *const () != target);
    }

    fn each(&self, f: impl Fn(&dyn EventListener)) {
        let listeners: Vec<Arc<dyn EventListener>> = {
            let listeners = self.listeners.read().unwrap();
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in listeners {
            f(&*listener);
        }
    }
}

impl EventListener for Broadcast {
    fn on_thread_started(&self, thread: Id<Thread>) {
        self.each(|l| l.on_thread_started(thread));
    }
    fn on_thread_stepped(&self, thread: Id<Thread>) {
        self.each(|l| l.on_thread_stepped(thread));
    }
    fn on_line_breakpoint_hit(&self, thread: Id<Thread>) {
        self.each(|l| l.on_line_breakpoint_hit(thread));
    }
    fn on_function_breakpoint_hit(&self, thread: Id<Thread>) {
        self.each(|l| l.on_function_breakpoint_hit(thread));
    }
}

struct ContextState {
    files: WeakMap<Id<File>, File>,
    threads: WeakMap<Id<Thread>, Thread>,
    frames: WeakMap<Id<Frame>, Frame>,
    scopes: WeakMap<Id<Scope>, Scope>,
    containers: WeakMap<Id<VariableContainer>, VariableContainer>,
    // One strong handle per OS thread; threads live as long as the context.
    threads_by_os: HashMap<ThreadId, Arc<Thread>>,
    file_ids: IdAllocator<File>,
    thread_ids: IdAllocator<Thread>,
    frame_ids: IdAllocator<Frame>,
    scope_ids: IdAllocator<Scope>,
    container_ids: IdAllocator<VariableContainer>,
    // Breakpoints set against file names the runtime has not registered
    // yet, applied and consumed on first registration of that name.
    pending_breakpoints: HashMap<String, Vec<i32>>,
    function_breakpoints: HashSet<String>,
}

/// The shared state of one debug session.
pub struct Context {
    broadcast: Arc<Broadcast>,
    state: Mutex<ContextState>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Arc<Context> {
        Arc::new(Context {
            broadcast: Broadcast::new(),
            state: Mutex::new(ContextState {
                files: WeakMap::new(),
                threads: WeakMap::new(),
                frames: WeakMap::new(),
                scopes: WeakMap::new(),
                containers: WeakMap::new(),
                threads_by_os: HashMap::new(),
                file_ids: IdAllocator::new(),
                thread_ids: IdAllocator::new(),
                frame_ids: IdAllocator::new(),
                scope_ids: IdAllocator::new(),
                container_ids: IdAllocator::new(),
                pending_breakpoints: HashMap::new(),
                function_breakpoints: HashSet::new(),
            }),
        })
    }

    /// Take the session lock.
    pub fn lock(&self) -> ContextLock<'_> {
        ContextLock {
            state: self.state.lock().unwrap(),
            broadcast: &self.broadcast,
        }
    }

    /// Register a listener for thread events.
    pub fn add_listener(&self, listener: &Arc<dyn EventListener>) {
        self.broadcast.add(listener);
    }

    /// Unregister a listener.
    pub fn remove_listener(&self, listener: &Arc<dyn EventListener>) {
        self.broadcast.remove(listener);
    }
}

/// The held session lock. All context operations happen through this guard.
pub struct ContextLock<'a> {
    state: MutexGuard<'a, ContextState>,
    broadcast: &'a Arc<Broadcast>,
}

impl ContextLock<'_> {
    /// The [`Thread`] for the calling OS thread, created on first use. The
    /// first call from a new OS thread announces the thread to listeners.
    pub fn current_thread(&mut self) -> Arc<Thread> {
        let os_id = std::thread::current().id();
        if let Some(thread) = self.state.threads_by_os.get(&os_id) {
            return thread.clone();
        }
        let id = self.state.thread_ids.next();
        let thread = Thread::new(id, format!("Thread {id}"), self.broadcast.clone());
        self.state.threads_by_os.insert(os_id, thread.clone());
        self.state.threads.add(id, &thread);
        self.broadcast.on_thread_started(id);
        thread
    }

    /// Look up a thread by id.
    pub fn thread(&self, id: Id<Thread>) -> Option<Arc<Thread>> {
        self.state.threads.get(id)
    }

    /// Every live thread.
    pub fn threads(&self) -> Vec<Arc<Thread>> {
        self.state
            .threads
            .live()
            .into_iter()
            .map(|(_, thread)| thread)
            .collect()
    }

    /// Look up a file by id.
    pub fn file(&self, id: Id<File>) -> Option<Arc<File>> {
        self.state.files.get(id)
    }

    /// Every live file.
    pub fn files(&self) -> Vec<Arc<File>> {
        self.state
            .files
            .live()
            .into_iter()
            .map(|(_, file)| file)
            .collect()
    }

    /// Look up a frame by id.
    pub fn frame(&self, id: Id<Frame>) -> Option<Arc<Frame>> {
        self.state.frames.get(id)
    }

    /// Look up a variable container by id.
    pub fn container(&self, id: Id<VariableContainer>) -> Option<Arc<VariableContainer>> {
        self.state.containers.get(id)
    }

    /// Register a file whose content lives in memory. Pending breakpoints
    /// against the name are applied.
    pub fn create_virtual_file(&mut self, name: &str, source: &str) -> Arc<File> {
        let id = self.state.file_ids.next();
        let file = File::new_virtual(id, name.to_string(), source.to_string());
        self.register_file(&file);
        file
    }

    /// Register a file on disk, given its full path. Pending breakpoints
    /// against the name portion are applied.
    pub fn create_physical_file(&mut self, path: &str, source: Option<&str>) -> Arc<File> {
        let (dir, name) = split_path(path);
        let id = self.state.file_ids.next();
        let file = File::new_physical(id, dir, name, source.map(str::to_string));
        self.register_file(&file);
        file
    }

    fn register_file(&mut self, file: &Arc<File>) {
        if let Some(lines) = self.state.pending_breakpoints.remove(&file.name) {
            for line in lines {
                file.add_breakpoint(line);
            }
        }
        self.state.files.add(file.id, file);
    }

    /// Create a free-standing variable container, for structured values.
    pub fn create_variable_container(&mut self) -> Arc<VariableContainer> {
        let id = self.state.container_ids.next();
        let container = VariableContainer::new(id);
        self.state.containers.add(id, &container);
        container
    }

    /// Build a frame for `function` with its three scopes, registering the
    /// frame, the scopes, and their containers.
    pub(crate) fn create_frame(&mut self, file: &Arc<File>, function: &str) -> Arc<Frame> {
        let arguments = self.create_scope(file);
        let locals = self.create_scope(file);
        let registers = self.create_scope(file);
        let id = self.state.frame_ids.next();
        let frame = Frame::new(id, function.to_string(), arguments, locals, registers);
        self.state.frames.add(id, &frame);
        frame
    }

    fn create_scope(&mut self, file: &Arc<File>) -> Arc<Scope> {
        let container_id = self.state.container_ids.next();
        let variables = VariableContainer::new(container_id);
        self.state.containers.add(container_id, &variables);

        let id = self.state.scope_ids.next();
        let scope = Scope::new(id, file.clone(), variables);
        self.state.scopes.add(id, &scope);
        scope
    }

    /// Add `name` to the function-breakpoint set.
    pub fn add_function_breakpoint(&mut self, name: &str) {
        self.state.function_breakpoints.insert(name.to_string());
    }

    /// Empty the function-breakpoint set.
    pub fn clear_function_breakpoints(&mut self) {
        self.state.function_breakpoints.clear();
    }

    /// True if entering `name` should pause the thread.
    pub fn is_function_breakpoint(&self, name: &str) -> bool {
        self.state.function_breakpoints.contains(name)
    }

    /// Record breakpoints for a file name that has not been registered yet.
    /// Replaces any lines already pending for that name.
    pub fn add_pending_breakpoints(&mut self, name: &str, lines: Vec<i32>) {
        self.state.pending_breakpoints.insert(name.to_string(), lines);
    }
}
