//! Source files and their breakpoints.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::id::Id;

/// Whether a file's content lives in memory or on disk.
enum FileKind {
    /// Generated source (e.g. disassembled shaders). The content is served
    /// to the client through the `source` request.
    Virtual { source: String },
    /// A file on disk. Clients fetch the content from the path themselves;
    /// the server may still hold a copy of the text.
    Physical { source: Option<String> },
}

/// A registered source file.
///
/// Metadata is immutable after creation; only the breakpoint set changes.
/// `has_breakpoint` is the hot-path predicate the instrumented code runs on
/// every source-line change, so the set is a hash set behind its own mutex.
pub struct File {
    /// The file's dense id. For virtual files this doubles as the DAP
    /// `sourceReference`.
    pub id: Id<File>,
    /// The directory portion of the path. Empty for virtual files.
    pub dir: String,
    /// The file name.
    pub name: String,
    kind: FileKind,
    breakpoints: Mutex<HashSet<i32>>,
}

impl File {
    pub(crate) fn new_virtual(id: Id<File>, name: String, source: String) -> Arc<File> {
        Arc::new(File {
            id,
            dir: String::new(),
            name,
            kind: FileKind::Virtual { source },
            breakpoints: Mutex::new(HashSet::new()),
        })
    }

    pub(crate) fn new_physical(
        id: Id<File>,
        dir: String,
        name: String,
        source: Option<String>,
    ) -> Arc<File> {
        Arc::new(File {
            id,
            dir,
            name,
            kind: FileKind::Physical { source },
            breakpoints: Mutex::new(HashSet::new()),
        })
    }

    /// The full path: `dir/name` when the directory is non-empty, otherwise
    /// just the name. Paths always use forward slashes.
    pub fn path(&self) -> String {
        if self.dir.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.dir, self.name)
        }
    }

    /// True for files whose content is served by the server rather than
    /// fetched from disk.
    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, FileKind::Virtual { .. })
    }

    /// The in-memory content, if any.
    pub fn source(&self) -> Option<&str> {
        match &self.kind {
            FileKind::Virtual { source } => Some(source),
            FileKind::Physical { source } => source.as_deref(),
        }
    }

    /// Add a breakpoint on `line`. Idempotent.
    pub fn add_breakpoint(&self, line: i32) {
        self.breakpoints.lock().unwrap().insert(line);
    }

    /// Remove every breakpoint.
    pub fn clear_breakpoints(&self) {
        self.breakpoints.lock().unwrap().clear();
    }

    /// True if a breakpoint is set on `line`.
    pub fn has_breakpoint(&self, line: i32) -> bool {
        self.breakpoints.lock().unwrap().contains(&line)
    }
}

/// Split a path on its last forward slash into directory and name.
pub(crate) fn split_path(path: &str) -> (String, String) {
    match path.rfind('/') {
        Some(pos) => (path[..pos].to_string(), path[pos + 1..].to_string()),
        None => (String::new(), path.to_string()),
    }
}
