//! External collaborator interfaces.
//!
//! The automation binding to the external application and the client for
//! the remote object store are plumbing outside this crate; these traits
//! are the seams they plug into. Mock implementations are provided for
//! tests.

use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tabsync_core::{GraphObject, SharedObject};

/// Binding to the external tabular application.
pub trait TabularClient: Send + Sync {
    /// Reads every record line of a table.
    fn bulk_read(&self, keyword: &str) -> EngineResult<Vec<String>>;

    /// Executes a textual command, returning the raw response.
    fn execute(&self, command: &str) -> EngineResult<String>;

    /// Returns the highest index currently claimed in a table.
    fn highest_index(&self, keyword: &str) -> EngineResult<u32>;
}

/// Client for the remote object store.
pub trait GraphClient: Send + Sync {
    /// Pulls every object of a stream.
    fn pull(&self, stream_id: &str) -> EngineResult<Vec<SharedObject>>;

    /// Pushes converted objects to a stream.
    fn push(&self, stream_id: &str, objects: Vec<SharedObject>) -> EngineResult<()>;
}

/// A mock tabular binding for testing.
#[derive(Default)]
pub struct MockTabular {
    bulk: Mutex<HashMap<String, Vec<String>>>,
    highest: Mutex<HashMap<String, u32>>,
    executed: Mutex<Vec<String>>,
}

impl MockTabular {
    /// Creates an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lines a bulk read of `keyword` returns.
    pub fn set_bulk_read(&self, keyword: &str, lines: Vec<String>) {
        self.bulk.lock().insert(keyword.to_string(), lines);
    }

    /// Sets the highest claimed index for `keyword`.
    pub fn set_highest_index(&self, keyword: &str, index: u32) {
        self.highest.lock().insert(keyword.to_string(), index);
    }

    /// Returns every command executed so far, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

impl TabularClient for MockTabular {
    fn bulk_read(&self, keyword: &str) -> EngineResult<Vec<String>> {
        Ok(self.bulk.lock().get(keyword).cloned().unwrap_or_default())
    }

    fn execute(&self, command: &str) -> EngineResult<String> {
        self.executed.lock().push(command.to_string());
        Ok(String::new())
    }

    fn highest_index(&self, keyword: &str) -> EngineResult<u32> {
        Ok(self.highest.lock().get(keyword).copied().unwrap_or(0))
    }
}

/// A mock remote store for testing.
#[derive(Default)]
pub struct MockGraph {
    pulls: Mutex<HashMap<String, Vec<SharedObject>>>,
    pushed: Mutex<Vec<(String, Vec<SharedObject>)>>,
    fail_pull: Mutex<bool>,
}

impl MockGraph {
    /// Creates an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the objects a pull of `stream_id` returns.
    pub fn set_pull(&self, stream_id: &str, objects: Vec<SharedObject>) {
        self.pulls.lock().insert(stream_id.to_string(), objects);
    }

    /// Makes the next pull fail with a client error.
    pub fn fail_next_pull(&self) {
        *self.fail_pull.lock() = true;
    }

    /// Returns every push so far.
    #[must_use]
    pub fn pushed(&self) -> Vec<(String, Vec<SharedObject>)> {
        self.pushed.lock().clone()
    }
}

impl GraphClient for MockGraph {
    fn pull(&self, stream_id: &str) -> EngineResult<Vec<SharedObject>> {
        if std::mem::take(&mut *self.fail_pull.lock()) {
            return Err(EngineError::client("mock pull failure"));
        }
        Ok(self.pulls.lock().get(stream_id).cloned().unwrap_or_default())
    }

    fn push(&self, stream_id: &str, objects: Vec<SharedObject>) -> EngineResult<()> {
        self.pushed.lock().push((stream_id.to_string(), objects));
        Ok(())
    }
}

/// A plain graph object for tests: a type name, an identity, and an
/// opaque body.
#[derive(Debug, Clone)]
pub struct MockObject {
    type_name: String,
    application_id: Option<String>,
    /// The opaque object content converters read.
    pub body: String,
}

impl MockObject {
    /// Creates a shared mock object.
    #[must_use]
    pub fn new(type_name: &str, application_id: Option<&str>, body: &str) -> Arc<Self> {
        Arc::new(Self {
            type_name: type_name.to_string(),
            application_id: application_id.map(str::to_string),
            body: body.to_string(),
        })
    }
}

impl GraphObject for MockObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn application_id(&self) -> Option<&str> {
        self.application_id.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
