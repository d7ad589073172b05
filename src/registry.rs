use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::model::CheckId;

/// A live periodic task for one check: the spawned timer loop plus the
/// channel used to stop it.
pub struct ScheduledTask {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl ScheduledTask {
    pub fn new(handle: JoinHandle<()>, shutdown: oneshot::Sender<()>) -> Self {
        ScheduledTask { handle, shutdown }
    }

    /// Stops the task without interrupting an in-flight probe. The task is
    /// only aborted outright if it already dropped its shutdown receiver.
    pub fn stop(self) {
        if self.shutdown.send(()).is_err() {
            self.handle.abort();
        }
    }
}

/// Registry of live tasks, keyed by check id. All concurrent access to the
/// backing map goes through this type; it holds at most one task per id.
pub struct TaskRegistry {
    tasks: Mutex<HashMap<CheckId, ScheduledTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        TaskRegistry {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts the task produced by `make_task` unless the id is already
    /// present. Returns false, without invoking `make_task`, when it is.
    pub fn insert_if_absent(&self, id: CheckId, make_task: impl FnOnce() -> ScheduledTask) -> bool {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.contains_key(&id) {
            return false;
        }
        tasks.insert(id, make_task());
        true
    }

    pub fn remove(&self, id: CheckId) -> Option<ScheduledTask> {
        self.tasks.lock().unwrap().remove(&id)
    }

    pub fn contains(&self, id: CheckId) -> bool {
        self.tasks.lock().unwrap().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Removes and returns every task. Used at process shutdown.
    pub fn drain(&self) -> Vec<(CheckId, ScheduledTask)> {
        self.tasks.lock().unwrap().drain().collect()
    }
}
