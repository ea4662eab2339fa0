//! Units of simulated work.

use crate::Worker;
use meshsim_host::Host;
use std::fmt;
use std::sync::Arc;

type TaskFn = dyn Fn(&Worker, &Arc<Host>) + Send + Sync;

/// A named, shareable callback executed against a host at a scheduled time.
///
/// Tasks are reference-counted: cloning a `Task` clones the handle, and the
/// closure (with everything it captures, e.g. a packet awaiting delivery)
/// is released when the last handle drops. Dropped scheduling paths release
/// their reference by ordinary scope exit.
#[derive(Clone)]
pub struct Task {
    name: &'static str,
    f: Arc<TaskFn>,
}

impl Task {
    pub fn new(name: &'static str, f: impl Fn(&Worker, &Arc<Host>) + Send + Sync + 'static) -> Self {
        Self { name, f: Arc::new(f) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the task against `host` with `worker` as the execution context.
    pub fn execute(&self, worker: &Worker, host: &Arc<Host>) {
        (self.f)(worker, host);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}
