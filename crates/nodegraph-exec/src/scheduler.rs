//! Cooperative execution driven by the host's per-tick scheduler.
//!
//! A [`Cooperative`] unit runs until it reaches a suspend point and reports
//! [`TaskStatus::Pending`]; the [`Scheduler`] resumes it on a later tick.
//! Nothing here blocks or spawns threads. Stopping a task calls its
//! [`Cooperative::on_stop`] hook once and the task is never resumed again.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RuntimeError;
use crate::flow::{Activation, ActivationState, Suspension};
use crate::value::Value;

/// What a cooperative unit reports after being resumed.
#[derive(Debug)]
pub enum TaskStatus {
    /// Suspended; resume after skipping `wait_ticks` further ticks.
    Pending { wait_ticks: u32 },
    /// Finished, with the unit's result.
    Done(Result<Value, RuntimeError>),
}

impl TaskStatus {
    /// Resume again on the next tick.
    pub fn next_tick() -> Self {
        TaskStatus::Pending { wait_ticks: 0 }
    }
}

/// A resumable unit of cooperative work.
pub trait Cooperative: Send {
    /// Runs until the next suspend point or completion.
    fn resume(&mut self) -> TaskStatus;

    /// Called once when the unit is stopped before finishing.
    fn on_stop(&mut self) {}
}

/// Shared handle to a cooperative unit, the payload of
/// [`Value::Coroutine`].
pub type CoroutineRef = Arc<Mutex<Box<dyn Cooperative>>>;

pub fn coroutine(unit: impl Cooperative + 'static) -> CoroutineRef {
    Arc::new(Mutex::new(Box::new(unit)))
}

/// Number of ticks to skip for a `Wait`/`Yield` of `ticks` ticks.
fn skip_for(ticks: u32) -> u32 {
    ticks.saturating_sub(1)
}

// ---------------------------------------------------------------------------
// GraphCoroutine
// ---------------------------------------------------------------------------

/// A cooperative graph body.
///
/// Suspension rules: `Wait(n)` and `Yield(Int(n))` resume after `n` ticks,
/// `Yield` of another coroutine resumes once that coroutine finished (driving
/// it in the meantime), any other `Yield` resumes on the next tick.
pub struct GraphCoroutine {
    activation: Activation,
    waiting_on: Option<CoroutineRef>,
    finished: bool,
    stopped: bool,
}

impl GraphCoroutine {
    pub fn new(activation: Activation) -> Self {
        GraphCoroutine {
            activation,
            waiting_on: None,
            finished: false,
            stopped: false,
        }
    }

    pub fn activation(&self) -> &Activation {
        &self.activation
    }

    fn finish(&mut self, result: Result<Value, RuntimeError>) -> TaskStatus {
        self.finished = true;
        TaskStatus::Done(result)
    }
}

impl Cooperative for GraphCoroutine {
    fn resume(&mut self) -> TaskStatus {
        if self.stopped {
            return TaskStatus::Done(Err(RuntimeError::Stopped));
        }
        if self.finished {
            return TaskStatus::Done(Ok(Value::Null));
        }

        loop {
            if let Some(nested) = self.waiting_on.clone() {
                match nested.lock().resume() {
                    TaskStatus::Pending { wait_ticks } => return TaskStatus::Pending { wait_ticks },
                    TaskStatus::Done(Err(err)) => return self.finish(Err(err)),
                    TaskStatus::Done(Ok(_)) => self.waiting_on = None,
                }
            }

            match self.activation.state() {
                ActivationState::Ready => self.activation.start(),
                ActivationState::Suspended(_) => self.activation.resume(),
                _ => {}
            }
            self.activation.run();

            match self.activation.state() {
                ActivationState::Suspended(Suspension::Ticks(ticks)) => {
                    return TaskStatus::Pending {
                        wait_ticks: skip_for(*ticks),
                    }
                }
                ActivationState::Suspended(Suspension::Yield(value)) => match value {
                    Value::Coroutine(nested) => {
                        debug!(function = %self.activation.function_name(), "waiting on nested coroutine");
                        self.waiting_on = Some(Arc::clone(nested));
                    }
                    Value::Int(ticks) if *ticks > 0 => {
                        return TaskStatus::Pending {
                            wait_ticks: skip_for(u32::try_from(*ticks).unwrap_or(u32::MAX)),
                        }
                    }
                    _ => return TaskStatus::next_tick(),
                },
                _ => {
                    let result = self.activation.take_result();
                    return self.finish(result);
                }
            }
        }
    }

    fn on_stop(&mut self) {
        if self.stopped || self.finished {
            return;
        }
        self.stopped = true;
        if let Some(nested) = self.waiting_on.take() {
            nested.lock().on_stop();
        }
        self.activation.stop();
        debug!(function = %self.activation.function_name(), "coroutine stopped");
    }
}

/// Drives a shared coroutine handle as an owned unit.
pub struct SharedCoroutine(pub CoroutineRef);

impl Cooperative for SharedCoroutine {
    fn resume(&mut self) -> TaskStatus {
        self.0.lock().resume()
    }

    fn on_stop(&mut self) {
        self.0.lock().on_stop();
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Identifier of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

struct Slot {
    task: CoroutineRef,
    skip: u32,
}

/// Per-tick driver for cooperative tasks.
///
/// Tasks are resumed in start order, at most once per tick.
#[derive(Default)]
pub struct Scheduler {
    next_id: u64,
    tick: u64,
    running: IndexMap<TaskId, Slot>,
    results: IndexMap<TaskId, Result<Value, RuntimeError>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a task; it first runs on the next [`tick`](Self::tick).
    pub fn start(&mut self, task: CoroutineRef) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.running.insert(id, Slot { task, skip: 0 });
        debug!(task = id.0, "task started");
        id
    }

    /// Schedules an owned cooperative unit.
    pub fn start_unit(&mut self, unit: impl Cooperative + 'static) -> TaskId {
        self.start(coroutine(unit))
    }

    /// Schedules the coroutine behind a value returned by a cooperative body.
    pub fn start_value(&mut self, value: Value) -> Result<TaskId, RuntimeError> {
        match value {
            Value::Coroutine(task) => Ok(self.start(task)),
            other => Err(RuntimeError::TypeMismatch {
                expected: "coroutine".to_string(),
                got: other.type_name(),
            }),
        }
    }

    /// Advances every running task by one tick. Returns the tasks that
    /// finished during this tick.
    pub fn tick(&mut self) -> Vec<TaskId> {
        self.tick += 1;
        let mut finished = Vec::new();
        let ids: Vec<TaskId> = self.running.keys().copied().collect();

        for id in ids {
            let Some(slot) = self.running.get_mut(&id) else {
                continue;
            };
            if slot.skip > 0 {
                slot.skip -= 1;
                continue;
            }
            let status = slot.task.lock().resume();
            match status {
                TaskStatus::Pending { wait_ticks } => slot.skip = wait_ticks,
                TaskStatus::Done(result) => {
                    self.running.shift_remove(&id);
                    debug!(task = id.0, ok = result.is_ok(), "task finished");
                    self.results.insert(id, result);
                    finished.push(id);
                }
            }
        }
        finished
    }

    /// Stops a running task, invoking its on-stop hook once. Returns `false`
    /// if the task already finished or was never started.
    pub fn stop(&mut self, id: TaskId) -> bool {
        let Some(slot) = self.running.shift_remove(&id) else {
            return false;
        };
        slot.task.lock().on_stop();
        self.results.insert(id, Err(RuntimeError::Stopped));
        debug!(task = id.0, "task stopped");
        true
    }

    /// Stops every running task.
    pub fn stop_all(&mut self) {
        let ids: Vec<TaskId> = self.running.keys().copied().collect();
        for id in ids {
            self.stop(id);
        }
    }

    pub fn is_running(&self, id: TaskId) -> bool {
        self.running.contains_key(&id)
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Ticks elapsed since creation.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Takes the result of a finished or stopped task.
    pub fn take_result(&mut self, id: TaskId) -> Option<Result<Value, RuntimeError>> {
        self.results.shift_remove(&id)
    }

    /// Ticks until no task is running or `max_ticks` elapsed. Returns the
    /// number of ticks run.
    pub fn run_until_idle(&mut self, max_ticks: u64) -> u64 {
        let mut ran = 0;
        while !self.running.is_empty() && ran < max_ticks {
            self.tick();
            ran += 1;
        }
        ran
    }
}
