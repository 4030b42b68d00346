//! Block lists: ordered, reusable condition and action units.
//!
//! A [`BlockList`] holds [`Block`]s, each tagged with a level:
//!
//! - [`BlockList::execute`] runs every action in order. A failure stops the
//!   list and is tagged with the failing unit's index and name.
//! - [`BlockList::validate`] evaluates the conditions as a left-to-right
//!   disjunction of conjunctions. An `Or` marker starts a new conjunction.
//!   A rise in level opens as many nested groups as the level delta, a drop
//!   closes as many; levels `[0, 0, 1, 1, 0]` read `a && b && (c && d) && e`.
//!   Evaluation stops at the first failing condition of a conjunction and at
//!   the first conjunction that holds.
//! - [`BlockList::start`] runs the actions cooperatively through an
//!   [`ActionRun`]. Sequential runs start each action only after the
//!   previous one finished; parallel runs start all of them up front.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::error::{FaultOrigin, RuntimeError};
use crate::eval::expect_bool;
use crate::interpreter::Interpreter;
use crate::scheduler::{Cooperative, CoroutineRef, SharedCoroutine, TaskStatus};
use crate::value::{ObjectRef, Value};

/// A side-effecting unit.
pub trait Action<C>: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the action to completion.
    fn execute(&self, ctx: &mut C) -> Result<(), RuntimeError>;

    /// Starts the action cooperatively. Actions without a cooperative form
    /// run to completion here and return `None`.
    fn start(&self, ctx: &mut C) -> Result<Option<Box<dyn Cooperative>>, RuntimeError> {
        self.execute(ctx).map(|_| None)
    }
}

/// A boolean test.
pub trait Condition<C> {
    fn name(&self) -> &str;

    fn check(&self, ctx: &mut C) -> Result<bool, RuntimeError>;
}

/// One unit of a block list.
pub enum Block<C> {
    Action(Arc<dyn Action<C>>),
    Condition(Box<dyn Condition<C>>),
    /// Ends the current conjunction.
    Or,
}

impl<C> Block<C> {
    pub fn name(&self) -> &str {
        match self {
            Block::Action(action) => action.name(),
            Block::Condition(condition) => condition.name(),
            Block::Or => "OR",
        }
    }
}

/// How cooperative actions are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Await each action before starting the next.
    #[default]
    Sequential,
    /// Start all, then await all.
    Parallel,
}

struct Entry<C> {
    block: Block<C>,
    level: u32,
}

/// An ordered list of blocks.
pub struct BlockList<C> {
    entries: Vec<Entry<C>>,
    mode: ExecutionMode,
}

impl<C> Default for BlockList<C> {
    fn default() -> Self {
        BlockList::new(ExecutionMode::Sequential)
    }
}

impl<C> BlockList<C> {
    pub fn new(mode: ExecutionMode) -> Self {
        BlockList {
            entries: Vec::new(),
            mode,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, block: Block<C>, level: u32) {
        self.entries.push(Entry { block, level });
    }

    pub fn action(mut self, action: impl Action<C> + 'static) -> Self {
        self.push(Block::Action(Arc::new(action)), 0);
        self
    }

    pub fn condition(self, condition: impl Condition<C> + 'static) -> Self {
        self.condition_at(condition, 0)
    }

    pub fn condition_at(mut self, condition: impl Condition<C> + 'static, level: u32) -> Self {
        self.push(Block::Condition(Box::new(condition)), level);
        self
    }

    pub fn or(self) -> Self {
        self.or_at(0)
    }

    pub fn or_at(mut self, level: u32) -> Self {
        self.push(Block::Or, level);
        self
    }

    fn origin(&self, index: usize) -> FaultOrigin {
        FaultOrigin::Block {
            index,
            name: self.entries[index].block.name().to_string(),
        }
    }

    /// Runs every action in order.
    pub fn execute(&self, ctx: &mut C) -> Result<(), RuntimeError> {
        for (index, entry) in self.entries.iter().enumerate() {
            if let Block::Action(action) = &entry.block {
                action.execute(ctx).map_err(|e| e.at(self.origin(index)))?;
            }
        }
        Ok(())
    }

    /// Evaluates the conditions. A list without conditions holds.
    pub fn validate(&self, ctx: &mut C) -> Result<bool, RuntimeError> {
        let tokens: Vec<(Option<usize>, u32)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry.block {
                Block::Condition(_) => Some((Some(index), entry.level)),
                Block::Or => Some((None, entry.level)),
                Block::Action(_) => None,
            })
            .collect();
        let tree = group(&tokens);
        self.eval_group(&tree, ctx)
    }

    fn eval_group(&self, chains: &[Vec<Expr>], ctx: &mut C) -> Result<bool, RuntimeError> {
        let mut evaluated_any = false;
        for chain in chains.iter().filter(|chain| !chain.is_empty()) {
            evaluated_any = true;
            let mut holds = true;
            for expr in chain {
                if !self.eval_expr(expr, ctx)? {
                    holds = false;
                    break;
                }
            }
            if holds {
                return Ok(true);
            }
        }
        Ok(!evaluated_any)
    }

    fn eval_expr(&self, expr: &Expr, ctx: &mut C) -> Result<bool, RuntimeError> {
        match expr {
            Expr::Leaf(index) => match &self.entries[*index].block {
                Block::Condition(condition) => {
                    condition.check(ctx).map_err(|e| e.at(self.origin(*index)))
                }
                _ => Ok(true),
            },
            Expr::Group(chains) => self.eval_group(chains, ctx),
        }
    }

    /// Starts the actions cooperatively. The run owns `ctx` for as long as
    /// it has actions left to start.
    pub fn start(&self, mut ctx: C) -> Result<ActionRun<C>, RuntimeError> {
        let mut queued = VecDeque::new();
        let mut units = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let Block::Action(action) = &entry.block else {
                continue;
            };
            let origin = self.origin(index);
            match self.mode {
                ExecutionMode::Sequential => queued.push_back((origin, Arc::clone(action))),
                ExecutionMode::Parallel => {
                    if let Some(task) = action.start(&mut ctx).map_err(|e| e.at(origin.clone()))? {
                        units.push(Unit::new(origin, task));
                    }
                }
            }
        }
        debug!(
            queued = queued.len(),
            started = units.len(),
            mode = ?self.mode,
            "action list started"
        );
        Ok(ActionRun {
            ctx,
            queued,
            units,
            mode: self.mode,
            done: false,
            stopped: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// A parsed condition expression. A group is a disjunction of conjunctions.
#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Leaf(usize),
    Group(Vec<Vec<Expr>>),
}

/// Groups `(condition index or Or marker, level)` tokens.
fn group(tokens: &[(Option<usize>, u32)]) -> Vec<Vec<Expr>> {
    let mut pos = 0;
    parse_level(tokens, &mut pos, 0)
}

fn parse_level(tokens: &[(Option<usize>, u32)], pos: &mut usize, level: u32) -> Vec<Vec<Expr>> {
    let mut chains: Vec<Vec<Expr>> = vec![Vec::new()];
    while let Some(&(token, token_level)) = tokens.get(*pos) {
        if token_level < level {
            break;
        }
        if token_level > level {
            let inner = parse_level(tokens, pos, level + 1);
            if let Some(chain) = chains.last_mut() {
                chain.push(Expr::Group(inner));
            }
            continue;
        }
        match token {
            Some(index) => {
                if let Some(chain) = chains.last_mut() {
                    chain.push(Expr::Leaf(index));
                }
            }
            None => chains.push(Vec::new()),
        }
        *pos += 1;
    }
    chains
}

// ---------------------------------------------------------------------------
// Cooperative runs
// ---------------------------------------------------------------------------

struct Unit {
    origin: FaultOrigin,
    task: Box<dyn Cooperative>,
    skip: u32,
    finished: bool,
}

impl Unit {
    fn new(origin: FaultOrigin, task: Box<dyn Cooperative>) -> Self {
        Unit {
            origin,
            task,
            skip: 0,
            finished: false,
        }
    }

    /// Resumes the unit unless it is waiting. `None` while pending.
    fn poll(&mut self) -> Option<Result<(), RuntimeError>> {
        if self.finished {
            return Some(Ok(()));
        }
        if self.skip > 0 {
            self.skip -= 1;
            return None;
        }
        match self.task.resume() {
            TaskStatus::Pending { wait_ticks } => {
                self.skip = wait_ticks;
                None
            }
            TaskStatus::Done(result) => {
                self.finished = true;
                Some(result.map(|_| ()).map_err(|e| e.at(self.origin.clone())))
            }
        }
    }
}

/// A running cooperative action list.
pub struct ActionRun<C> {
    ctx: C,
    /// Actions not started yet, in sequential mode.
    queued: VecDeque<(FaultOrigin, Arc<dyn Action<C>>)>,
    units: Vec<Unit>,
    mode: ExecutionMode,
    done: bool,
    stopped: bool,
}

impl<C> ActionRun<C> {
    /// Number of actions that have not finished, started or not.
    pub fn pending_units(&self) -> usize {
        self.queued.len() + self.units.iter().filter(|u| !u.finished).count()
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    fn resume_sequential(&mut self) -> TaskStatus {
        loop {
            if let Some(unit) = self.units.last_mut().filter(|u| !u.finished) {
                match unit.poll() {
                    None => return TaskStatus::next_tick(),
                    Some(Ok(())) => {}
                    Some(Err(err)) => return self.fail(err),
                }
            }
            let Some((origin, action)) = self.queued.pop_front() else {
                break;
            };
            match action.start(&mut self.ctx) {
                Ok(Some(task)) => self.units.push(Unit::new(origin, task)),
                Ok(None) => {}
                Err(err) => return self.fail(err.at(origin)),
            }
        }
        self.done = true;
        TaskStatus::Done(Ok(Value::Null))
    }

    fn resume_parallel(&mut self) -> TaskStatus {
        let mut pending = false;
        let mut failure = None;
        for unit in self.units.iter_mut().filter(|u| !u.finished) {
            match unit.poll() {
                None => pending = true,
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if let Some(err) = failure {
            return self.fail(err);
        }
        if pending {
            return TaskStatus::next_tick();
        }
        self.done = true;
        TaskStatus::Done(Ok(Value::Null))
    }

    /// Stops the remaining units after one failed.
    fn fail(&mut self, err: RuntimeError) -> TaskStatus {
        self.stop_units();
        self.done = true;
        TaskStatus::Done(Err(err))
    }

    fn stop_units(&mut self) {
        self.queued.clear();
        for unit in self.units.iter_mut().filter(|u| !u.finished) {
            unit.task.on_stop();
            unit.finished = true;
        }
    }
}

impl<C: Send> Cooperative for ActionRun<C> {
    fn resume(&mut self) -> TaskStatus {
        if self.stopped {
            return TaskStatus::Done(Err(RuntimeError::Stopped));
        }
        if self.done {
            return TaskStatus::Done(Ok(Value::Null));
        }
        match self.mode {
            ExecutionMode::Sequential => self.resume_sequential(),
            ExecutionMode::Parallel => self.resume_parallel(),
        }
    }

    fn on_stop(&mut self) {
        if self.stopped || self.done {
            return;
        }
        self.stopped = true;
        debug!(pending = self.pending_units(), "action list stopped");
        self.stop_units();
    }
}

// ---------------------------------------------------------------------------
// Closure and graph-backed units
// ---------------------------------------------------------------------------

/// An action backed by a closure.
pub struct FnAction<F> {
    name: String,
    f: F,
}

impl<F> FnAction<F> {
    pub fn new(name: &str, f: F) -> Self {
        FnAction {
            name: name.to_string(),
            f,
        }
    }
}

impl<C, F> Action<C> for FnAction<F>
where
    F: Fn(&mut C) -> Result<(), RuntimeError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut C) -> Result<(), RuntimeError> {
        (self.f)(ctx)
    }
}

/// A condition backed by a closure.
pub struct FnCondition<F> {
    name: String,
    f: F,
}

impl<F> FnCondition<F> {
    pub fn new(name: &str, f: F) -> Self {
        FnCondition {
            name: name.to_string(),
            f,
        }
    }
}

impl<C, F> Condition<C> for FnCondition<F>
where
    F: Fn(&mut C) -> Result<bool, RuntimeError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, ctx: &mut C) -> Result<bool, RuntimeError> {
        (self.f)(ctx)
    }
}

/// Calls a function on a graph instance. Cooperative functions start as a
/// cooperative unit.
///
/// Executed synchronously, a cooperative function must finish within its
/// first resume; a body that suspends is stopped and reported as
/// [`RuntimeError::SuspendInSynchronousBody`].
pub struct GraphAction {
    name: String,
    target: ObjectRef,
    function: String,
    args: Vec<Value>,
}

impl GraphAction {
    pub fn new(target: ObjectRef, function: &str, args: Vec<Value>) -> Self {
        GraphAction {
            name: function.to_string(),
            target,
            function: function.to_string(),
            args,
        }
    }

    fn call(&self, interp: &Interpreter) -> Result<Value, RuntimeError> {
        interp.invoke_member(&Value::Object(self.target.clone()), &self.function, self.args.clone())
    }

    fn finish_now(&self, task: &CoroutineRef) -> Result<(), RuntimeError> {
        let mut task = task.lock();
        match task.resume() {
            TaskStatus::Done(result) => result.map(|_| ()),
            TaskStatus::Pending { .. } => {
                task.on_stop();
                Err(RuntimeError::SuspendInSynchronousBody {
                    function: self.function.clone(),
                })
            }
        }
    }
}

impl Action<Interpreter> for GraphAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut Interpreter) -> Result<(), RuntimeError> {
        match self.call(ctx)? {
            Value::Coroutine(task) => self.finish_now(&task),
            _ => Ok(()),
        }
    }

    fn start(&self, ctx: &mut Interpreter) -> Result<Option<Box<dyn Cooperative>>, RuntimeError> {
        match self.call(ctx)? {
            Value::Coroutine(task) => Ok(Some(Box::new(SharedCoroutine(task)))),
            _ => Ok(None),
        }
    }
}

/// Tests a boolean function of a graph instance.
pub struct GraphCondition {
    name: String,
    target: ObjectRef,
    function: String,
    args: Vec<Value>,
}

impl GraphCondition {
    pub fn new(target: ObjectRef, function: &str, args: Vec<Value>) -> Self {
        GraphCondition {
            name: function.to_string(),
            target,
            function: function.to_string(),
            args,
        }
    }
}

impl Condition<Interpreter> for GraphCondition {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, ctx: &mut Interpreter) -> Result<bool, RuntimeError> {
        let value = ctx.invoke_member(
            &Value::Object(self.target.clone()),
            &self.function,
            self.args.clone(),
        )?;
        expect_bool(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Evaluation context recording which conditions ran.
    #[derive(Default)]
    struct Log {
        checked: Vec<String>,
        ran: Vec<String>,
    }

    fn cond(name: &str, value: bool) -> FnCondition<impl Fn(&mut Log) -> Result<bool, RuntimeError>> {
        let label = name.to_string();
        FnCondition::new(name, move |log: &mut Log| -> Result<bool, RuntimeError> {
            log.checked.push(label.clone());
            Ok(value)
        })
    }

    fn act(name: &str) -> FnAction<impl Fn(&mut Log) -> Result<(), RuntimeError>> {
        let label = name.to_string();
        FnAction::new(name, move |log: &mut Log| -> Result<(), RuntimeError> {
            log.ran.push(label.clone());
            Ok(())
        })
    }

    #[test]
    fn first_chain_short_circuits_disjunction() {
        let list = BlockList::default()
            .condition(cond("a", true))
            .or()
            .condition(cond("b", false))
            .condition(cond("c", true));
        let mut log = Log::default();
        assert!(list.validate(&mut log).unwrap());
        assert_eq!(log.checked, vec!["a"]);
    }

    #[test]
    fn failing_condition_short_circuits_conjunction() {
        let list = BlockList::default()
            .condition(cond("a", false))
            .condition(cond("b", true))
            .or()
            .condition(cond("c", true));
        let mut log = Log::default();
        assert!(list.validate(&mut log).unwrap());
        assert_eq!(log.checked, vec!["a", "c"]);
    }

    #[test]
    fn nested_levels_group_conditions() {
        // true && (false && true) && true
        let list = BlockList::default()
            .condition_at(cond("a", true), 0)
            .condition_at(cond("b", false), 1)
            .condition_at(cond("c", true), 1)
            .condition_at(cond("d", true), 0);
        let mut log = Log::default();
        assert!(!list.validate(&mut log).unwrap());
        assert_eq!(log.checked, vec!["a", "b"]);
    }

    #[test]
    fn or_inside_a_group_stays_in_the_group() {
        // a && (b || c) && d
        let list = BlockList::default()
            .condition_at(cond("a", true), 0)
            .condition_at(cond("b", false), 1)
            .or_at(1)
            .condition_at(cond("c", true), 1)
            .condition_at(cond("d", true), 0);
        let mut log = Log::default();
        assert!(list.validate(&mut log).unwrap());
        assert_eq!(log.checked, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn level_delta_opens_that_many_groups() {
        let tokens = [(Some(0), 0), (Some(1), 2), (Some(2), 0)];
        let tree = group(&tokens);
        assert_eq!(
            tree,
            vec![vec![
                Expr::Leaf(0),
                Expr::Group(vec![vec![Expr::Group(vec![vec![Expr::Leaf(1)]])]]),
                Expr::Leaf(2),
            ]]
        );
    }

    #[test]
    fn empty_list_and_empty_chains_hold() {
        let mut log = Log::default();
        assert!(BlockList::<Log>::default().validate(&mut log).unwrap());

        let list = BlockList::default().or().condition(cond("a", false)).or();
        assert!(!list.validate(&mut log).unwrap());
    }

    #[test]
    fn execute_runs_actions_in_order_and_skips_conditions() {
        let list = BlockList::default()
            .action(act("first"))
            .condition(cond("ignored", false))
            .action(act("second"));
        let mut log = Log::default();
        list.execute(&mut log).unwrap();
        assert_eq!(log.ran, vec!["first", "second"]);
        assert!(log.checked.is_empty());
    }

    #[test]
    fn execute_tags_failures_with_unit_identity() {
        let list = BlockList::default()
            .action(act("first"))
            .action(FnAction::new("explode", |_: &mut Log| -> Result<(), RuntimeError> {
                Err(RuntimeError::DivideByZero)
            }))
            .action(act("never"));
        let mut log = Log::default();
        let err = list.execute(&mut log).unwrap_err();
        assert_eq!(
            err.trace(),
            vec![&FaultOrigin::Block {
                index: 1,
                name: "explode".into()
            }]
        );
        assert!(matches!(err.root_cause(), RuntimeError::DivideByZero));
        assert_eq!(log.ran, vec!["first"]);
    }

    // -- cooperative --------------------------------------------------------

    /// Finishes after `ticks` pending resumes; counts resumes and stops.
    struct Ticker {
        ticks: u32,
        resumes: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    impl Cooperative for Ticker {
        fn resume(&mut self) -> TaskStatus {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            if self.ticks == 0 {
                return TaskStatus::Done(Ok(Value::Null));
            }
            self.ticks -= 1;
            TaskStatus::next_tick()
        }

        fn on_stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct TickerAction {
        name: String,
        ticks: u32,
        resumes: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    impl TickerAction {
        fn new(name: &str, ticks: u32) -> Self {
            TickerAction {
                name: name.to_string(),
                ticks,
                resumes: Arc::new(AtomicUsize::new(0)),
                stops: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
            (Arc::clone(&self.resumes), Arc::clone(&self.stops))
        }
    }

    impl Action<Log> for TickerAction {
        fn name(&self) -> &str {
            &self.name
        }

        fn execute(&self, _: &mut Log) -> Result<(), RuntimeError> {
            Ok(())
        }

        fn start(&self, _: &mut Log) -> Result<Option<Box<dyn Cooperative>>, RuntimeError> {
            Ok(Some(Box::new(Ticker {
                ticks: self.ticks,
                resumes: Arc::clone(&self.resumes),
                stops: Arc::clone(&self.stops),
            })))
        }
    }

    #[test]
    fn sequential_run_awaits_each_unit() {
        let first = TickerAction::new("first", 1);
        let second = TickerAction::new("second", 0);
        let (first_resumes, _) = first.counters();
        let (second_resumes, _) = second.counters();
        let list = BlockList::new(ExecutionMode::Sequential)
            .action(first)
            .action(second);

        let mut run = list.start(Log::default()).unwrap();
        assert_eq!(run.pending_units(), 2);
        assert!(matches!(run.resume(), TaskStatus::Pending { .. }));
        assert_eq!(second_resumes.load(Ordering::SeqCst), 0);
        assert!(matches!(run.resume(), TaskStatus::Done(Ok(_))));
        assert_eq!(first_resumes.load(Ordering::SeqCst), 2);
        assert_eq!(second_resumes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn parallel_run_starts_all_then_awaits_all() {
        let short = TickerAction::new("short", 0);
        let long = TickerAction::new("long", 2);
        let (long_resumes, _) = long.counters();
        let list = BlockList::new(ExecutionMode::Parallel).action(short).action(long);

        let mut run = list.start(Log::default()).unwrap();
        assert!(matches!(run.resume(), TaskStatus::Pending { .. }));
        assert_eq!(run.pending_units(), 1);
        assert!(matches!(run.resume(), TaskStatus::Pending { .. }));
        assert!(matches!(run.resume(), TaskStatus::Done(Ok(_))));
        assert_eq!(long_resumes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn stopping_parallel_run_stops_each_unfinished_unit_once() {
        let done = TickerAction::new("done", 0);
        let slow = TickerAction::new("slow", 5);
        let slower = TickerAction::new("slower", 9);
        let (_, done_stops) = done.counters();
        let (slow_resumes, slow_stops) = slow.counters();
        let (_, slower_stops) = slower.counters();
        let list = BlockList::new(ExecutionMode::Parallel)
            .action(done)
            .action(slow)
            .action(slower);

        let mut run = list.start(Log::default()).unwrap();
        run.resume();
        run.on_stop();
        run.on_stop();

        assert_eq!(done_stops.load(Ordering::SeqCst), 0);
        assert_eq!(slow_stops.load(Ordering::SeqCst), 1);
        assert_eq!(slower_stops.load(Ordering::SeqCst), 1);

        assert!(matches!(run.resume(), TaskStatus::Done(Err(RuntimeError::Stopped))));
        assert_eq!(slow_resumes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sequential_run_starts_synchronous_action_after_previous_finishes() {
        let wait = TickerAction::new("wait", 1);
        let list = BlockList::new(ExecutionMode::Sequential)
            .action(act("before"))
            .action(wait)
            .action(act("after"));

        let mut run = list.start(Log::default()).unwrap();
        assert!(run.context().ran.is_empty());
        assert!(matches!(run.resume(), TaskStatus::Pending { .. }));
        assert_eq!(run.context().ran, vec!["before"]);
        assert!(matches!(run.resume(), TaskStatus::Done(Ok(_))));
        assert_eq!(run.context().ran, vec!["before", "after"]);
    }

    #[test]
    fn parallel_run_starts_every_action_up_front() {
        let list = BlockList::new(ExecutionMode::Parallel)
            .action(TickerAction::new("wait", 1))
            .action(act("sync"));
        let run = list.start(Log::default()).unwrap();
        assert_eq!(run.context().ran, vec!["sync"]);
        assert_eq!(run.pending_units(), 1);
    }

    #[test]
    fn stopping_sequential_run_never_starts_queued_actions() {
        let first = TickerAction::new("first", 3);
        let second = TickerAction::new("second", 0);
        let (_, first_stops) = first.counters();
        let (second_resumes, second_stops) = second.counters();
        let list = BlockList::new(ExecutionMode::Sequential)
            .action(first)
            .action(second)
            .action(act("never"));

        let mut run = list.start(Log::default()).unwrap();
        run.resume();
        run.on_stop();

        assert_eq!(first_stops.load(Ordering::SeqCst), 1);
        assert_eq!(second_stops.load(Ordering::SeqCst), 0);
        assert_eq!(second_resumes.load(Ordering::SeqCst), 0);
        assert_eq!(run.pending_units(), 0);
        assert!(matches!(run.resume(), TaskStatus::Done(Err(RuntimeError::Stopped))));
        assert!(run.context().ran.is_empty());
    }

    #[test]
    fn sequential_start_failure_is_tagged_with_unit_identity() {
        let list = BlockList::new(ExecutionMode::Sequential)
            .action(act("first"))
            .action(FnAction::new("explode", |_: &mut Log| -> Result<(), RuntimeError> {
                Err(RuntimeError::DivideByZero)
            }))
            .action(act("never"));

        let mut run = list.start(Log::default()).unwrap();
        let TaskStatus::Done(Err(err)) = run.resume() else {
            panic!("expected the run to fail");
        };
        assert_eq!(
            err.trace(),
            vec![&FaultOrigin::Block {
                index: 1,
                name: "explode".into()
            }]
        );
        assert_eq!(run.context().ran, vec!["first"]);
    }

    // -- grouping against a reference evaluation ----------------------------

    /// Builds the parenthesized infix form of a condition list.
    fn infix(parts: &[(bool, u32, bool)]) -> String {
        let mut out = String::new();
        let mut current = 0u32;
        for (i, &(value, level, or_before)) in parts.iter().enumerate() {
            if i == 0 {
                out.push_str(&"(".repeat(level as usize));
            } else if level > current {
                out.push('&');
                out.push_str(&"(".repeat((level - current) as usize));
            } else {
                out.push_str(&")".repeat((current - level) as usize));
                out.push(if or_before { '|' } else { '&' });
            }
            out.push(if value { 'T' } else { 'F' });
            current = level;
        }
        out.push_str(&")".repeat(current as usize));
        out
    }

    fn eval_infix(expr: &[u8], pos: &mut usize) -> bool {
        let mut result = eval_term(expr, pos);
        while expr.get(*pos) == Some(&b'|') {
            *pos += 1;
            let rhs = eval_term(expr, pos);
            result = result || rhs;
        }
        result
    }

    fn eval_term(expr: &[u8], pos: &mut usize) -> bool {
        let mut result = eval_factor(expr, pos);
        while expr.get(*pos) == Some(&b'&') {
            *pos += 1;
            let rhs = eval_factor(expr, pos);
            result = result && rhs;
        }
        result
    }

    fn eval_factor(expr: &[u8], pos: &mut usize) -> bool {
        let c = expr[*pos];
        *pos += 1;
        match c {
            b'T' => true,
            b'F' => false,
            _ => {
                let inner = eval_infix(expr, pos);
                *pos += 1; // ')'
                inner
            }
        }
    }

    proptest! {
        #[test]
        fn validate_matches_parenthesized_reference(
            parts in prop::collection::vec((any::<bool>(), 0u32..3, any::<bool>()), 1..12)
        ) {
            let mut list = BlockList::<Log>::default();
            let mut previous = None;
            for &(value, level, or_before) in &parts {
                if let Some(prev) = previous {
                    if or_before && level <= prev {
                        list.push(Block::Or, level);
                    }
                }
                list.push(Block::Condition(Box::new(cond("c", value))), level);
                previous = Some(level);
            }

            // Or markers are only emitted where the reference places `|`.
            let normalized: Vec<(bool, u32, bool)> = parts
                .iter()
                .enumerate()
                .map(|(i, &(value, level, or_before))| {
                    let or = i > 0 && or_before && level <= parts[i - 1].1;
                    (value, level, or)
                })
                .collect();
            let expr = infix(&normalized);
            let expected = eval_infix(expr.as_bytes(), &mut 0);

            let mut log = Log::default();
            prop_assert_eq!(list.validate(&mut log).unwrap(), expected, "expr: {}", expr);
        }
    }
}
