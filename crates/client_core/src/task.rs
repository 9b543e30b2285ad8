//! Command tasks: one remote operation each, optionally followed by a chain of
//! dependent tasks that run strictly after their parent resolves.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::Serialize;
use shared::{
    domain::{ActivityId, CommandId, MediaAction, NavAction, PowerAction, StatusQuery},
    error::ClickerError,
    protocol::{Method, Value},
};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{call_method, is_configured, Device, Reconciler, RemoteCall};

const EVENT_CAPACITY: usize = 64;

pub type TaskOutcome = Result<Value, ClickerError>;

/// The closed set of operations a presentation layer can request.
#[derive(Debug, Clone)]
pub enum Command {
    PressButton {
        device: Arc<Device>,
        button: CommandId,
    },
    SelectInput {
        device: Arc<Device>,
        input: String,
    },
    GetStatus {
        device: Arc<Device>,
        query: StatusQuery,
    },
    StartActivity {
        activity: ActivityId,
    },
    PowerOff,
}

impl Command {
    pub fn press(device: Arc<Device>, button: impl Into<CommandId>) -> Self {
        Command::PressButton {
            device,
            button: button.into(),
        }
    }

    pub fn power(device: Arc<Device>, on: bool) -> Self {
        Self::press(device, PowerAction::from_switch(on).command_id())
    }

    pub fn media(device: Arc<Device>, action: MediaAction) -> Self {
        Self::press(device, action.command_id())
    }

    pub fn navigate(device: Arc<Device>, action: NavAction) -> Self {
        Self::press(device, action.command_id())
    }

    pub fn select_input(device: Arc<Device>, input: impl Into<String>) -> Self {
        Command::SelectInput {
            device,
            input: input.into(),
        }
    }

    pub fn status(device: Arc<Device>, query: StatusQuery) -> Self {
        Command::GetStatus { device, query }
    }

    pub fn start_activity(activity: impl Into<ActivityId>) -> Self {
        Command::StartActivity {
            activity: activity.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::PressButton { .. } => "press_button",
            Command::SelectInput { .. } => "select_input",
            Command::GetStatus { .. } => "get_status",
            Command::StartActivity { .. } => "start_activity",
            Command::PowerOff => "power_off",
        }
    }

    pub fn device(&self) -> Option<&Arc<Device>> {
        match self {
            Command::PressButton { device, .. }
            | Command::SelectInput { device, .. }
            | Command::GetStatus { device, .. } => Some(device),
            Command::StartActivity { .. } | Command::PowerOff => None,
        }
    }

    /// Status results are normalised: power becomes a boolean, input becomes text,
    /// and a status the device does not advertise yields `Nil` without a call.
    pub(crate) async fn execute(&self, reconciler: &Reconciler) -> TaskOutcome {
        if !is_configured(reconciler.remote()) {
            return Err(ClickerError::config_missing());
        }
        match self {
            Command::PressButton { device, button } => reconciler.press(device, button).await,
            Command::SelectInput { device, input } => reconciler
                .select_input(device, input)
                .await
                .map(|selection| Value::Bool(selection.switched())),
            Command::GetStatus { device, query } => {
                let Some(value) = reconciler.query_status(device, query).await? else {
                    return Ok(Value::Nil);
                };
                Ok(match query {
                    StatusQuery::Power => {
                        Value::Bool(value.to_string() == PowerAction::On.command_id())
                    }
                    StatusQuery::Input => Value::String(value.to_string()),
                    StatusQuery::Named(_) => value,
                })
            }
            Command::StartActivity { activity } => {
                info!(activity = %activity, "starting activity");
                call_method(
                    reconciler.remote(),
                    Method::ActivityStart,
                    vec![Value::from(activity.as_str())],
                )
                .await
            }
            Command::PowerOff => {
                info!("powering everything off");
                call_method(reconciler.remote(), Method::PowerOff, Vec::new()).await
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PressButton { device, button } => {
                write!(f, "press {}:{button}", device.name())
            }
            Command::SelectInput { device, input } => {
                write!(f, "select_input {}:{input}", device.name())
            }
            Command::GetStatus { device, query } => write!(f, "status {}:{query}", device.name()),
            Command::StartActivity { activity } => write!(f, "start_activity {activity}"),
            Command::PowerOff => f.write_str("power_off"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "result", rename_all = "snake_case")]
pub enum TaskState {
    Idle,
    Running,
    Succeeded(Value),
    Failed(ClickerError),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded(_) | TaskState::Failed(_))
    }

    pub fn outcome(&self) -> Option<TaskOutcome> {
        match self {
            TaskState::Succeeded(value) => Some(Ok(value.clone())),
            TaskState::Failed(err) => Some(Err(err.clone())),
            TaskState::Idle | TaskState::Running => None,
        }
    }
}

impl From<TaskOutcome> for TaskState {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            Ok(value) => TaskState::Succeeded(value),
            Err(err) => TaskState::Failed(err),
        }
    }
}

/// When a chained task runs relative to the outcome of the task before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChainPolicy {
    #[default]
    Always,
    /// Skipped links resolve as cancelled without touching the server.
    OnSuccess,
}

/// A command plus the tasks chained after it.
#[derive(Debug, Clone)]
pub struct CommandTask {
    command: Command,
    policy: ChainPolicy,
    chained: Option<Box<CommandTask>>,
}

impl CommandTask {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            policy: ChainPolicy::Always,
            chained: None,
        }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn chained(&self) -> Option<&CommandTask> {
        self.chained.as_deref()
    }

    /// Appends `next` at the end of the chain; it runs whatever the previous link's outcome.
    pub fn then(self, next: CommandTask) -> Self {
        self.append(next, ChainPolicy::Always)
    }

    /// Appends `next` at the end of the chain; it runs only if the previous link succeeded.
    pub fn then_if_ok(self, next: CommandTask) -> Self {
        self.append(next, ChainPolicy::OnSuccess)
    }

    pub fn len(&self) -> usize {
        1 + self.chained.as_ref().map_or(0, |next| next.len())
    }

    fn append(mut self, mut next: CommandTask, policy: ChainPolicy) -> Self {
        next.policy = policy;
        self.push_tail(next);
        self
    }

    fn push_tail(&mut self, next: CommandTask) {
        if let Some(child) = self.chained.as_mut() {
            child.push_tail(next);
        } else {
            self.chained = Some(Box::new(next));
        }
    }
}

impl From<Command> for CommandTask {
    fn from(command: Command) -> Self {
        Self::new(command)
    }
}

/// Lifecycle notifications for every task the engine runs.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    Started {
        id: TaskId,
        command: Command,
    },
    Resolved {
        id: TaskId,
        command: Command,
        outcome: TaskOutcome,
    },
}

impl TaskEvent {
    pub fn id(&self) -> TaskId {
        match self {
            TaskEvent::Started { id, .. } | TaskEvent::Resolved { id, .. } => *id,
        }
    }
}

/// Observes one task and, through `chained`, the tasks after it.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    state: watch::Receiver<TaskState>,
    chained: Option<Box<TaskHandle>>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    pub fn chained(&self) -> Option<&TaskHandle> {
        self.chained.as_deref()
    }

    /// Waits for this task (not its chain) to resolve.
    pub async fn wait(&mut self) -> TaskOutcome {
        let outcome = match self.state.wait_for(TaskState::is_terminal).await {
            Ok(state) => state.outcome(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            Err(ClickerError::cancelled(format!(
                "{} was dropped before it resolved",
                self.id
            )))
        })
    }

    /// Waits for every link in order and returns their outcomes.
    pub async fn wait_chain(self) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::new();
        let mut next = Some(self);
        while let Some(mut handle) = next {
            outcomes.push(handle.wait().await);
            next = handle.chained.take().map(|handle| *handle);
        }
        outcomes
    }
}

struct PreparedTask {
    id: TaskId,
    command: Command,
    policy: ChainPolicy,
    state: watch::Sender<TaskState>,
    chained: Option<Box<PreparedTask>>,
}

/// Runs submitted tasks concurrently. There is no global queue: every submission is
/// its own tokio task, and a chain runs its links one after the other inside it.
#[derive(Clone)]
pub struct TaskEngine {
    reconciler: Reconciler,
    events: broadcast::Sender<TaskEvent>,
    deadline: Option<Duration>,
    shutdown: CancellationToken,
    next_id: Arc<AtomicU64>,
}

impl TaskEngine {
    pub fn new(remote: Arc<dyn RemoteCall>) -> Self {
        Self::with_reconciler(Reconciler::new(remote))
    }

    pub fn with_reconciler(reconciler: Reconciler) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            reconciler,
            events,
            deadline: None,
            shutdown: CancellationToken::new(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Every link still running after `deadline` resolves as cancelled.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// A token that cancels only the tasks submitted with it. Engine shutdown
    /// cancels it as well.
    pub fn cancel_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub fn dispatch(&self, command: Command) -> TaskHandle {
        self.submit(CommandTask::new(command))
    }

    pub fn submit(&self, task: CommandTask) -> TaskHandle {
        self.submit_with_cancel(task, self.cancel_token())
    }

    pub fn submit_with_cancel(&self, task: CommandTask, cancel: CancellationToken) -> TaskHandle {
        let (prepared, handle) = self.prepare(task);
        debug!(task_id = %handle.id, links = prepared_len(&prepared), "task submitted");
        tokio::spawn(self.clone().run(prepared, cancel));
        handle
    }

    /// Cancels every in-flight and pending task. Later submissions resolve as cancelled.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("task engine shutting down");
        }
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn prepare(&self, task: CommandTask) -> (PreparedTask, TaskHandle) {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (state_tx, state_rx) = watch::channel(TaskState::Idle);
        let (chained, chained_handle) = match task.chained {
            Some(next) => {
                let (prepared, handle) = self.prepare(*next);
                (Some(Box::new(prepared)), Some(Box::new(handle)))
            }
            None => (None, None),
        };
        (
            PreparedTask {
                id,
                command: task.command,
                policy: task.policy,
                state: state_tx,
                chained,
            },
            TaskHandle {
                id,
                state: state_rx,
                chained: chained_handle,
            },
        )
    }

    async fn run(self, root: PreparedTask, cancel: CancellationToken) {
        let mut node = root;
        let mut previous_ok = true;
        loop {
            let outcome = if node.policy == ChainPolicy::OnSuccess && !previous_ok {
                debug!(task_id = %node.id, command = %node.command, "skipping chained task");
                Err(ClickerError::cancelled("skipped because the previous task failed"))
            } else {
                self.execute(&node, &cancel).await
            };
            previous_ok = outcome.is_ok();
            self.resolve(&node, outcome);

            match node.chained.take() {
                Some(next) => node = *next,
                None => break,
            }
        }
    }

    async fn execute(&self, node: &PreparedTask, cancel: &CancellationToken) -> TaskOutcome {
        node.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = TaskState::Running;
            true
        });
        info!(
            task_id = %node.id,
            command = %node.command,
            device = node.command.device().map(|device| device.name().as_str()),
            "task started"
        );
        let _ = self.events.send(TaskEvent::Started {
            id: node.id,
            command: node.command.clone(),
        });

        let work = async {
            match self.deadline {
                Some(deadline) => {
                    tokio::time::timeout(deadline, node.command.execute(&self.reconciler))
                        .await
                        .unwrap_or_else(|_| {
                            Err(ClickerError::cancelled(format!(
                                "deadline of {deadline:?} elapsed"
                            )))
                        })
                }
                None => node.command.execute(&self.reconciler).await,
            }
        };

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(ClickerError::cancelled("task engine shut down")),
            _ = cancel.cancelled() => Err(ClickerError::cancelled("task cancelled")),
            outcome = work => outcome,
        }
    }

    fn resolve(&self, node: &PreparedTask, outcome: TaskOutcome) {
        let next = TaskState::from(outcome.clone());
        let resolved = node.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = next;
            true
        });
        if !resolved {
            return;
        }

        match &outcome {
            Ok(value) => info!(
                task_id = %node.id,
                command = %node.command,
                result = %value,
                "task succeeded"
            ),
            Err(err) => warn!(
                task_id = %node.id,
                command = %node.command,
                kind = %err.kind,
                error = %err.message,
                "task failed"
            ),
        }
        let _ = self.events.send(TaskEvent::Resolved {
            id: node.id,
            command: node.command.clone(),
            outcome,
        });
    }
}

fn prepared_len(task: &PreparedTask) -> usize {
    1 + task.chained.as_deref().map_or(0, prepared_len)
}

#[cfg(test)]
#[path = "tests/task_tests.rs"]
mod tests;
