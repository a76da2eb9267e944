use std::fmt;
use std::rc::Rc;

use fusebox_content::{ConfigurationError, TaskDef, TaskKind, TaskListDef};

use crate::services::TickContext;

/// Observer for task progress. Dispatch is synchronous within the tick that
/// caused it; listeners are called in registration order but must not rely
/// on it.
pub trait TaskListener {
    fn task_started(&self, _task: &TaskDef) {}
    fn task_completed(&self, _task: &TaskDef) {}
    fn list_completed(&self, _list: &TaskListDef) {}
}

impl fmt::Debug for dyn TaskListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskListener")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTask {
    pub def: TaskDef,
    pub index: usize,
    pub complete: bool,
}

/// What a world event did to the current list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// No pending task matched.
    Ignored,
    Completed,
    /// The completed task was the last pending one.
    ListCompleted,
}

impl TaskOutcome {
    pub fn matched(self) -> bool {
        self != TaskOutcome::Ignored
    }
}

#[derive(Debug, Default)]
pub struct TaskTracker {
    list: Option<TaskListDef>,
    tasks: Vec<ActiveTask>,
    completed: usize,
    closed: bool,
    listeners: Vec<Rc<dyn TaskListener>>,
    last_started: Option<TaskDef>,
    last_completed: Option<TaskDef>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Rc<dyn TaskListener>) {
        self.listeners.push(listener);
    }

    pub fn current_list(&self) -> Option<&TaskListDef> {
        self.list.as_ref()
    }

    pub fn tasks(&self) -> &[ActiveTask] {
        &self.tasks
    }

    pub fn completed_count(&self) -> usize {
        self.completed
    }

    pub fn is_complete(&self, index: usize) -> bool {
        self.tasks.get(index).is_some_and(|task| task.complete)
    }

    /// True once every task of the current list has completed. Stays true
    /// until the next list starts.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn last_started(&self) -> Option<&TaskDef> {
        self.last_started.as_ref()
    }

    pub fn last_completed(&self) -> Option<&TaskDef> {
        self.last_completed.as_ref()
    }

    /// Replaces the current list. Every task starts pending; trigger tasks
    /// switch on their trigger volume. Returns whether the list is already
    /// closed (it has no tasks).
    pub fn start_list(
        &mut self,
        list: &TaskListDef,
        ctx: &mut TickContext<'_>,
    ) -> Result<bool, ConfigurationError> {
        for task in &list.tasks {
            if task.kind == TaskKind::ReachedTrigger && !ctx.stage.has_trigger(&task.object) {
                return Err(ConfigurationError::UnknownTrigger {
                    list: list.title.clone(),
                    task: task.name.clone(),
                    trigger: task.object.clone(),
                });
            }
        }

        self.tasks = list
            .tasks
            .iter()
            .enumerate()
            .map(|(index, def)| ActiveTask {
                def: def.clone(),
                index,
                complete: false,
            })
            .collect();
        self.completed = 0;
        self.closed = list.tasks.is_empty();
        self.list = Some(list.clone());
        ctx.log(format!("task_list.start {}", list.title));

        for task in &list.tasks {
            if task.kind == TaskKind::ReachedTrigger {
                ctx.stage.activate_trigger(&task.object);
            }
            self.last_started = Some(task.clone());
            log::info!("start task {} ({})", task.name, task.kind.label());
            ctx.log(format!("task.start {}", task.name));
            for listener in &self.listeners {
                listener.task_started(task);
            }
        }
        Ok(self.closed)
    }

    pub fn player_entered_trigger(&mut self, trigger: &str, ctx: &mut TickContext<'_>) -> TaskOutcome {
        self.complete_named(TaskKind::ReachedTrigger, trigger, ctx)
    }

    pub fn player_grabbed_object(&mut self, object: &str, ctx: &mut TickContext<'_>) -> TaskOutcome {
        self.complete_named(TaskKind::GrabObject, object, ctx)
    }

    pub fn complete_from_script(&mut self, name: &str, ctx: &mut TickContext<'_>) -> TaskOutcome {
        self.complete_named(TaskKind::FromScript, name, ctx)
    }

    /// Completes the first pending wait-for-chat task, whatever its object.
    pub fn complete_wait_for_chat(&mut self, ctx: &mut TickContext<'_>) -> TaskOutcome {
        match self.first_pending(TaskKind::WaitForChatToFinish) {
            Some(index) => self.complete(index, ctx),
            None => TaskOutcome::Ignored,
        }
    }

    fn complete_named(
        &mut self,
        kind: TaskKind,
        subject: &str,
        ctx: &mut TickContext<'_>,
    ) -> TaskOutcome {
        let Some(index) = self.first_pending(kind) else {
            return TaskOutcome::Ignored;
        };
        if self.tasks[index].def.object != subject {
            log::debug!(
                "{} {} does not match pending task {}",
                kind.label(),
                subject,
                self.tasks[index].def.name
            );
            return TaskOutcome::Ignored;
        }
        self.complete(index, ctx)
    }

    fn first_pending(&self, kind: TaskKind) -> Option<usize> {
        self.tasks
            .iter()
            .position(|task| !task.complete && task.def.kind == kind)
    }

    /// Marks task `index` complete. Completing an already complete task is a
    /// no-op.
    pub fn complete(&mut self, index: usize, ctx: &mut TickContext<'_>) -> TaskOutcome {
        let Some(task) = self.tasks.get_mut(index) else {
            return TaskOutcome::Ignored;
        };
        if task.complete {
            return TaskOutcome::Ignored;
        }
        task.complete = true;
        let def = task.def.clone();

        if def.kind == TaskKind::ReachedTrigger {
            ctx.stage.deactivate_trigger(&def.object);
        }
        log::info!("complete task {}", def.name);
        ctx.log(format!("task.complete {}", def.name));
        for listener in &self.listeners {
            listener.task_completed(&def);
        }
        self.last_completed = Some(def);

        self.completed += 1;
        if self.completed < self.tasks.len() {
            return TaskOutcome::Completed;
        }
        self.closed = true;
        if let Some(list) = self.list.as_ref() {
            ctx.log(format!("task_list.complete {}", list.title));
            for listener in &self.listeners {
                listener.list_completed(list);
            }
        }
        TaskOutcome::ListCompleted
    }

    pub fn clear(&mut self) {
        self.list = None;
        self.tasks.clear();
        self.completed = 0;
        self.closed = false;
    }
}
