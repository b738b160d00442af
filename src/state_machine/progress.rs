//! Where a procedure stands in its state machine.
//!
//! [`Progress`] pairs every state definition with the execution record at the
//! same position, so state `i` and exec `i` can never drift apart. The
//! [`ProgressEvaluator`] answers the questions the UI polls for; absent data
//! always yields `false` or `None`, never an error.

use tracing::warn;

use super::procedure::Procedure;
use super::state::{State, StateExec, StateHistory, StateMachine};

/// A state definition together with its execution record, if one exists yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEntry<'a> {
    pub state: &'a State,
    pub exec: Option<&'a StateExec>,
}

/// Position-aligned view of a procedure's state machine and history.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress<'a> {
    entries: Vec<ProgressEntry<'a>>,
    /// Number of entries that have an exec.
    entered: usize,
}

impl<'a> Progress<'a> {
    pub fn new(machine: &'a StateMachine, history: Option<&'a StateHistory>) -> Self {
        let execs: &[StateExec] = history.map(|h| h.execs.as_slice()).unwrap_or_default();
        if execs.len() > machine.len() {
            warn!(
                machine = %machine.name,
                states = machine.len(),
                execs = execs.len(),
                "more execution records than states, ignoring the surplus"
            );
        }
        let entries: Vec<ProgressEntry<'a>> = machine
            .states
            .iter()
            .enumerate()
            .map(|(i, state)| ProgressEntry {
                state,
                exec: execs.get(i),
            })
            .collect();
        let entered = execs.len().min(entries.len());
        Self { entries, entered }
    }

    pub fn of(procedure: &'a Procedure) -> Self {
        Self::new(
            &procedure.process_step.state_machine,
            procedure.state_history.as_ref(),
        )
    }

    pub fn entries(&self) -> &[ProgressEntry<'a>] {
        &self.entries
    }

    /// Number of execution records created so far, minus one.
    pub fn current_index(&self) -> Option<usize> {
        self.entered.checked_sub(1)
    }

    pub fn current(&self) -> Option<ProgressEntry<'a>> {
        self.current_index().map(|i| self.entries[i])
    }

    pub fn current_state(&self) -> Option<&'a State> {
        self.current().map(|entry| entry.state)
    }

    pub fn current_exec(&self) -> Option<&'a StateExec> {
        self.current().and_then(|entry| entry.exec)
    }

    pub fn position_of(&self, state: &State) -> Option<usize> {
        self.entries.iter().position(|entry| entry.state == state)
    }

    pub fn is_started(&self) -> bool {
        self.entered > 0
    }
}

/// Read-only predicates over a procedure's progress.
pub struct ProgressEvaluator;

impl ProgressEvaluator {
    pub fn current_state(procedure: &Procedure) -> Option<&State> {
        Progress::of(procedure).current_state()
    }

    /// Whether `state` counts as done for `procedure`.
    ///
    /// Once the current record is closed every state counts as complete;
    /// otherwise exactly the states before the current one do. The current
    /// record governs the answer even for the state right before it.
    pub fn is_complete(state: Option<&State>, procedure: &Procedure) -> bool {
        let Some(state) = state else {
            return false;
        };
        if procedure.state_history.is_none() {
            return false;
        }
        let progress = Progress::of(procedure);
        let Some(current) = progress.current_index() else {
            return false;
        };
        let Some(index) = progress.position_of(state) else {
            return false;
        };
        if progress.current_exec().is_some_and(StateExec::is_closed) {
            return true;
        }
        index < current
    }

    /// Whether `state` is the current state and work on it is running.
    pub fn is_pending(state: Option<&State>, procedure: &Procedure) -> bool {
        let Some(state) = state else {
            return false;
        };
        if procedure.state_history.is_none() {
            return false;
        }
        let progress = Progress::of(procedure);
        let (Some(current), Some(index)) = (progress.current_index(), progress.position_of(state))
        else {
            return false;
        };
        index == current
            && progress
                .current_exec()
                .is_some_and(|exec| exec.is_started() && !exec.is_closed())
    }

    pub fn can_execute(history: Option<&StateHistory>) -> bool {
        history.is_some_and(StateHistory::can_execute)
    }

    pub fn can_finish(history: Option<&StateHistory>) -> bool {
        history.is_some_and(StateHistory::can_finish)
    }

    pub fn is_last_state(state: Option<&State>, machine: &StateMachine) -> bool {
        machine.is_last_state(state)
    }

    pub fn is_last_executable_state(state: Option<&State>, machine: &StateMachine) -> bool {
        machine.is_last_executable_state(state)
    }
}
