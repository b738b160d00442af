use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::progress::Progress;
use super::state::{State, StateExec, StateHistory, StateMachine};
use crate::carrier::CarrierType;
use crate::error::ExecutionError;
use crate::parameter::{Parameter, Value};

/// Template step of a process chain.
///
/// A step with an `output` but no `preparation` creates batches, one with a
/// `preparation` but no `output` consumes them, one with both modifies them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub id: String,
    pub name: String,
    pub state_machine: Arc<StateMachine>,
    #[serde(default)]
    pub preparation: Option<CarrierType>,
    #[serde(default)]
    pub output: Option<CarrierType>,
    #[serde(default)]
    pub workstation: Option<String>,
    /// Estimated duration in minutes.
    #[serde(default)]
    pub est_duration: u32,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl ProcessStep {
    pub fn new(name: impl Into<String>, state_machine: Arc<StateMachine>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            state_machine,
            preparation: None,
            output: None,
            workstation: None,
            est_duration: 0,
            parameters: Vec::new(),
        }
    }

    pub fn with_preparation(mut self, carrier_type: CarrierType) -> Self {
        self.preparation = Some(carrier_type);
        self
    }

    pub fn with_output(mut self, carrier_type: CarrierType) -> Self {
        self.output = Some(carrier_type);
        self
    }

    pub fn at_workstation(mut self, workstation: impl Into<String>) -> Self {
        self.workstation = Some(workstation.into());
        self
    }

    pub fn estimated(mut self, minutes: u32) -> Self {
        self.est_duration = minutes;
        self
    }

    pub fn creates(&self) -> bool {
        self.output.is_some() && self.preparation.is_none()
    }

    pub fn deletes(&self) -> bool {
        self.preparation.is_some() && self.output.is_none()
    }

    pub fn modifies(&self) -> bool {
        self.preparation.is_some() && self.output.is_some()
    }
}

/// What finishing a state means for the job's batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyEffect {
    None,
    /// The batches were consumed and leave the system.
    Delete,
    /// The batches were processed; record the procedure on them.
    Modify,
}

/// One execution of a [`ProcessStep`] within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: String,
    pub process_step: Arc<ProcessStep>,
    /// `None` is treated exactly like an empty history.
    #[serde(default)]
    pub state_history: Option<StateHistory>,
    #[serde(default)]
    pub values: Vec<Value>,
}

impl Procedure {
    pub fn new(process_step: Arc<ProcessStep>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            process_step,
            state_history: Some(StateHistory::default()),
            values: Vec::new(),
        }
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.process_step.state_machine
    }

    pub fn progress(&self) -> Progress<'_> {
        Progress::of(self)
    }

    pub fn execs(&self) -> &[StateExec] {
        self.state_history
            .as_ref()
            .map(|h| h.execs.as_slice())
            .unwrap_or_default()
    }

    pub fn current_state(&self) -> Option<&State> {
        self.progress().current_state()
    }

    pub fn has_next_state(&self) -> bool {
        self.next_state().is_some()
    }

    pub fn next_state(&self) -> Option<&State> {
        self.state_machine().states.get(self.execs().len())
    }

    /// Every state has been entered and the last one is closed.
    pub fn is_complete(&self) -> bool {
        let Some(history) = &self.state_history else {
            return false;
        };
        self.state_machine().len() == history.execs.len() && history.is_complete()
    }

    /// Nothing has been allocated yet: the batch still has to be brought here.
    pub fn needs_delivery(&self) -> bool {
        self.state_history
            .as_ref()
            .is_some_and(|h| h.execs.is_empty())
    }

    /// Work is done and the batch waits in the transport state.
    pub fn needs_collection(&self) -> bool {
        let Some(history) = &self.state_history else {
            return false;
        };
        let Some(current) = self.current_state() else {
            return false;
        };
        self.state_machine().len() == history.execs.len()
            && !history.is_complete()
            && current.is_transport()
    }

    pub fn can_execute(&self) -> bool {
        self.state_history.as_ref().is_some_and(StateHistory::can_execute)
            && !self.current_state().is_some_and(State::is_transport)
    }

    pub fn can_finish(&self) -> bool {
        self.state_history.as_ref().is_some_and(StateHistory::can_finish)
            && !self.current_state().is_some_and(State::is_transport)
    }

    /// The procedure sits in its last executable state and its step creates
    /// batches, so finishing it requires registering a new assembly.
    pub fn is_in_last_executable_state_and_creates(&self) -> bool {
        self.process_step.creates()
            && self
                .state_machine()
                .is_last_executable_state(self.current_state())
    }

    /// Allocates the record for the next state. The current record has to be
    /// closed first.
    pub fn start_next_state(&mut self, now: DateTime<Utc>) -> Result<(), ExecutionError> {
        if !self.has_next_state() {
            return Err(ExecutionError::NoNextState);
        }
        let open = self
            .state_history
            .as_ref()
            .and_then(StateHistory::current_exec)
            .is_some_and(|exec| !exec.is_closed());
        if open {
            return Err(ExecutionError::CurrentStateOpen);
        }
        let history = self
            .state_history
            .get_or_insert_with(StateHistory::default);
        history.execs.push(StateExec::allocate(now));
        debug!(procedure = %self.id, state = history.execs.len() - 1, "allocated next state");
        Ok(())
    }

    /// Starts work on the current state.
    pub fn execute(&mut self, now: DateTime<Utc>) -> Result<(), ExecutionError> {
        if self.needs_collection() {
            return Err(ExecutionError::AwaitingCollection);
        }
        let history = self
            .state_history
            .as_mut()
            .ok_or(ExecutionError::MissingHistory)?;
        if !history.can_execute() {
            return Err(ExecutionError::NotExecutable);
        }
        if let Some(exec) = history.current_exec_mut() {
            exec.started_at = Some(now);
        }
        Ok(())
    }

    /// Closes the current state and allocates the next one, if any.
    ///
    /// `transition_time` overrides the recorded minutes; `None` or zero
    /// records the minutes elapsed since the state was started.
    pub fn finish(
        &mut self,
        now: DateTime<Utc>,
        transition_time: Option<i64>,
    ) -> Result<AssemblyEffect, ExecutionError> {
        if self.needs_collection() {
            return Err(ExecutionError::AwaitingCollection);
        }
        let history = self
            .state_history
            .as_mut()
            .ok_or(ExecutionError::MissingHistory)?;
        if !history.can_finish() {
            return Err(ExecutionError::NotFinishable);
        }
        if let Some(exec) = history.current_exec_mut() {
            exec.finished_at = Some(now);
            exec.transition_time = match transition_time {
                Some(minutes) if minutes != 0 => Some(minutes),
                _ => exec.transition_minutes(now),
            };
        }

        let machine = self.state_machine();
        let effect = if machine.is_last_executable_state(self.current_state()) {
            if self.process_step.deletes() {
                AssemblyEffect::Delete
            } else if self.process_step.modifies() {
                AssemblyEffect::Modify
            } else {
                AssemblyEffect::None
            }
        } else {
            AssemblyEffect::None
        };

        if self.has_next_state() {
            self.start_next_state(now)?;
        }
        Ok(effect)
    }

    /// Parameter name → recorded value, the mapping handed to exporters.
    pub fn parameter_map(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|v| (v.parameter.field.clone(), v.raw().to_string()))
            .collect()
    }
}
