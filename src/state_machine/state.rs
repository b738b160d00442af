use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the state in which a finished batch waits to be picked up.
pub const TRANSPORT_STATE: &str = "Transport";

/// A named stage of a [`StateMachine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub id: String,
    pub name: String,
    /// Occupies the workstation while active.
    #[serde(default)]
    pub blocking: bool,
}

impl State {
    pub fn new(name: impl Into<String>, blocking: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            blocking,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.name == TRANSPORT_STATE
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Ordered list of states a procedure walks through. The order is the
/// workflow path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachine {
    pub id: String,
    pub name: String,
    pub states: Vec<State>,
}

impl StateMachine {
    pub fn new(name: impl Into<String>, states: Vec<State>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            states,
        }
    }

    pub fn index_of(&self, state: &State) -> Option<usize> {
        self.states.iter().position(|s| s == state)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn is_last_state(&self, state: Option<&State>) -> bool {
        let Some(state) = state else {
            return false;
        };
        !self.states.is_empty() && self.index_of(state) == Some(self.states.len() - 1)
    }

    /// True for the state right before the final one when the two differ by
    /// name. Finishing it is the moment a creating step hands over its batch.
    pub fn is_last_executable_state(&self, state: Option<&State>) -> bool {
        let Some(state) = state else {
            return false;
        };
        let len = self.states.len();
        if len < 2 {
            return false;
        }
        self.index_of(state) == Some(len - 2) && state.name != self.states[len - 1].name
    }
}

/// One execution record of a procedure entering a state.
///
/// A record is allocated when the previous state finishes, started when work
/// begins and closed when it ends. Records are never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateExec {
    pub id: String,
    pub transition_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Minutes spent in the state, recorded when it closes.
    #[serde(default)]
    pub transition_time: Option<i64>,
}

impl StateExec {
    pub fn allocate(now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            transition_at: now,
            started_at: None,
            finished_at: None,
            transition_time: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Whole minutes since the record was started, `None` if it never was.
    pub fn transition_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        self.started_at.map(|started| (now - started).num_minutes())
    }
}

/// Chronological execution log of one procedure; entry `i` belongs to state
/// `i` of the procedure's state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateHistory {
    pub execs: Vec<StateExec>,
}

impl StateHistory {
    pub fn current_exec(&self) -> Option<&StateExec> {
        self.execs.last()
    }

    pub fn current_exec_mut(&mut self) -> Option<&mut StateExec> {
        self.execs.last_mut()
    }

    /// Last record closed.
    pub fn is_complete(&self) -> bool {
        self.current_exec().is_some_and(StateExec::is_closed)
    }

    /// Last record allocated but not started yet.
    pub fn can_execute(&self) -> bool {
        self.current_exec()
            .is_some_and(|exec| !exec.is_started() && !exec.is_closed())
    }

    /// Last record started and still open.
    pub fn can_finish(&self) -> bool {
        self.current_exec()
            .is_some_and(|exec| exec.is_started() && !exec.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn machine(names: &[&str]) -> StateMachine {
        StateMachine::new(
            "test",
            names.iter().map(|n| State::new(*n, false)).collect(),
        )
    }

    #[test]
    fn last_state_detection() {
        let m = machine(&["Prepare", "Bake", "Transport"]);
        assert!(m.is_last_state(Some(&m.states[2])));
        assert!(!m.is_last_state(Some(&m.states[1])));
        assert!(!m.is_last_state(None));
        assert!(!m.is_last_state(Some(&State::new("Elsewhere", false))));
    }

    #[test]
    fn last_executable_state_detection() {
        let m = machine(&["Prepare", "Bake", "Transport"]);
        assert!(m.is_last_executable_state(Some(&m.states[1])));
        assert!(!m.is_last_executable_state(Some(&m.states[0])));
        assert!(!m.is_last_executable_state(Some(&m.states[2])));
        assert!(!m.is_last_executable_state(None));
    }

    #[test]
    fn last_executable_state_needs_a_distinct_final_name() {
        let m = machine(&["Prepare", "Bake", "Bake"]);
        assert!(!m.is_last_executable_state(Some(&m.states[1])));
        let single = machine(&["Bake"]);
        assert!(!single.is_last_executable_state(Some(&single.states[0])));
    }

    #[test]
    fn states_with_equal_names_are_distinct() {
        let m = machine(&["Bake", "Bake"]);
        assert_eq!(m.index_of(&m.states[1]), Some(1));
    }

    #[test]
    fn history_predicates_follow_last_exec() {
        let now = Utc::now();
        let mut history = StateHistory::default();
        assert!(!history.can_execute());
        assert!(!history.can_finish());
        assert!(!history.is_complete());

        history.execs.push(StateExec::allocate(now));
        assert!(history.can_execute());
        assert!(!history.can_finish());

        history.current_exec_mut().unwrap().started_at = Some(now);
        assert!(!history.can_execute());
        assert!(history.can_finish());

        history.current_exec_mut().unwrap().finished_at = Some(now);
        assert!(!history.can_execute());
        assert!(!history.can_finish());
        assert!(history.is_complete());
    }

    #[test]
    fn transition_minutes_since_start() {
        let now = Utc::now();
        let mut exec = StateExec::allocate(now - Duration::minutes(90));
        assert_eq!(exec.transition_minutes(now), None);
        exec.started_at = Some(now - Duration::minutes(42));
        assert_eq!(exec.transition_minutes(now), Some(42));
    }

    #[test]
    fn transport_state_by_name() {
        assert!(State::new(TRANSPORT_STATE, false).is_transport());
        assert!(!State::new("Bake", true).is_transport());
        assert_eq!(State::new("Bake", true).to_string(), "Bake");
    }
}
