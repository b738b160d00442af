use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::procedure::{AssemblyEffect, ProcessStep, Procedure};
use crate::assembly::Assembly;
use crate::error::{ExecutionError, JobError};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Processing,
    Finished,
    Cancelled,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "PENDING"),
            JobState::Processing => write!(f, "PROCESSING"),
            JobState::Finished => write!(f, "FINISHED"),
            JobState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priority {
    pub name: String,
    /// Higher is more urgent.
    pub value: i32,
}

impl Default for Priority {
    fn default() -> Self {
        Self {
            name: "normal".to_string(),
            value: 0,
        }
    }
}

/// Ordered template of process steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessChain {
    pub id: String,
    pub name: String,
    pub chain: Vec<Arc<ProcessStep>>,
}

impl ProcessChain {
    pub fn new(name: impl Into<String>, chain: Vec<Arc<ProcessStep>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            chain,
        }
    }

    /// First step brings new batches into the system.
    pub fn is_creating(&self) -> bool {
        self.chain.first().is_some_and(|step| step.creates())
    }

    /// Last step consumes the batches.
    pub fn is_deleting(&self) -> bool {
        self.chain.last().is_some_and(|step| step.deletes())
    }

    pub fn is_modifying(&self) -> bool {
        self.chain.iter().any(|step| step.modifies())
    }

    /// Sum of the estimated step durations, in minutes.
    pub fn est_duration(&self) -> u32 {
        self.chain.iter().map(|step| step.est_duration).sum()
    }
}

/// One run of a process chain against a set of batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub job_state: JobState,
    pub process_chain: Arc<ProcessChain>,
    /// One per chain step, in chain order.
    pub procedures: Vec<Procedure>,
    #[serde(default)]
    pub assemblies: Vec<Assembly>,
    #[serde(default)]
    pub priority: Priority,
}

impl Job {
    pub fn new(
        name: impl Into<String>,
        process_chain: Arc<ProcessChain>,
        priority: Priority,
    ) -> Self {
        let procedures = process_chain
            .chain
            .iter()
            .map(|step| Procedure::new(Arc::clone(step)))
            .collect();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            job_state: JobState::Pending,
            process_chain,
            procedures,
            assemblies: Vec::new(),
            priority,
        }
    }

    pub fn with_assemblies(mut self, assemblies: Vec<Assembly>) -> Self {
        self.assemblies = assemblies;
        self
    }

    /// First procedure that is not complete, with its position in the chain.
    pub fn current_procedure(&self) -> Option<(usize, &Procedure)> {
        self.procedures
            .iter()
            .enumerate()
            .find(|(_, procedure)| !procedure.is_complete())
    }

    fn current_procedure_mut(&mut self) -> Option<&mut Procedure> {
        self.procedures.iter_mut().find(|p| !p.is_complete())
    }

    pub fn next_procedure(&self) -> Option<&Procedure> {
        let (index, _) = self.current_procedure()?;
        self.procedures.get(index + 1)
    }

    pub fn has_next_procedure(&self) -> bool {
        self.next_procedure().is_some()
    }

    /// Every procedure has walked its whole state machine.
    pub fn is_complete(&self) -> bool {
        self.procedures.iter().all(Procedure::is_complete)
    }

    /// Moves a pending job into processing.
    ///
    /// A chain that creates its batches may start without any; its first state
    /// is allocated right away.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        let creating = self.process_chain.is_creating();
        if !creating && self.assemblies.is_empty() {
            return Err(JobError::MissingAssemblies);
        }
        if self.job_state != JobState::Pending {
            return Err(JobError::NotPending);
        }
        self.job_state = JobState::Processing;
        if creating {
            self.start_next_procedure(now)?;
        }
        info!(job = %self.name, "job started");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), JobError> {
        match self.job_state {
            JobState::Processing => {
                self.job_state = JobState::Cancelled;
                info!(job = %self.name, "job cancelled");
                Ok(())
            }
            JobState::Pending => Err(JobError::Pending),
            JobState::Finished => Err(JobError::AlreadyFinished),
            JobState::Cancelled => Err(JobError::AlreadyCancelled),
        }
    }

    /// Allocates the next state of the current procedure.
    pub fn start_next_procedure(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        let procedure = self
            .current_procedure_mut()
            .ok_or(JobError::NoCurrentProcedure)?;
        procedure.start_next_state(now)?;
        Ok(())
    }

    /// Closes the transport state once the batch has been picked up.
    pub fn collect(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        let needs_collection = self.job_state == JobState::Processing
            && self
                .current_procedure()
                .is_some_and(|(_, p)| p.needs_collection());
        let procedure = self
            .current_procedure_mut()
            .ok_or(JobError::NoCurrentProcedure)?;
        if needs_collection {
            let exec = procedure
                .state_history
                .as_mut()
                .and_then(|h| h.current_exec_mut())
                .ok_or(ExecutionError::MissingHistory)?;
            exec.finished_at = Some(now);
            debug!(procedure = %procedure.id, "transport state closed on collection");
        }
        Ok(())
    }

    /// Hands the batch to the next procedure, or finishes the job when none
    /// is left.
    pub fn deliver(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        if self.job_state != JobState::Processing {
            return Err(JobError::NotProcessing);
        }
        match self.start_next_procedure(now) {
            Ok(()) => Ok(()),
            Err(_) if self.is_complete() => {
                self.job_state = JobState::Finished;
                info!(job = %self.name, "job finished");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Starts work on the current procedure's current state.
    pub fn execute_current(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        let procedure = self
            .current_procedure_mut()
            .ok_or(JobError::NoCurrentProcedure)?;
        procedure.execute(now)?;
        Ok(())
    }

    /// Finishes the current procedure's state and applies its effect on the
    /// job's batches. Returns the batches that left the system.
    pub fn finish_current(
        &mut self,
        now: DateTime<Utc>,
        transition_time: Option<i64>,
    ) -> Result<Vec<Assembly>, JobError> {
        let procedure = self
            .current_procedure_mut()
            .ok_or(JobError::NoCurrentProcedure)?;
        let effect = procedure.finish(now, transition_time)?;
        let procedure_id = procedure.id.clone();

        match effect {
            AssemblyEffect::Delete => {
                self.job_state = JobState::Finished;
                let retired = std::mem::take(&mut self.assemblies);
                info!(job = %self.name, retired = retired.len(), "batches consumed");
                Ok(retired)
            }
            AssemblyEffect::Modify => {
                for assembly in &mut self.assemblies {
                    assembly.modifications.push(procedure_id.clone());
                }
                Ok(Vec::new())
            }
            AssemblyEffect::None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::CarrierType;
    use crate::state_machine::ProgressEvaluator;
    use crate::state_machine::state::{State, StateMachine, TRANSPORT_STATE};

    fn machine() -> Arc<StateMachine> {
        Arc::new(StateMachine::new(
            "default",
            vec![
                State::new("Prepare", false),
                State::new("Run", true),
                State::new(TRANSPORT_STATE, false),
            ],
        ))
    }

    fn chain(steps: Vec<ProcessStep>) -> Arc<ProcessChain> {
        Arc::new(ProcessChain::new(
            "chain",
            steps.into_iter().map(Arc::new).collect(),
        ))
    }

    fn plain_job() -> Job {
        let steps = vec![
            ProcessStep::new("Anneal", machine()),
            ProcessStep::new("Polish", machine()),
        ];
        Job::new("job", chain(steps), Priority::default())
            .with_assemblies(vec![Assembly::new("abc.1.1", 4, "steel")])
    }

    fn run_state(job: &mut Job, now: DateTime<Utc>) -> Vec<Assembly> {
        job.execute_current(now).unwrap();
        job.finish_current(now, None).unwrap()
    }

    #[test]
    fn job_creation_defaults() {
        let job = plain_job();
        assert_eq!(job.job_state, JobState::Pending);
        assert_eq!(job.procedures.len(), 2);
        assert_eq!(job.current_procedure().unwrap().0, 0);
        assert!(!job.is_complete());
        assert!(job.has_next_procedure());
    }

    #[test]
    fn start_requires_assemblies_unless_creating() {
        let now = Utc::now();
        let mut job = plain_job();
        job.assemblies.clear();
        assert_eq!(job.start(now), Err(JobError::MissingAssemblies));

        let creating = ProcessStep::new("Cast", machine()).with_output(CarrierType::new("tray"));
        let mut job = Job::new("cast", chain(vec![creating]), Priority::default());
        job.start(now).unwrap();
        assert_eq!(job.job_state, JobState::Processing);
        assert!(job.procedures[0].can_execute());
    }

    #[test]
    fn start_twice_fails() {
        let now = Utc::now();
        let mut job = plain_job();
        job.start(now).unwrap();
        assert_eq!(job.start(now), Err(JobError::NotPending));
    }

    #[test]
    fn stop_transitions() {
        let mut job = plain_job();
        assert_eq!(job.stop(), Err(JobError::Pending));
        job.start(Utc::now()).unwrap();
        job.stop().unwrap();
        assert_eq!(job.job_state, JobState::Cancelled);
        assert_eq!(job.stop(), Err(JobError::AlreadyCancelled));
        job.job_state = JobState::Finished;
        assert_eq!(job.stop(), Err(JobError::AlreadyFinished));
    }

    #[test]
    fn full_run_through_chain() {
        let now = Utc::now();
        let mut job = plain_job();
        job.start(now).unwrap();

        for index in 0..2 {
            assert_eq!(job.current_procedure().unwrap().0, index);
            job.deliver(now).unwrap();
            run_state(&mut job, now);
            run_state(&mut job, now);
            assert!(job.procedures[index].needs_collection());
            job.collect(now).unwrap();
            assert!(job.procedures[index].is_complete());
        }

        assert!(job.is_complete());
        job.deliver(now).unwrap();
        assert_eq!(job.job_state, JobState::Finished);
    }

    #[test]
    fn second_delivery_leaves_the_open_state_alone() {
        let now = Utc::now();
        let mut job = plain_job();
        job.start(now).unwrap();
        job.deliver(now).unwrap();
        assert_eq!(
            job.deliver(now),
            Err(JobError::Execution(ExecutionError::CurrentStateOpen))
        );

        let procedure = &job.procedures[0];
        assert_eq!(procedure.execs().len(), 1);
        let prepare = &procedure.state_machine().states[0];
        assert!(!ProgressEvaluator::is_complete(Some(prepare), procedure));
        assert_eq!(job.job_state, JobState::Processing);
    }

    #[test]
    fn delivery_requires_a_processing_job() {
        let now = Utc::now();
        let mut job = plain_job();
        assert_eq!(job.deliver(now), Err(JobError::NotProcessing));
        assert!(job.procedures[0].execs().is_empty());

        job.start(now).unwrap();
        job.stop().unwrap();
        assert_eq!(job.deliver(now), Err(JobError::NotProcessing));
    }

    #[test]
    fn deleting_step_retires_assemblies() {
        let now = Utc::now();
        let steps = vec![
            ProcessStep::new("Dispose", machine()).with_preparation(CarrierType::new("tray")),
        ];
        let mut job = Job::new("dispose", chain(steps), Priority::default())
            .with_assemblies(vec![Assembly::new("abc.1.1", 4, "steel")]);
        job.start(now).unwrap();
        job.deliver(now).unwrap();

        assert!(run_state(&mut job, now).is_empty());
        let retired = run_state(&mut job, now);
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].identifier, "abc.1.1");
        assert!(job.assemblies.is_empty());
        assert_eq!(job.job_state, JobState::Finished);
    }

    #[test]
    fn modifying_step_marks_assemblies() {
        let now = Utc::now();
        let tray = CarrierType::new("tray");
        let steps = vec![
            ProcessStep::new("Coat", machine())
                .with_preparation(tray.clone())
                .with_output(tray),
        ];
        let mut job = Job::new("coat", chain(steps), Priority::default())
            .with_assemblies(vec![Assembly::new("abc.1.1", 4, "steel")]);
        job.start(now).unwrap();
        job.deliver(now).unwrap();
        run_state(&mut job, now);
        run_state(&mut job, now);

        let procedure_id = job.procedures[0].id.clone();
        assert_eq!(job.assemblies[0].modifications, vec![procedure_id]);
        assert_eq!(job.job_state, JobState::Processing);
    }

    #[test]
    fn chain_roles() {
        let tray = CarrierType::new("tray");
        let creating = chain(vec![
            ProcessStep::new("Cast", machine()).with_output(tray.clone()),
            ProcessStep::new("Dispose", machine()).with_preparation(tray.clone()),
        ]);
        assert!(creating.is_creating());
        assert!(creating.is_deleting());
        assert!(!creating.is_modifying());

        let empty = chain(Vec::new());
        assert!(!empty.is_creating());
        assert!(!empty.is_deleting());
        assert!(!empty.is_modifying());
    }

    #[test]
    fn chain_duration_sums_its_steps() {
        let timed = chain(vec![
            ProcessStep::new("Anneal", machine()).estimated(90),
            ProcessStep::new("Polish", machine()),
            ProcessStep::new("Inspect", machine()).estimated(15),
        ]);
        assert_eq!(timed.est_duration(), 105);
        assert_eq!(chain(Vec::new()).est_duration(), 0);
    }

    #[test]
    fn job_serialization_roundtrip() {
        let job = plain_job();
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"PENDING\""));
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, job.id);
        assert_eq!(back.procedures.len(), 2);
        assert_eq!(back.assemblies[0].identifier, "abc.1.1");
    }

    #[test]
    fn job_state_display() {
        assert_eq!(JobState::Pending.to_string(), "PENDING");
        assert_eq!(JobState::Processing.to_string(), "PROCESSING");
        assert_eq!(JobState::Finished.to_string(), "FINISHED");
        assert_eq!(JobState::Cancelled.to_string(), "CANCELLED");
    }
}
