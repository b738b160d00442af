//! A job's position within its process chain.

use chrono::{DateTime, Utc};
use tracing::trace;

use super::job::{Job, JobState};
use super::procedure::Procedure;
use super::progress::ProgressEvaluator;
use crate::carrier::CarrierLocator;
use crate::config::GlobalConfigStore;
use crate::error::ConfigError;

/// Aggregates procedure progress into job-level answers.
///
/// Pure chain arithmetic lives in associated functions. Questions that need
/// the global configuration or carrier locations go through an instance
/// holding those collaborators.
pub struct JobProgressTracker<'a> {
    config: &'a dyn GlobalConfigStore,
    locator: &'a dyn CarrierLocator,
}

impl<'a> JobProgressTracker<'a> {
    pub fn new(config: &'a dyn GlobalConfigStore, locator: &'a dyn CarrierLocator) -> Self {
        Self { config, locator }
    }

    /// Index of the first procedure that is not complete.
    ///
    /// A finished job reports the chain length. A job without an incomplete
    /// procedure that is not finished yet reports zero.
    pub fn current_progress_in_chain(job: &Job) -> usize {
        if job.job_state == JobState::Finished {
            return job.procedures.len();
        }
        job.current_procedure().map_or(0, |(index, _)| index)
    }

    pub fn remaining_progress_in_chain(job: &Job) -> usize {
        job.procedures.len() - Self::current_progress_in_chain(job)
    }

    /// Fraction of the chain behind the job, in `0.0..=1.0`.
    pub fn progress_in_chain(job: &Job) -> f64 {
        if job.job_state == JobState::Finished {
            return 1.0;
        }
        let total = job.procedures.len();
        if total == 0 {
            return 0.0;
        }
        Self::current_progress_in_chain(job) as f64 / total as f64
    }

    /// Processing and at least one procedure's current state is open.
    pub fn is_active(job: Option<&Job>) -> bool {
        let Some(job) = job else {
            return false;
        };
        job.job_state == JobState::Processing
            && job.procedures.iter().any(|procedure| {
                !ProgressEvaluator::is_complete(
                    ProgressEvaluator::current_state(procedure),
                    procedure,
                )
            })
    }

    pub fn is_creating(job: Option<&Job>) -> bool {
        job.is_some_and(|job| job.process_chain.is_creating())
    }

    pub fn is_deleting(job: Option<&Job>) -> bool {
        job.is_some_and(|job| job.process_chain.is_deleting())
    }

    pub fn is_modifying(job: Option<&Job>) -> bool {
        job.is_some_and(|job| job.process_chain.is_modifying())
    }

    pub fn current_procedure(job: Option<&Job>) -> Option<&Procedure> {
        job?.current_procedure().map(|(_, procedure)| procedure)
    }

    pub fn next_procedure(job: Option<&Job>) -> Option<&Procedure> {
        job?.next_procedure()
    }

    pub fn has_next_procedure(job: Option<&Job>) -> bool {
        Self::next_procedure(job).is_some()
    }

    pub fn is_complete(job: Option<&Job>) -> bool {
        job.is_some_and(Job::is_complete)
    }

    /// Not started yet, or nothing to work on.
    pub fn is_pending(job: Option<&Job>) -> bool {
        job.is_some_and(|job| job.assemblies.is_empty() || job.job_state == JobState::Pending)
    }

    /// Whether the job has sat in its current state longer than the
    /// configured threshold.
    ///
    /// The reference time is the start of the current state, or its
    /// allocation when work has not begun. Only whole elapsed minutes count.
    pub fn is_old_active_job(
        &self,
        job: Option<&Job>,
        now: DateTime<Utc>,
    ) -> Result<bool, ConfigError> {
        let Some(job) = job else {
            return Ok(false);
        };
        if job.job_state != JobState::Processing {
            return Ok(false);
        }
        let Some((_, procedure)) = job.current_procedure() else {
            return Ok(false);
        };
        let Some(exec) = procedure
            .state_history
            .as_ref()
            .and_then(|h| h.current_exec())
        else {
            return Ok(false);
        };
        let threshold = self.config.old_active_job_threshold()?;
        let since = exec.started_at.unwrap_or(exec.transition_at);
        Ok((now - since).num_minutes() > threshold.num_minutes())
    }

    /// The current procedure's batch is ready in the transport state and its
    /// carrier has not been picked up.
    pub fn needs_collection(&self, job: Option<&Job>) -> bool {
        let Some(job) = job.filter(|j| j.job_state == JobState::Processing) else {
            return false;
        };
        let Some((_, procedure)) = job.current_procedure() else {
            return false;
        };
        if !procedure.needs_collection() {
            return false;
        }
        let on_transport = self.first_carrier_on_transport(job);
        trace!(job = %job.name, on_transport, "collection check");
        !on_transport
    }

    /// The batch is travelling to the current procedure's workstation, or
    /// the procedure has not received it yet.
    pub fn needs_delivery(&self, job: Option<&Job>) -> bool {
        let Some(job) = job.filter(|j| j.job_state == JobState::Processing) else {
            return false;
        };
        if self.first_carrier_on_transport(job) {
            return true;
        }
        job.current_procedure()
            .is_some_and(|(_, procedure)| procedure.needs_delivery())
    }

    fn first_carrier_on_transport(&self, job: &Job) -> bool {
        job.assemblies
            .first()
            .and_then(|assembly| assembly.carriers.first())
            .and_then(|carrier| self.locator.location(carrier))
            .is_some_and(|location| location.is_transport())
    }
}
