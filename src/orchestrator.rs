use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::assembly::{Assembly, SplitDirective, SplitEngine, SplitResult, verify_identifier};
use crate::error::{KcbError, RepositoryError, SplitError};
use crate::repository::{AssemblyRepository, WriteOutcome};
use crate::state_machine::Job;

/// Commits assembly changes: the read-verify-write sequence around the pure
/// split computation, plus registration and retirement of batches.
///
/// Holding the orchestrator mutably serialises its callers; writes still go
/// through the repository's version checks, so a row changed behind its back
/// surfaces as a stale write.
pub struct AssemblyOrchestrator<R> {
    repository: R,
}

fn persistence(err: RepositoryError) -> SplitError {
    SplitError::Persistence(err.to_string())
}

impl<R: AssemblyRepository> AssemblyOrchestrator<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn into_inner(self) -> R {
        self.repository
    }

    /// Splits the stored assembly `identifier` and replaces it with its
    /// children. Returns the stored children, or the original when the
    /// directive yields a single group.
    pub fn split(
        &mut self,
        identifier: &str,
        directive: SplitDirective,
    ) -> Result<Vec<Assembly>, KcbError> {
        let original = self
            .repository
            .find_by_identifier(identifier)
            .map_err(persistence)?
            .ok_or(SplitError::MissingAssembly)?;

        let children = match SplitEngine::split(&original, directive)? {
            SplitResult::Unchanged(_) => {
                debug!(identifier, %directive, "split left assembly unchanged");
                return Ok(vec![original.clone()]);
            }
            SplitResult::Divided(children) => children,
        };

        let id = original.assembly_id().map_err(SplitError::from)?;
        let neighbours: Vec<Assembly> = self
            .repository
            .find_by_lineage(id.lineage())
            .map_err(persistence)?
            .into_iter()
            .filter(|a| a.id != original.id)
            .collect();
        for child in &children {
            verify_identifier(child, &neighbours)?;
        }

        let stale = || SplitError::StaleWrite {
            identifier: identifier.to_string(),
        };
        match self.repository.replace(&original, &children) {
            Ok(WriteOutcome::Committed) => {}
            Ok(WriteOutcome::Conflict)
            | Err(RepositoryError::Conflict(_))
            | Err(RepositoryError::NotFound(_)) => return Err(stale().into()),
            Err(err) => return Err(persistence(err).into()),
        }
        info!(identifier, %directive, children = children.len(), "split committed");

        let mut stored = Vec::with_capacity(children.len());
        for child in &children {
            let row = self
                .repository
                .find_by_identifier(&child.identifier)
                .map_err(persistence)?
                .ok_or_else(|| persistence(RepositoryError::NotFound(child.identifier.clone())))?;
            stored.push(row);
        }
        Ok(stored)
    }

    /// Verifies that a new batch does not collide with stored ones and saves
    /// it.
    pub fn register(&mut self, assembly: &Assembly) -> Result<Assembly, KcbError> {
        let id = assembly.assembly_id()?;
        let neighbours = self.repository.find_by_lineage(id.lineage())?;
        verify_identifier(assembly, &neighbours)?;
        let stored = self.repository.save_and_refresh(assembly)?;
        info!(identifier = %stored.identifier, "assembly registered");
        Ok(stored)
    }

    /// Removes batches that left the system. Returns how many were removed.
    pub fn retire(&mut self, assemblies: &[Assembly]) -> Result<usize, KcbError> {
        for assembly in assemblies {
            if self.repository.remove(assembly)? == WriteOutcome::Conflict {
                return Err(RepositoryError::Conflict(assembly.identifier.clone()).into());
            }
        }
        if !assemblies.is_empty() {
            info!(count = assemblies.len(), "assemblies retired");
        }
        Ok(assemblies.len())
    }

    /// Finishes the job's current state and retires whatever batches the
    /// step consumed.
    pub fn finish_state(
        &mut self,
        job: &mut Job,
        now: DateTime<Utc>,
        transition_time: Option<i64>,
    ) -> Result<usize, KcbError> {
        let retired = job.finish_current(now, transition_time)?;
        self.retire(&retired)
    }
}
