//! Persistence collaborator for assemblies.
//!
//! Writes carry optimistic-concurrency checks on [`Assembly::version`] and
//! report a version mismatch as [`WriteOutcome::Conflict`] instead of an
//! error, so callers branch on a typed result.

use std::collections::HashMap;

use tracing::debug;

use crate::assembly::{Assembly, AssemblyId};
use crate::error::RepositoryError;

/// Result of a versioned write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed,
    /// The stored version differs from the one the caller read.
    Conflict,
}

impl WriteOutcome {
    pub fn is_committed(self) -> bool {
        self == WriteOutcome::Committed
    }
}

pub trait AssemblyRepository {
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<Assembly>, RepositoryError>;

    /// Every stored assembly whose identifier shares `lineage`.
    fn find_by_lineage(&self, lineage: &str) -> Result<Vec<Assembly>, RepositoryError>;

    /// Inserts a new assembly (version 0) or updates a stored one whose
    /// version matches.
    fn save(&mut self, assembly: &Assembly) -> Result<WriteOutcome, RepositoryError>;

    fn remove(&mut self, assembly: &Assembly) -> Result<WriteOutcome, RepositoryError>;

    /// Removes `original` and inserts `children` as one unit. Nothing is
    /// written unless every check passes.
    fn replace(
        &mut self,
        original: &Assembly,
        children: &[Assembly],
    ) -> Result<WriteOutcome, RepositoryError>;

    /// Saves and reads back the stored row, with its new version.
    fn save_and_refresh(&mut self, assembly: &Assembly) -> Result<Assembly, RepositoryError> {
        match self.save(assembly)? {
            WriteOutcome::Committed => self
                .find_by_identifier(&assembly.identifier)?
                .ok_or_else(|| RepositoryError::NotFound(assembly.identifier.clone())),
            WriteOutcome::Conflict => Err(RepositoryError::Conflict(assembly.identifier.clone())),
        }
    }
}

/// Keeps assemblies in a map keyed by entity id.
#[derive(Debug, Default)]
pub struct InMemoryAssemblyRepository {
    rows: HashMap<String, Assembly>,
}

impl InMemoryAssemblyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stored assemblies ordered by identifier lineage and index.
    pub fn all(&self) -> Vec<Assembly> {
        let mut rows: Vec<Assembly> = self.rows.values().cloned().collect();
        rows.sort_by_key(|a| match a.assembly_id() {
            Ok(id) => (id.lineage().to_string(), id.index()),
            Err(_) => (a.identifier.clone(), 0),
        });
        rows
    }

    fn version_matches(&self, assembly: &Assembly) -> bool {
        match self.rows.get(&assembly.id) {
            Some(stored) => stored.version == assembly.version,
            None => assembly.version == 0,
        }
    }
}

impl AssemblyRepository for InMemoryAssemblyRepository {
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<Assembly>, RepositoryError> {
        Ok(self
            .rows
            .values()
            .find(|a| a.identifier == identifier)
            .cloned())
    }

    fn find_by_lineage(&self, lineage: &str) -> Result<Vec<Assembly>, RepositoryError> {
        Ok(self
            .rows
            .values()
            .filter(|a| {
                AssemblyId::parse(&a.identifier).is_ok_and(|id| id.lineage() == lineage)
            })
            .cloned()
            .collect())
    }

    fn save(&mut self, assembly: &Assembly) -> Result<WriteOutcome, RepositoryError> {
        if !self.version_matches(assembly) {
            return Ok(WriteOutcome::Conflict);
        }
        let mut row = assembly.clone();
        row.version += 1;
        debug!(identifier = %row.identifier, version = row.version, "assembly saved");
        self.rows.insert(row.id.clone(), row);
        Ok(WriteOutcome::Committed)
    }

    fn remove(&mut self, assembly: &Assembly) -> Result<WriteOutcome, RepositoryError> {
        match self.rows.get(&assembly.id) {
            None => Err(RepositoryError::NotFound(assembly.identifier.clone())),
            Some(stored) if stored.version != assembly.version => Ok(WriteOutcome::Conflict),
            Some(_) => {
                self.rows.remove(&assembly.id);
                debug!(identifier = %assembly.identifier, "assembly removed");
                Ok(WriteOutcome::Committed)
            }
        }
    }

    fn replace(
        &mut self,
        original: &Assembly,
        children: &[Assembly],
    ) -> Result<WriteOutcome, RepositoryError> {
        match self.rows.get(&original.id) {
            None => return Err(RepositoryError::NotFound(original.identifier.clone())),
            Some(stored) if stored.version != original.version => {
                return Ok(WriteOutcome::Conflict);
            }
            Some(_) => {}
        }
        if children
            .iter()
            .any(|child| child.id != original.id && !self.version_matches(child))
        {
            return Ok(WriteOutcome::Conflict);
        }

        self.rows.remove(&original.id);
        for child in children {
            let mut row = child.clone();
            row.version += 1;
            self.rows.insert(row.id.clone(), row);
        }
        debug!(
            original = %original.identifier,
            children = children.len(),
            "assembly replaced"
        );
        Ok(WriteOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(repo: &mut InMemoryAssemblyRepository, identifier: &str, samples: u32) -> Assembly {
        repo.save_and_refresh(&Assembly::new(identifier, samples, "steel"))
            .unwrap()
    }

    #[test]
    fn save_assigns_versions() {
        let mut repo = InMemoryAssemblyRepository::new();
        let a = stored(&mut repo, "abc.1.1", 3);
        assert_eq!(a.version, 1);
        assert_eq!(repo.len(), 1);

        let mut updated = a.clone();
        updated.comment = Some("annealed".to_string());
        assert_eq!(repo.save(&updated).unwrap(), WriteOutcome::Committed);
        let refreshed = repo.find_by_identifier("abc.1.1").unwrap().unwrap();
        assert_eq!(refreshed.version, 2);
        assert_eq!(refreshed.comment.as_deref(), Some("annealed"));
    }

    #[test]
    fn stale_save_conflicts() {
        let mut repo = InMemoryAssemblyRepository::new();
        let a = stored(&mut repo, "abc.1.1", 3);
        assert!(repo.save(&a).unwrap().is_committed());
        assert_eq!(repo.save(&a).unwrap(), WriteOutcome::Conflict);
        assert_eq!(
            repo.save_and_refresh(&a),
            Err(RepositoryError::Conflict("abc.1.1".to_string()))
        );
    }

    #[test]
    fn remove_checks_version() {
        let mut repo = InMemoryAssemblyRepository::new();
        let a = stored(&mut repo, "abc.1.1", 3);
        let mut stale = a.clone();
        stale.version = 0;
        assert_eq!(repo.remove(&stale).unwrap(), WriteOutcome::Conflict);
        assert_eq!(repo.remove(&a).unwrap(), WriteOutcome::Committed);
        assert!(repo.is_empty());
        assert_eq!(
            repo.remove(&a),
            Err(RepositoryError::NotFound("abc.1.1".to_string()))
        );
    }

    #[test]
    fn lineage_lookup_ignores_other_lineages() {
        let mut repo = InMemoryAssemblyRepository::new();
        stored(&mut repo, "abc.1.1", 3);
        stored(&mut repo, "abc.1.4", 3);
        stored(&mut repo, "abc.2.1", 3);
        let mut found = repo.find_by_lineage("abc.1").unwrap();
        found.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        let ids: Vec<_> = found.iter().map(|a| a.identifier.as_str()).collect();
        assert_eq!(ids, vec!["abc.1.1", "abc.1.4"]);
    }

    #[test]
    fn replace_is_all_or_nothing() {
        let mut repo = InMemoryAssemblyRepository::new();
        let original = stored(&mut repo, "abc.1.1", 4);
        let children = vec![
            Assembly::new("abc.1.1", 2, "steel"),
            Assembly::new("abc.1.3", 2, "steel"),
        ];

        let mut stale = original.clone();
        stale.version = 7;
        assert_eq!(repo.replace(&stale, &children).unwrap(), WriteOutcome::Conflict);
        assert_eq!(repo.len(), 1);

        assert_eq!(
            repo.replace(&original, &children).unwrap(),
            WriteOutcome::Committed
        );
        let ids: Vec<_> = repo.all().into_iter().map(|a| a.identifier).collect();
        assert_eq!(ids, vec!["abc.1.1", "abc.1.3"]);
        assert!(repo.all().iter().all(|a| a.version == 1));
    }
}
