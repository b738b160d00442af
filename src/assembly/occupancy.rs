use tracing::trace;

use super::{Assembly, AssemblyId};
use crate::error::{KcbError, OccupiedIdentifierError};

/// Checks that the unit range reserved by `candidate` does not overlap any
/// other assembly of the same lineage.
///
/// Entities sharing the candidate's entity id are skipped, so an assembly can
/// be re-verified against a listing that already contains it. Stored entries
/// with unparsable identifiers cannot reserve anything and are ignored.
///
/// Fails with [`KcbError::Identifier`] when the candidate itself does not
/// parse, with [`KcbError::EmptyAssembly`] when it reserves no unit at all and
/// with [`KcbError::Occupied`] on overlap.
pub fn verify_identifier<'a>(
    candidate: &Assembly,
    existing: impl IntoIterator<Item = &'a Assembly>,
) -> Result<(), KcbError> {
    let id = candidate.assembly_id()?;
    if candidate.sample_count == 0 {
        return Err(KcbError::EmptyAssembly(candidate.identifier.clone()));
    }
    let wanted = id.occupied_range(candidate.sample_count);

    for other in existing {
        if other.id == candidate.id {
            continue;
        }
        let Ok(other_id) = AssemblyId::parse(&other.identifier) else {
            trace!(identifier = %other.identifier, "skipping unparsable stored identifier");
            continue;
        };
        if other_id.lineage() != id.lineage() {
            continue;
        }
        let taken = other_id.occupied_range(other.sample_count);
        if wanted.start < taken.end && taken.start < wanted.end {
            return Err(OccupiedIdentifierError {
                identifier: candidate.identifier.clone(),
                occupied_by: other.identifier.clone(),
            }
            .into());
        }
    }
    Ok(())
}
