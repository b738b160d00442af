//! Partitioning a batch into child batches.
//!
//! Children are numbered from the parent's unit index, each one starting where
//! the previous one's samples end: a batch `abc.1.2.3` of 10 samples split by
//! 3 yields `abc.1.2.3` (3), `abc.1.2.6` (3), `abc.1.2.9` (3) and
//! `abc.1.2.12` (1). The last child absorbs the remainder.

use std::fmt;

use tracing::debug;

use super::{Assembly, AssemblyId};
use crate::error::SplitError;

/// How a batch should be divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDirective {
    /// Groups of a fixed number of samples.
    BySize(u32),
    /// A fixed number of groups.
    ByParts(u32),
    /// One group per sample.
    Separate,
}

impl fmt::Display for SplitDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitDirective::BySize(size) => write!(f, "by size {size}"),
            SplitDirective::ByParts(parts) => write!(f, "into {parts} parts"),
            SplitDirective::Separate => write!(f, "into single samples"),
        }
    }
}

/// Outcome of a split.
///
/// A split that yields a single group hands back the original entity rather
/// than minting a copy, so callers know nothing has to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitResult<'a> {
    Unchanged(&'a Assembly),
    Divided(Vec<Assembly>),
}

impl<'a> SplitResult<'a> {
    pub fn len(&self) -> usize {
        match self {
            SplitResult::Unchanged(_) => 1,
            SplitResult::Divided(children) => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &Assembly> + '_> {
        match self {
            SplitResult::Unchanged(original) => Box::new(std::iter::once(*original)),
            SplitResult::Divided(children) => Box::new(children.iter()),
        }
    }

    pub fn total_samples(&self) -> u64 {
        self.iter().map(|a| u64::from(a.sample_count)).sum()
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.iter().map(|a| a.identifier.clone()).collect()
    }
}

/// Pure split computations. Never touches persistence or checks whether the
/// minted identifiers are free; that is the caller's job.
pub struct SplitEngine;

impl SplitEngine {
    pub fn split(
        assembly: &Assembly,
        directive: SplitDirective,
    ) -> Result<SplitResult<'_>, SplitError> {
        match directive {
            SplitDirective::BySize(size) => Self::split_by_size(assembly, size),
            SplitDirective::ByParts(parts) => Self::split_by_parts(assembly, parts),
            SplitDirective::Separate => Self::separate(assembly),
        }
    }

    pub fn split_by_size(assembly: &Assembly, size: u32) -> Result<SplitResult<'_>, SplitError> {
        let sample_count = assembly.sample_count;
        if size == 0 || size > sample_count {
            return Err(SplitError::InvalidGroupSize { size, sample_count });
        }
        let id = assembly.assembly_id()?;

        if size == sample_count {
            debug!(
                identifier = %assembly.identifier,
                "group size equals sample count, keeping original"
            );
            return Ok(SplitResult::Unchanged(assembly));
        }
        // the children must fit below u64::MAX
        if id.index().checked_add(u64::from(sample_count)).is_none() {
            return Err(SplitError::IndexOverflow {
                identifier: assembly.identifier.clone(),
                sample_count,
            });
        }

        let parts = sample_count.div_ceil(size);
        let mut children = Vec::with_capacity(parts as usize);
        let mut index = id.index();
        let mut remaining = sample_count;
        for _ in 0..parts {
            let count = remaining.min(size);
            children.push(assembly.derive_child(id.with_index(index).to_string(), count));
            index += u64::from(count);
            remaining -= count;
        }

        debug!(
            identifier = %assembly.identifier,
            size,
            parts = children.len(),
            "split assembly by size"
        );
        Ok(SplitResult::Divided(children))
    }

    pub fn split_by_parts(assembly: &Assembly, parts: u32) -> Result<SplitResult<'_>, SplitError> {
        let sample_count = assembly.sample_count;
        if parts == 0 || parts > sample_count {
            return Err(SplitError::InvalidPartCount { parts, sample_count });
        }
        if parts == 1 {
            // still reject identifiers that could never be split
            AssemblyId::parse(&assembly.identifier)?;
            return Ok(SplitResult::Unchanged(assembly));
        }
        Self::split_by_size(assembly, sample_count.div_ceil(parts))
    }

    pub fn separate(assembly: &Assembly) -> Result<SplitResult<'_>, SplitError> {
        Self::split_by_size(assembly, 1)
    }
}
