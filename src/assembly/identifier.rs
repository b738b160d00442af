//! Dotted hierarchical assembly identifiers.
//!
//! The wire format is `<prefix>("."<digits>)+`, e.g. `abc.1.2.3`. The final
//! numeric segment is the unit index used when a batch is split; everything
//! before it is the lineage, which never changes during a split.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentifierError;

/// A parsed assembly identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssemblyId {
    lineage: String,
    index: u64,
}

impl AssemblyId {
    pub fn parse(identifier: &str) -> Result<Self, IdentifierError> {
        let (lineage, index) = parse(identifier)?;
        Ok(Self { lineage, index })
    }

    /// Everything before the final segment, without the trailing dot.
    pub fn lineage(&self) -> &str {
        &self.lineage
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Same lineage, different unit index.
    pub fn with_index(&self, index: u64) -> Self {
        Self {
            lineage: self.lineage.clone(),
            index,
        }
    }

    /// Unit indices reserved by a batch of `sample_count` samples starting here.
    pub fn occupied_range(&self, sample_count: u32) -> Range<u64> {
        self.index..self.index.saturating_add(u64::from(sample_count))
    }
}

impl fmt::Display for AssemblyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.lineage, self.index))
    }
}

impl FromStr for AssemblyId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AssemblyId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AssemblyId> for String {
    fn from(id: AssemblyId) -> Self {
        id.to_string()
    }
}

/// Splits an identifier into its lineage and final unit index.
pub fn parse(identifier: &str) -> Result<(String, u64), IdentifierError> {
    let segments: Vec<&str> = identifier.split('.').collect();
    if segments.len() < 2 {
        return Err(IdentifierError::malformed(
            identifier,
            "expected a prefix followed by at least one numeric segment",
        ));
    }

    let prefix = segments[0];
    if prefix.is_empty() || prefix.chars().all(|c| c.is_ascii_digit()) {
        return Err(IdentifierError::malformed(
            identifier,
            "prefix must be a non-numeric segment",
        ));
    }
    if prefix.chars().any(char::is_whitespace) {
        return Err(IdentifierError::malformed(
            identifier,
            "prefix must not contain whitespace",
        ));
    }

    let mut index = 0;
    for segment in &segments[1..] {
        index = parse_segment(identifier, segment)?;
    }

    let lineage = &identifier[..identifier.len() - segments[segments.len() - 1].len() - 1];
    Ok((lineage.to_string(), index))
}

/// Inverse of [`parse`].
pub fn render(lineage: &str, index: u64) -> String {
    format!("{lineage}.{index}")
}

fn parse_segment(identifier: &str, segment: &str) -> Result<u64, IdentifierError> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IdentifierError::malformed(
            identifier,
            format!("segment `{segment}` is not an unsigned integer"),
        ));
    }
    segment.parse::<u64>().map_err(|_| {
        IdentifierError::malformed(identifier, format!("segment `{segment}` is too large"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lineage_and_index() {
        let (lineage, index) = parse("abc.1.2.3").unwrap();
        assert_eq!(lineage, "abc.1.2");
        assert_eq!(index, 3);
    }

    #[test]
    fn shortest_valid_identifier() {
        let (lineage, index) = parse("abc.7").unwrap();
        assert_eq!(lineage, "abc");
        assert_eq!(index, 7);
    }

    #[test]
    fn render_is_inverse_of_parse() {
        let (lineage, index) = parse("rig-x.10.20").unwrap();
        assert_eq!(render(&lineage, index), "rig-x.10.20");
    }

    #[test]
    fn leading_zeros_are_normalised() {
        let id = AssemblyId::parse("abc.1.007").unwrap();
        assert_eq!(id.index(), 7);
        assert_eq!(id.to_string(), "abc.1.7");
    }

    #[test]
    fn rejects_non_numeric_segment() {
        let err = parse("abc.1.2.def").unwrap_err();
        assert!(err.to_string().contains("`def`"));
    }

    #[test]
    fn rejects_too_few_segments() {
        assert!(parse("abc").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn rejects_numeric_or_empty_prefix() {
        assert!(parse("12.3").is_err());
        assert!(parse(".3").is_err());
    }

    #[test]
    fn rejects_empty_and_signed_segments() {
        assert!(parse("abc..3").is_err());
        assert!(parse("abc.1.").is_err());
        assert!(parse("abc.-1").is_err());
        assert!(parse("abc.+1").is_err());
        assert!(parse("abc. 1").is_err());
    }

    #[test]
    fn rejects_overflowing_segment() {
        assert!(parse("abc.99999999999999999999999").is_err());
    }

    #[test]
    fn occupied_range_covers_every_sample() {
        let id = AssemblyId::parse("abc.1.2.3").unwrap();
        assert_eq!(id.occupied_range(10), 3..13);
        assert_eq!(id.with_index(12).to_string(), "abc.1.2.12");
    }

    #[test]
    fn serde_uses_wire_format() {
        let id: AssemblyId = serde_json::from_str("\"abc.4.5\"").unwrap();
        assert_eq!(id.lineage(), "abc.4");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc.4.5\"");
        assert!(serde_json::from_str::<AssemblyId>("\"abc.x\"").is_err());
    }
}
