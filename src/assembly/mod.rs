mod identifier;
mod occupancy;
mod split;

pub use identifier::{AssemblyId, parse, render};
pub use occupancy::verify_identifier;
pub use split::{SplitDirective, SplitEngine, SplitResult};

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::carrier::Carrier;

/// A physical batch of samples identified by a dotted hierarchical identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assembly {
    /// Entity id, unrelated to the assembly identifier.
    pub id: String,
    pub identifier: String,
    #[serde(deserialize_with = "non_zero_samples")]
    pub sample_count: u32,
    #[serde(default)]
    pub alloy: String,
    #[serde(default)]
    pub carriers: Vec<Arc<Carrier>>,
    #[serde(default)]
    pub position_at_carrier: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Ids of the procedures that modified this batch.
    #[serde(default)]
    pub modifications: Vec<String>,
    /// Optimistic-concurrency version; 0 means never persisted.
    #[serde(default)]
    pub version: u64,
}

impl Assembly {
    pub fn new(identifier: impl Into<String>, sample_count: u32, alloy: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            identifier: identifier.into(),
            sample_count,
            alloy: alloy.into(),
            carriers: Vec::new(),
            position_at_carrier: None,
            comment: None,
            modifications: Vec::new(),
            version: 0,
        }
    }

    pub fn with_carrier(mut self, carrier: Arc<Carrier>) -> Self {
        self.carriers.push(carrier);
        self
    }

    pub fn assembly_id(&self) -> Result<AssemblyId, crate::error::IdentifierError> {
        AssemblyId::parse(&self.identifier)
    }

    /// A fresh entity carrying every attribute of `self` except identity,
    /// identifier and sample count.
    pub(crate) fn derive_child(&self, identifier: String, sample_count: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            identifier,
            sample_count,
            alloy: self.alloy.clone(),
            carriers: self.carriers.clone(),
            position_at_carrier: self.position_at_carrier.clone(),
            comment: self.comment.clone(),
            modifications: self.modifications.clone(),
            version: 0,
        }
    }
}

fn non_zero_samples<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let count = u32::deserialize(deserializer)?;
    if count == 0 {
        return Err(serde::de::Error::custom("an assembly holds at least one sample"));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::CarrierType;

    #[test]
    fn child_keeps_attributes_but_not_identity() {
        let carrier = Arc::new(Carrier::new(CarrierType::new("tray")));
        let mut parent = Assembly::new("abc.1.3", 4, "AlSi10Mg").with_carrier(carrier.clone());
        parent.comment = Some("batch from furnace 2".into());
        parent.version = 5;

        let child = parent.derive_child("abc.1.5".into(), 2);
        assert_ne!(child.id, parent.id);
        assert_eq!(child.identifier, "abc.1.5");
        assert_eq!(child.sample_count, 2);
        assert_eq!(child.alloy, "AlSi10Mg");
        assert_eq!(child.comment.as_deref(), Some("batch from furnace 2"));
        assert!(Arc::ptr_eq(&child.carriers[0], &carrier));
        assert_eq!(child.version, 0);
    }

    #[test]
    fn deserialize_minimal_assembly() {
        let json = r#"{"id":"a1","identifier":"abc.1","sample_count":3}"#;
        let assembly: Assembly = serde_json::from_str(json).unwrap();
        assert_eq!(assembly.sample_count, 3);
        assert!(assembly.carriers.is_empty());
        assert_eq!(assembly.assembly_id().unwrap().index(), 1);
    }

    #[test]
    fn deserialize_rejects_empty_assembly() {
        let json = r#"{"id":"a1","identifier":"abc.1","sample_count":0}"#;
        let err = serde_json::from_str::<Assembly>(json).unwrap_err();
        assert!(err.to_string().contains("at least one sample"));
    }
}
